//! Answer orchestration: retrieve, compose, stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::stream;
use futures::{Stream, StreamExt};
use sopqa_model::Llm;
use sopqa_rag::{RagConfig, Retriever};
use tracing::{error, info, warn};

use crate::prompts::{SYSTEM_PROMPT, compose_prompt};

/// Prefix of the text reported when generation fails.
pub const GENERATION_ERROR_PREFIX: &str = "[ERROR] Generation failed: ";

/// One piece of a streamed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerChunk {
    /// Generated text, in order.
    Token(String),
    /// Generation failed. Always the last chunk of an answer.
    Error(String),
}

impl AnswerChunk {
    pub fn text(&self) -> &str {
        match self {
            Self::Token(text) | Self::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A lazily produced answer.
///
/// Nothing happens until the stream is polled. It ends after the last token
/// or after a single [`AnswerChunk::Error`]; it never panics and never
/// surfaces a `Result`. Dropping it mid-way cancels generation.
pub struct Answer {
    chunks: Pin<Box<dyn Stream<Item = AnswerChunk> + Send>>,
}

impl Answer {
    /// Drive the answer to completion.
    ///
    /// Returns the concatenated tokens, or the error text when generation
    /// failed at any point.
    pub async fn finish(mut self) -> String {
        let mut text = String::new();
        while let Some(chunk) = self.chunks.next().await {
            match chunk {
                AnswerChunk::Token(token) => text.push_str(&token),
                AnswerChunk::Error(message) => return message,
            }
        }
        text
    }
}

impl Stream for Answer {
    type Item = AnswerChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.as_mut().poll_next(cx)
    }
}

/// Grounds each question in retrieved SOP passages and streams the model's answer.
///
/// Holds only shared handles, so clones are cheap and independent.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_brain::QaBrain;
///
/// let brain = QaBrain::new(retriever, llm);
/// let answer = brain.answer("Create a test case for User Login").finish().await;
/// ```
#[derive(Clone)]
pub struct QaBrain {
    retriever: Retriever,
    llm: Arc<dyn Llm>,
    top_k: usize,
    system_prompt: Arc<str>,
}

impl QaBrain {
    pub fn new(retriever: Retriever, llm: Arc<dyn Llm>) -> Self {
        Self {
            retriever,
            llm,
            top_k: RagConfig::default().top_k,
            system_prompt: Arc::from(SYSTEM_PROMPT),
        }
    }

    /// Number of chunks retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Replace the persona placed in front of prompts for backends that do
    /// not bind one.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<Arc<str>>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `prompt`, streaming tokens as the model produces them.
    pub fn answer(&self, prompt: &str) -> Answer {
        let retriever = self.retriever.clone();
        let llm = Arc::clone(&self.llm);
        let top_k = self.top_k;
        let system_prompt = Arc::clone(&self.system_prompt);
        let prompt = prompt.to_string();

        let chunks = stream! {
            info!("Retrieving context...");
            let retrieval = retriever.retrieve(&prompt, top_k).await;
            let context = retrieval.context();
            if context.is_empty() {
                warn!(status = ?retrieval.status, "No relevant context found in SOP");
            } else {
                info!(context_chars = context.chars().count(), chunks = retrieval.results.len(), "Found context");
            }

            let system = (!llm.binds_system_instruction()).then_some(&*system_prompt);
            let full_prompt = compose_prompt(system, &context, &prompt);

            let mut tokens = match llm.stream(&full_prompt).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    error!(model = llm.name(), error = %e, "Generation failed");
                    yield AnswerChunk::Error(format!("{GENERATION_ERROR_PREFIX}{e}"));
                    return;
                }
            };

            while let Some(token) = tokens.next().await {
                match token {
                    Ok(token) => yield AnswerChunk::Token(token),
                    Err(e) => {
                        error!(model = llm.name(), error = %e, "Generation failed mid-stream");
                        yield AnswerChunk::Error(format!("{GENERATION_ERROR_PREFIX}{e}"));
                        return;
                    }
                }
            }
        };

        Answer { chunks: Box::pin(chunks) }
    }
}
