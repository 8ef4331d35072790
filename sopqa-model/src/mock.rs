//! Scripted [`Llm`] for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::error::{ModelError, Result};
use crate::{Llm, TokenStream};

const PROVIDER: &str = "Mock";

#[derive(Debug, Clone)]
enum Failure {
    None,
    Connect(String),
    MidStream(String),
}

/// Streams a fixed list of tokens and records every prompt it receives.
///
/// # Example
///
/// ```rust
/// use sopqa_model::{Llm, MockLlm};
///
/// let llm = MockLlm::new(["Hello", ", world"]);
/// assert!(!llm.binds_system_instruction());
/// ```
#[derive(Debug)]
pub struct MockLlm {
    tokens: Vec<String>,
    failure: Failure,
    binds_system_instruction: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            failure: Failure::None,
            binds_system_instruction: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call before the first token with [`ModelError::ProviderUnavailable`].
    pub fn failing_to_connect(message: impl Into<String>) -> Self {
        Self { failure: Failure::Connect(message.into()), ..Self::new(Vec::<String>::new()) }
    }

    /// Stream every scripted token, then a [`ModelError::Generation`].
    pub fn failing_mid_stream(mut self, message: impl Into<String>) -> Self {
        self.failure = Failure::MidStream(message.into());
        self
    }

    /// Claim to bind a system instruction of its own.
    pub fn binding_system_instruction(mut self) -> Self {
        self.binds_system_instruction = true;
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    fn binds_system_instruction(&self) -> bool {
        self.binds_system_instruction
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let mut items: Vec<Result<String>> = match &self.failure {
            Failure::Connect(message) => {
                return Err(ModelError::ProviderUnavailable {
                    provider: PROVIDER.into(),
                    message: message.clone(),
                });
            }
            _ => self.tokens.iter().cloned().map(Ok).collect(),
        };
        if let Failure::MidStream(message) = &self.failure {
            items.push(Err(ModelError::generation(PROVIDER, message.clone())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}
