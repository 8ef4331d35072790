//! # sopqa-model
//!
//! Streaming text generation for the SOP QA assistant.
//!
//! ## Overview
//!
//! Every backend implements [`Llm`]: a prompt goes in, a [`TokenStream`] of
//! text fragments comes out as the model produces them.
//!
//! - [`OllamaLlm`] - a local Ollama server (`/api/generate`, newline-delimited JSON)
//! - [`GeminiLlm`] - Google's Gemini API (`streamGenerateContent`, server-sent events)
//! - [`MockLlm`] - scripted tokens and failures for testing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use sopqa_model::{GenerationConfig, Llm, OllamaLlm};
//!
//! let llm = OllamaLlm::new("http://localhost:11434", GenerationConfig::new("qwen2.5:3b-instruct"))?;
//! let mut tokens = llm.stream("What is a smoke test?").await?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?);
//! }
//! ```
//!
//! Dropping a [`TokenStream`] before it ends closes the underlying HTTP
//! response.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

pub mod config;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod ollama;

pub use config::{DEFAULT_NUM_CTX, DEFAULT_TEMPERATURE, GenerationConfig};
pub use error::{ModelError, Result};
pub use gemini::{DEFAULT_GEMINI_API_URL, DEFAULT_GEMINI_MODEL, GeminiLlm};
pub use mock::MockLlm;
pub use ollama::{DEFAULT_OLLAMA_MODEL, OllamaLlm};

/// Text fragments in generation order. Ends after the last fragment or the first error.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A text generation backend.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    /// Whether the backend sends its own system instruction with every
    /// request. When `false`, callers put the instruction into the prompt.
    fn binds_system_instruction(&self) -> bool;

    /// Start generating a response to `prompt`.
    ///
    /// # Errors
    ///
    /// Fails before any token when the backend cannot be reached or rejects
    /// the request. Failures after the first token arrive as an `Err` item
    /// on the stream.
    async fn stream(&self, prompt: &str) -> Result<TokenStream>;
}
