//! # sopqa-brain
//!
//! A retrieval-grounded assistant for software QA. Questions are answered by
//! a Senior-QA-Engineer persona that is fed the most relevant passages of the
//! team's SOP documents.
//!
//! - [`QaBrain`] - retrieves context, composes the prompt and streams an [`Answer`]
//! - [`Settings`] / [`Provider`] - one setting selects Ollama or Gemini for both
//!   embeddings and generation
//! - [`console`] - the interactive `[QA INPUT]` loop
//!
//! The `sopqa` binary wires these together behind `chat`, `ingest`, `ask` and
//! `status` subcommands.

pub mod brain;
pub mod console;
pub mod error;
pub mod prompts;
pub mod settings;
pub mod telemetry;

pub use brain::{Answer, AnswerChunk, GENERATION_ERROR_PREFIX, QaBrain};
pub use error::{BrainError, Result};
pub use prompts::{SYSTEM_PROMPT, compose_prompt};
pub use settings::{Provider, Settings};
