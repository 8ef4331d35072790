//! Error types for the `sopqa-brain` crate.

use sopqa_model::ModelError;
use sopqa_rag::RagError;
use thiserror::Error;

/// Errors raised while wiring up the assistant.
///
/// Answering itself never fails; see [`crate::Answer`].
#[derive(Debug, Error)]
pub enum BrainError {
    /// A required setting is missing or invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl BrainError {
    /// Whether this error stems from configuration rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Rag(RagError::Configuration(_))
                | Self::Model(ModelError::Configuration(_))
        )
    }
}

/// Result type for assistant setup.
pub type Result<T> = std::result::Result<T, BrainError>;
