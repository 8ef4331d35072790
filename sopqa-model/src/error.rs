//! Error types for the `sopqa-model` crate.

use thiserror::Error;

/// Errors that can occur while generating text.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Missing credential or invalid setting.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The generation backend could not be reached.
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The backend failed to produce a complete answer.
    #[error("Generation failed ({provider}): {message}")]
    Generation { provider: String, message: String },
}

impl ModelError {
    pub(crate) fn generation(provider: &str, message: impl Into<String>) -> Self {
        Self::Generation { provider: provider.to_string(), message: message.into() }
    }

    /// Map a transport-level `reqwest` failure.
    ///
    /// Connection failures mean the backend is unreachable. A timeout or a
    /// broken body counts as a failed generation.
    pub(crate) fn from_transport(provider: &str, error: reqwest::Error) -> Self {
        if error.is_connect() {
            Self::ProviderUnavailable { provider: provider.to_string(), message: error.to_string() }
        } else if error.is_timeout() {
            Self::generation(provider, format!("timed out: {error}"))
        } else {
            Self::generation(provider, error.to_string())
        }
    }
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
