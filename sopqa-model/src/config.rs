//! Generation settings shared by every backend.

use std::time::Duration;

/// Default sampling temperature. Kept low for factual, procedure-bound answers.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default context window requested from local models.
pub const DEFAULT_NUM_CTX: u32 = 4096;

/// Settings for one generation backend.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sopqa_model::GenerationConfig;
///
/// let config = GenerationConfig::new("qwen2.5:3b-instruct")
///     .with_system_instruction("You are a QA engineer.")
///     .with_timeout(Duration::from_secs(120));
/// assert_eq!(config.temperature, 0.2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Model identifier understood by the backend.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Context window size; only honoured by local backends.
    pub num_ctx: u32,
    /// Persona/system text bound to every request.
    pub system_instruction: Option<String>,
    /// Upper bound on a whole request, from connect to the last token.
    pub timeout: Option<Duration>,
}

impl GenerationConfig {
    /// Create a config for `model` with default sampling settings.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            num_ctx: DEFAULT_NUM_CTX,
            system_instruction: None,
            timeout: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = num_ctx;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build an HTTP client honouring [`timeout`](Self::timeout).
    pub(crate) fn http_client(&self, provider: &str) -> crate::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|e| {
            crate::ModelError::Configuration(format!("failed to build {provider} HTTP client: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GenerationConfig::new("m");
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.num_ctx, 4096);
        assert!(config.system_instruction.is_none());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn setters_chain() {
        let config = GenerationConfig::new("m").with_temperature(0.7).with_num_ctx(2048);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.num_ctx, 2048);
    }
}
