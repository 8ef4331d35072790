//! Cloud generation through the Gemini API.

use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::GenerationConfig;
use crate::error::{ModelError, Result};
use crate::{Llm, TokenStream};

/// Root of the public Gemini REST API.
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default cloud model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const PROVIDER: &str = "Gemini";

/// An [`Llm`] backed by `models/{model}:streamGenerateContent` with
/// server-sent events.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_model::{GeminiLlm, GenerationConfig};
///
/// let llm = GeminiLlm::new(std::env::var("GOOGLE_API_KEY")?, GenerationConfig::new("gemini-1.5-flash"))?;
/// ```
pub struct GeminiLlm {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    config: GenerationConfig,
}

impl GeminiLlm {
    /// Create a client authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`] if the key is empty or the HTTP
    /// client cannot be built.
    pub fn new(api_key: impl Into<String>, config: GenerationConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ModelError::Configuration("Gemini API key must not be empty".into()));
        }
        let client = config.http_client(PROVIDER)?;
        Ok(Self { client, api_key, base_url: DEFAULT_GEMINI_API_URL.into(), config })
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn model_path(&self) -> String {
        let model = &self.config.model;
        if model.starts_with("models/") { model.clone() } else { format!("models/{model}") }
    }
}

// Request/response types, camelCase on the wire.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationParams,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationParams {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

impl GenerateContentResponse {
    /// Text of this event, or the reason generation stopped abnormally.
    fn into_text(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(ModelError::generation(PROVIDER, error.message));
        }
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::generation(PROVIDER, format!("prompt blocked: {reason}")));
        }

        let mut text = String::new();
        for candidate in self.candidates {
            if let Some(reason) = candidate.finish_reason.as_deref() {
                if !matches!(reason, "STOP" | "MAX_TOKENS" | "FINISH_REASON_UNSPECIFIED") {
                    warn!(provider = PROVIDER, finish_reason = reason, "generation stopped early");
                }
            }
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            text.extend(parts.into_iter().filter_map(|p| p.text));
        }
        Ok(text)
    }
}

#[async_trait]
impl Llm for GeminiLlm {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn binds_system_instruction(&self) -> bool {
        self.config.system_instruction.is_some()
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        debug!(provider = PROVIDER, model = %self.config.model, prompt_len = prompt.len(), "starting generation");

        let request = GenerateContentRequest {
            contents: [Content { role: Some("user"), parts: [Part { text: prompt }] }],
            system_instruction: self
                .config
                .system_instruction
                .as_deref()
                .map(|text| Content { role: None, parts: [Part { text }] }),
            generation_config: GenerationParams { temperature: self.config.temperature },
        };

        let response = self
            .client
            .post(format!("{}/{}:streamGenerateContent", self.base_url, self.model_path()))
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                ModelError::from_transport(PROVIDER, e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(ModelError::generation(PROVIDER, format!("API returned {status}: {detail}")));
        }

        Ok(Box::pin(sse_tokens(response)))
    }
}

fn sse_tokens(response: reqwest::Response) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ModelError::generation(PROVIDER, format!("bad event stream: {e}")))?;
            if event.data.trim().is_empty() {
                continue;
            }
            let parsed: GenerateContentResponse = serde_json::from_str(&event.data)
                .map_err(|e| ModelError::generation(PROVIDER, format!("malformed event: {e}")))?;
            let text = parsed.into_text()?;
            if !text.is_empty() {
                yield text;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn empty_key_is_a_configuration_error() {
        let result = GeminiLlm::new("", GenerationConfig::new(DEFAULT_GEMINI_MODEL));
        assert!(matches!(result, Err(ModelError::Configuration(_))));
    }

    #[test]
    fn model_path_is_qualified_once() {
        let llm = GeminiLlm::new("key", GenerationConfig::new("gemini-1.5-flash")).unwrap();
        assert_eq!(llm.model_path(), "models/gemini-1.5-flash");
        let llm = GeminiLlm::new("key", GenerationConfig::new("models/gemini-pro")).unwrap();
        assert_eq!(llm.model_path(), "models/gemini-pro");
    }

    #[test]
    fn system_instruction_is_sent_separately() {
        let request = GenerateContentRequest {
            contents: [Content { role: Some("user"), parts: [Part { text: "q" }] }],
            system_instruction: Some(Content { role: None, parts: [Part { text: "persona" }] }),
            generation_config: GenerationParams { temperature: 0.2 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "persona");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
    }

    #[test]
    fn event_text_concatenates_parts() {
        let event = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Log "},{"text":"it."}]}}]}"#,
        );
        assert_eq!(event.into_text().unwrap(), "Log it.");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let event = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(event.into_text().unwrap_err().to_string().contains("SAFETY"));
    }

    #[test]
    fn final_event_without_text_is_empty() {
        let event = parse(r#"{"candidates":[{"finishReason":"STOP"}]}"#);
        assert_eq!(event.into_text().unwrap(), "");
    }
}
