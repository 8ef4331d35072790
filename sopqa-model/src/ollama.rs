//! Local generation through an Ollama server.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::GenerationConfig;
use crate::error::{ModelError, Result};
use crate::{Llm, TokenStream};

/// The default local instruction-tuned model.
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:3b-instruct";

const PROVIDER: &str = "Ollama";

/// An [`Llm`] backed by Ollama's `/api/generate` endpoint.
///
/// The system instruction from the config travels in the request's `system`
/// field, so it is not repeated in the prompt.
pub struct OllamaLlm {
    client: reqwest::Client,
    base_url: String,
    config: GenerationConfig,
}

impl OllamaLlm {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, config: GenerationConfig) -> Result<Self> {
        let client = config.http_client(PROVIDER)?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
}

/// One line of the streamed response.
#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[async_trait]
impl Llm for OllamaLlm {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn binds_system_instruction(&self) -> bool {
        self.config.system_instruction.is_some()
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        debug!(provider = PROVIDER, model = %self.config.model, prompt_len = prompt.len(), "starting generation");

        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            system: self.config.system_instruction.as_deref(),
            stream: true,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_ctx: self.config.num_ctx,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
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
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(ModelError::generation(PROVIDER, format!("server returned {status}: {detail}")));
        }

        Ok(Box::pin(ndjson_tokens(response)))
    }
}

/// Read newline-delimited JSON from the body, yielding non-empty `response` fields.
fn ndjson_tokens(response: reqwest::Response) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        'read: while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(|e| ModelError::from_transport(PROVIDER, e))?;
            buffer.extend_from_slice(&bytes);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let Some(parsed) = parse_line(&line)? else { continue };
                if !parsed.response.is_empty() {
                    yield parsed.response;
                }
                if parsed.done {
                    break 'read;
                }
            }
        }

        // A final line without a trailing newline.
        if let Some(parsed) = parse_line(&buffer)? {
            if !parsed.response.is_empty() {
                yield parsed.response;
            }
        }
    }
}

fn parse_line(line: &[u8]) -> Result<Option<GenerateLine>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| ModelError::generation(PROVIDER, format!("invalid UTF-8 in stream: {e}")))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }

    let parsed: GenerateLine = serde_json::from_str(text)
        .map_err(|e| ModelError::generation(PROVIDER, format!("malformed stream line: {e}")))?;
    if let Some(message) = parsed.error {
        error!(provider = PROVIDER, error = %message, "error reported mid-stream");
        return Err(ModelError::generation(PROVIDER, message));
    }
    Ok(Some(parsed))
}
