//! Cloud embedding provider backed by the Gemini embeddings API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, expect_count, map_transport_error};
use crate::error::{RagError, Result};

/// The default Gemini REST endpoint.
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default cloud embedding model.
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "embedding-001";

/// Most texts the API accepts in one `batchEmbedContents` call.
pub const MAX_BATCH: usize = 100;

const PROVIDER: &str = "Gemini";

/// An [`EmbeddingProvider`] backed by the Gemini embedding API.
///
/// Single texts are embedded as retrieval queries, batches as retrieval
/// documents, matching how the two calls are used by retrieval and
/// ingestion.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_rag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new("your-api-key")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    /// Fully qualified model name, e.g. `models/embedding-001`.
    model: String,
}

impl GeminiEmbeddingProvider {
    /// Create a provider using the given API key and `embedding-001`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::Configuration("Gemini API key must not be empty".into()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_GEMINI_URL.into(),
            model: qualify_model(DEFAULT_GEMINI_EMBEDDING_MODEL),
        })
    }

    /// Point the provider at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            RagError::Configuration(format!("failed to build Gemini HTTP client: {e}"))
        })?;
        Ok(self)
    }

    async fn post<Req: Serialize, Res: DeserializeOwned>(
        &self,
        action: &str,
        body: &Req,
    ) -> Result<Res> {
        let url = format!("{}/{}:{action}", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                map_transport_error(PROVIDER, e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })
    }
}

fn qualify_model(model: &str) -> String {
    if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl<'a> EmbedContentRequest<'a> {
    fn new(model: &'a str, text: &'a str, task_type: &'static str) -> Self {
        Self { model, content: Content { parts: [Part { text }] }, task_type }
    }
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let request = EmbedContentRequest::new(&self.model, text, "RETRIEVAL_QUERY");
        let response: EmbedContentResponse = self.post("embedContent", &request).await?;
        Ok(response.embedding.values)
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(provider = PROVIDER, batch_size = batch.len(), model = %self.model, "embedding batch");

            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedContentRequest::new(&self.model, text, "RETRIEVAL_DOCUMENT"))
                    .collect(),
            };
            let response: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;
            let batch_vectors = response.embeddings.into_iter().map(|e| e.values).collect();
            vectors.extend(expect_count(PROVIDER, batch.len(), batch_vectors)?);
        }
        Ok(vectors)
    }
}
