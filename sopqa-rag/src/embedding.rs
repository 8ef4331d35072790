//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (a local Ollama server,
/// the Gemini API) behind a unified async interface. The dimension of the
/// vectors is defined by the backend and must stay the same between
/// ingestion and query.
///
/// The default [`embed_many`](EmbeddingProvider::embed_many) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_rag::EmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434");
/// let embedding = provider.embed("login form validation").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of inputs, in input order.
    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Check that a backend returned one vector per input.
pub(crate) fn expect_count(
    provider: &str,
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::Embedding {
            provider: provider.to_string(),
            message: format!("expected {expected} embeddings, received {}", vectors.len()),
        });
    }
    Ok(vectors)
}

/// Map a transport-level `reqwest` failure to a [`RagError`].
///
/// Connection and timeout failures mean the backend is unreachable; anything
/// else is reported as an embedding error.
pub(crate) fn map_transport_error(provider: &str, error: reqwest::Error) -> RagError {
    if error.is_connect() || error.is_timeout() {
        RagError::ProviderUnavailable { provider: provider.to_string(), message: error.to_string() }
    } else {
        RagError::Embedding { provider: provider.to_string(), message: error.to_string() }
    }
}
