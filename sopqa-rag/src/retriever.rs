//! Query-time retrieval of relevant chunks.
//!
//! [`Retriever::retrieve`] never fails: every degraded outcome is logged and
//! reported through [`RetrievalStatus`] alongside an empty result list, so a
//! caller can always go on to generate an answer.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// How a retrieval ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalStatus {
    /// At least one chunk matched.
    Found,
    /// The store is empty or nothing matched.
    NoResults,
    /// The vector store failed to initialize.
    StoreUnavailable(String),
    /// The embedding provider failed to embed the query.
    ProviderError(String),
    /// The store rejected the search.
    StoreError(String),
}

impl RetrievalStatus {
    /// Whether this status reports a failure rather than a normal outcome.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Found | Self::NoResults)
    }
}

/// Results of a single retrieval.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Matched chunks, most similar first.
    pub results: Vec<SearchResult>,
    /// How the retrieval ended.
    pub status: RetrievalStatus,
}

impl Retrieval {
    fn empty(status: RetrievalStatus) -> Self {
        Self { results: Vec::new(), status }
    }

    /// The matched texts joined by a blank line; empty when nothing matched.
    pub fn context(&self) -> String {
        self.results.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("\n\n")
    }
}

#[derive(Clone)]
enum StoreState {
    Ready(Arc<dyn VectorStore>),
    Unavailable(String),
}

/// Embeds queries and searches a vector store.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_rag::{FileVectorStore, Retriever};
///
/// let store = FileVectorStore::open("./vector_db").await.map(|s| Arc::new(s) as _);
/// let retriever = Retriever::new(embedder, store);
/// let retrieval = retriever.retrieve("How do I file a bug?", 3).await;
/// println!("{}", retrieval.context());
/// ```
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: StoreState,
}

impl Retriever {
    /// Create a retriever over the outcome of opening a store.
    ///
    /// A store that failed to open is kept as unavailable; every later
    /// retrieval reports [`RetrievalStatus::StoreUnavailable`].
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        store: Result<Arc<dyn VectorStore>>,
    ) -> Self {
        let store = match store {
            Ok(store) => StoreState::Ready(store),
            Err(e) => {
                warn!(error = %e, "vector store unavailable; answers will not be grounded");
                StoreState::Unavailable(e.to_string())
            }
        };
        Self { embedding_provider, store }
    }

    /// The underlying store, if it opened successfully.
    pub fn store(&self) -> Option<&Arc<dyn VectorStore>> {
        match &self.store {
            StoreState::Ready(store) => Some(store),
            StoreState::Unavailable(_) => None,
        }
    }

    /// Retrieve up to `top_k` chunks most similar to `query`.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Retrieval {
        let store = match &self.store {
            StoreState::Ready(store) => store,
            StoreState::Unavailable(reason) => {
                warn!(reason = %reason, "retrieval skipped: vector store unavailable");
                return Retrieval::empty(RetrievalStatus::StoreUnavailable(reason.clone()));
            }
        };

        match store.is_empty().await {
            Ok(true) => {
                info!("vector store is empty; no context to retrieve");
                return Retrieval::empty(RetrievalStatus::NoResults);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "vector store could not be inspected");
                return Retrieval::empty(RetrievalStatus::StoreError(e.to_string()));
            }
        }

        let embedding = match self.embedding_provider.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(provider = self.embedding_provider.name(), error = %e, "query embedding failed");
                return Retrieval::empty(RetrievalStatus::ProviderError(e.to_string()));
            }
        };

        let results = match store.search(&embedding, top_k).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "vector search failed");
                return Retrieval::empty(RetrievalStatus::StoreError(e.to_string()));
            }
        };

        if results.is_empty() {
            info!(top_k, "no matching chunks");
            return Retrieval::empty(RetrievalStatus::NoResults);
        }
        debug!(count = results.len(), top_score = results[0].score, "retrieved chunks");
        Retrieval { results, status: RetrievalStatus::Found }
    }
}
