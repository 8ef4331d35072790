//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps records in a `Vec` behind a
//! `tokio::sync::RwLock`. It is used by tests and by ephemeral runs that
//! should not touch disk.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{SearchResult, VectorRecord};
use crate::error::Result;
use crate::vectorstore::{VectorStore, check_batch_dimensions, check_query_dimensions, rank};

#[derive(Debug, Default)]
struct Index {
    records: Vec<VectorRecord>,
    dimensions: Option<usize>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.upsert(&records).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    index: RwLock<Index>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut index = self.index.write().await;
        index.dimensions = check_batch_dimensions(index.dimensions, records)?;
        index.records.extend_from_slice(records);
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let index = self.index.read().await;
        if index.records.is_empty() {
            return Ok(Vec::new());
        }
        check_query_dimensions(index.dimensions, embedding)?;
        Ok(rank(&index.records, embedding, top_k))
    }

    async fn clear(&self) -> Result<()> {
        let mut index = self.index.write().await;
        *index = Index::default();
        Ok(())
    }

    async fn replace(&self, records: &[VectorRecord]) -> Result<()> {
        let mut index = self.index.write().await;
        let dimensions = check_batch_dimensions(None, records)?;
        *index = Index { records: records.to_vec(), dimensions };
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.read().await.records.len())
    }

    async fn dimensions(&self) -> Result<Option<usize>> {
        Ok(self.index.read().await.dimensions)
    }
}
