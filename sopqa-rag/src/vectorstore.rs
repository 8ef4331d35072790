//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{SearchResult, VectorRecord};
use crate::error::{RagError, Result};

/// A storage backend for embedded chunks with similarity search.
///
/// A store holds vectors of a single dimension, fixed by the first record it
/// receives. Writes are expected to come from one ingestion run at a time;
/// reads may be concurrent.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_rag::{FileVectorStore, VectorStore};
///
/// let store = FileVectorStore::open("./vector_db").await?;
/// store.upsert(&records).await?;
/// let results = store.search(&query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append records to the store.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Search for the `top_k` most similar records to the given embedding.
    ///
    /// Returns at most `top_k` results ordered by descending similarity, ties
    /// in insertion order. An empty store yields an empty `Vec`.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Remove every record.
    async fn clear(&self) -> Result<()>;

    /// Swap the whole contents of the store for `records`.
    ///
    /// Backends that can do so make this all-or-nothing: on error the
    /// previous records stay in place. The default clears, then upserts.
    async fn replace(&self, records: &[VectorRecord]) -> Result<()> {
        self.clear().await?;
        self.upsert(records).await
    }

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;

    /// Whether the store holds no records.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Dimension of the stored vectors, if any record has been written.
    async fn dimensions(&self) -> Result<Option<usize>>;
}

/// Compute cosine similarity between two vectors.
///
/// Accumulates in `f64` so large finite components do not overflow. Returns
/// 0.0 if either vector has zero magnitude or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = (dot / (norm_a * norm_b)) as f32;
    if score.is_finite() { score } else { 0.0 }
}

/// Score `records` against `embedding` and keep the best `top_k`.
///
/// The sort is stable, so equal scores keep insertion order.
pub(crate) fn rank(records: &[VectorRecord], embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
    let mut scored: Vec<(usize, f32)> = records
        .iter()
        .enumerate()
        .map(|(i, record)| (i, cosine_similarity(&record.embedding, embedding)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(i, score)| {
            let record = &records[i];
            SearchResult {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score,
            }
        })
        .collect()
}

/// Validate that every record in a batch has the store's dimension.
///
/// Returns the dimension the store should record after the batch.
pub(crate) fn check_batch_dimensions(
    current: Option<usize>,
    records: &[VectorRecord],
) -> Result<Option<usize>> {
    let mut expected = current;
    for record in records {
        let actual = record.embedding.len();
        match expected {
            Some(expected) if expected != actual => {
                return Err(RagError::DimensionMismatch { expected, actual });
            }
            Some(_) => {}
            None => expected = Some(actual),
        }
    }
    Ok(expected)
}

/// Validate a query vector against the store's dimension.
pub(crate) fn check_query_dimensions(current: Option<usize>, embedding: &[f32]) -> Result<()> {
    match current {
        Some(expected) if expected != embedding.len() => {
            Err(RagError::DimensionMismatch { expected, actual: embedding.len() })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord { id: id.into(), text: id.into(), embedding, metadata: HashMap::new() }
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let records = vec![
            record("first", vec![1.0, 0.0]),
            record("other", vec![0.0, 1.0]),
            record("second", vec![2.0, 0.0]),
            record("third", vec![3.0, 0.0]),
        ];
        let ids: Vec<_> = rank(&records, &[1.0, 0.0], 3).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }

    #[test]
    fn extreme_components_still_rank() {
        let records = vec![
            record("nan", vec![f32::NAN, 1.0]),
            record("huge", vec![3.0e38, 3.0e38]),
            record("orthogonal", vec![1.0, -1.0]),
        ];
        assert_eq!(cosine_similarity(&records[0].embedding, &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&records[1].embedding, &[1.0, 1.0]) - 1.0).abs() < 1e-6);

        let ids: Vec<_> = rank(&records, &[1.0, 1.0], 3).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["huge", "nan", "orthogonal"]);
    }

    #[test]
    fn batch_dimensions_must_agree() {
        let records = vec![record("a", vec![1.0, 0.0]), record("b", vec![1.0])];
        assert!(matches!(
            check_batch_dimensions(None, &records),
            Err(RagError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(check_batch_dimensions(Some(2), &records[..1]).unwrap(), Some(2));
        assert!(check_query_dimensions(Some(3), &[1.0]).is_err());
        assert!(check_query_dimensions(None, &[1.0]).is_ok());
    }
}
