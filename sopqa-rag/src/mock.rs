//! Deterministic embedding provider for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Hash-based embeddings: identical texts get identical unit vectors.
///
/// Optionally simulates an unreachable backend, and counts calls so tests can
/// assert on batching.
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    unavailable: bool,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, unavailable: false, calls: AtomicUsize::new(0) }
    }

    /// Create a provider whose every call fails with [`RagError::ProviderUnavailable`].
    pub fn unavailable() -> Self {
        Self { dimensions: 0, unavailable: true, calls: AtomicUsize::new(0) }
    }

    /// Number of `embed` / `embed_many` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // FNV-1a over the text, then a splitmix finalizer per component.
        let seed = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            let mut x = seed ^ (i as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15);
            x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            x ^= x >> 31;
            *v = (x >> 40) as f32 / (1u64 << 23) as f32 - 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }

    fn check_available(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(RagError::ProviderUnavailable {
                provider: "Mock".into(),
                message: "connection refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.check_available()?;
        Ok(self.vector_for(text))
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.check_available()?;
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
