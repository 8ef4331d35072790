//! Ingestion pipeline: load markdown, chunk, embed, store.
//!
//! The [`IngestionPipeline`] composes a [`Chunker`], an
//! [`EmbeddingProvider`] and a [`VectorStore`]. One run embeds every chunk of
//! every loaded file in a single `embed_many` call.
//!
//! # Example
//!
//! ```rust,ignore
//! use sopqa_rag::{FileVectorStore, IngestionPipeline, RecursiveChunker};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .chunker(Arc::new(RecursiveChunker::default()))
//!     .embedding_provider(embedder)
//!     .vector_store(Arc::new(FileVectorStore::open("./vector_db").await?))
//!     .build()?;
//!
//! let report = pipeline.ingest(Path::new("./rag/docs")).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::document::{Chunk, VectorRecord};
use crate::embedding::{EmbeddingProvider, expect_count};
use crate::error::{RagError, Result};
use crate::loader::{discover_markdown, load_markdown};
use crate::vectorstore::VectorStore;

/// Options for a single ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Replace existing records with the new ones instead of appending.
    ///
    /// Without it a re-run appends duplicates of already ingested chunks.
    /// The swap goes through [`VectorStore::replace`], so a failed write
    /// leaves the previous records in stores that support it.
    pub clear_before_ingest: bool,
}

/// A file that was skipped during ingestion.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedFile {
    /// The file that failed to load.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IngestionReport {
    /// Files loaded successfully.
    pub documents_loaded: usize,
    /// Chunks produced from the loaded files.
    pub chunks_created: usize,
    /// Records written to the store.
    pub records_written: usize,
    /// Files that failed to load, with reasons.
    pub skipped: Vec<SkippedFile>,
}

/// Orchestrates directory ingestion into a vector store.
///
/// Construct one via [`IngestionPipeline::builder()`].
pub struct IngestionPipeline {
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    options: IngestOptions,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Ingest every markdown file directly inside `source_dir`.
    ///
    /// Files that fail to load are reported in [`IngestionReport::skipped`]
    /// and do not stop the run. When no chunks result, the store is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if `source_dir` cannot be read, if embedding fails
    /// (nothing is written in that case), or if the store rejects the write.
    pub async fn ingest(&self, source_dir: &Path) -> Result<IngestionReport> {
        let files = discover_markdown(source_dir).await?;
        info!(dir = %source_dir.display(), files = files.len(), "discovered markdown files");

        let mut report = IngestionReport::default();
        let mut chunks: Vec<Chunk> = Vec::new();

        for path in files {
            match load_markdown(&path).await {
                Ok(document) => {
                    let document_chunks = self.chunker.chunk(&document);
                    info!(file = %path.display(), chunk_count = document_chunks.len(), "loaded document");
                    report.documents_loaded += 1;
                    chunks.extend(document_chunks);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping file");
                    report.skipped.push(SkippedFile { path, reason: e.to_string() });
                }
            }
        }

        report.chunks_created = chunks.len();
        if chunks.is_empty() {
            info!(skipped = report.skipped.len(), "nothing to ingest; vector store untouched");
            return Ok(report);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_many(&texts).await.map_err(|e| {
            error!(provider = self.embedding_provider.name(), error = %e, "embedding failed during ingestion");
            e
        })?;
        let embeddings = expect_count(self.embedding_provider.name(), chunks.len(), embeddings)?;

        let records: Vec<VectorRecord> =
            chunks.into_iter().zip(embeddings).map(|(c, e)| VectorRecord::from_chunk(c, e)).collect();

        let written = if self.options.clear_before_ingest {
            self.vector_store.replace(&records).await
        } else {
            self.vector_store.upsert(&records).await
        };
        written.map_err(|e| {
            error!(error = %e, "vector store write failed during ingestion");
            e
        })?;

        report.records_written = records.len();
        info!(
            documents = report.documents_loaded,
            chunks = report.chunks_created,
            records = report.records_written,
            skipped = report.skipped.len(),
            "ingestion complete"
        );
        Ok(report)
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// The chunker, embedding provider and vector store are required.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    options: IngestOptions,
}

impl IngestionPipelineBuilder {
    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the run options.
    pub fn options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the [`IngestionPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if any required field is missing.
    pub fn build(self) -> Result<IngestionPipeline> {
        let chunker = self
            .chunker
            .ok_or_else(|| RagError::Configuration("chunker is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Configuration("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Configuration("vector_store is required".to_string()))?;

        Ok(IngestionPipeline { chunker, embedding_provider, vector_store, options: self.options })
    }
}
