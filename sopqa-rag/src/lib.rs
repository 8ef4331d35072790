//! # sopqa-rag
//!
//! Retrieval half of the SOP QA assistant: markdown loading, recursive
//! chunking, embedding, persistent vector storage and query-time retrieval.
//!
//! ## Components
//!
//! - [`RecursiveChunker`]: splits documents on paragraph, line, sentence and
//!   word boundaries into overlapping chunks
//! - [`EmbeddingProvider`]: [`OllamaEmbeddingProvider`] for a local server,
//!   [`GeminiEmbeddingProvider`] for the cloud, [`MockEmbeddingProvider`] for tests
//! - [`VectorStore`]: [`FileVectorStore`] persisted to a directory,
//!   [`InMemoryVectorStore`] for ephemeral runs
//! - [`IngestionPipeline`]: directory -> chunks -> embeddings -> store
//! - [`Retriever`]: query -> top-k chunks, never failing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sopqa_rag::*;
//!
//! let embedder: Arc<dyn EmbeddingProvider> =
//!     Arc::new(OllamaEmbeddingProvider::new(DEFAULT_OLLAMA_URL));
//! let store: Arc<dyn VectorStore> = Arc::new(FileVectorStore::open("./vector_db").await?);
//!
//! let pipeline = IngestionPipeline::builder()
//!     .chunker(Arc::new(RecursiveChunker::default()))
//!     .embedding_provider(embedder.clone())
//!     .vector_store(store.clone())
//!     .build()?;
//! pipeline.ingest(Path::new("./rag/docs")).await?;
//!
//! let retriever = Retriever::new(embedder, Ok(store));
//! let retrieval = retriever.retrieve("What is the bug triage process?", 3).await;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filestore;
pub mod gemini;
pub mod inmemory;
pub mod loader;
pub mod mock;
pub mod ollama;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{CHUNK_INDEX_KEY, Chunk, Document, SOURCE_KEY, SearchResult, VectorRecord};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use filestore::{FileVectorStore, Manifest};
pub use gemini::{DEFAULT_GEMINI_EMBEDDING_MODEL, DEFAULT_GEMINI_URL, GeminiEmbeddingProvider};
pub use inmemory::InMemoryVectorStore;
pub use loader::{discover_markdown, load_markdown};
pub use mock::MockEmbeddingProvider;
pub use ollama::{DEFAULT_OLLAMA_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL, OllamaEmbeddingProvider};
pub use pipeline::{IngestOptions, IngestionPipeline, IngestionPipelineBuilder, IngestionReport, SkippedFile};
pub use retriever::{Retrieval, RetrievalStatus, Retriever};
pub use vectorstore::{VectorStore, cosine_similarity};
