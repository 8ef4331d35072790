//! Error types for the `sopqa-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in chunking, embedding, storage and ingestion.
#[derive(Debug, Error)]
pub enum RagError {
    /// A required setting, credential or model identifier is missing or invalid.
    ///
    /// This is fatal at startup: callers should refuse to run rather than
    /// produce embeddings with a misconfigured provider.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The embedding backend could not be reached.
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// The embedding provider that could not be reached.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend answered, but not with usable embeddings.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's dimension does not match the dimension the store was built with.
    #[error("Dimension mismatch: store holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        /// Dimension recorded by the store.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// A single source file could not be loaded.
    #[error("Failed to load {path}: {message}")]
    IngestionFile {
        /// The file that failed.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The ingestion source directory could not be read.
    #[error("Cannot read source directory {path}: {source}")]
    SourceDirectory {
        /// The directory passed to ingestion.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
