//! Data types for documents, chunks, stored records and search results.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata key holding the source path of a document.
pub const SOURCE_KEY: &str = "source";

/// Metadata key holding the position of a chunk within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A loaded source document. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Path the document was loaded from; doubles as its identifier.
    pub path: PathBuf,
    /// The raw text content.
    pub content: String,
    /// Key-value metadata. Always contains [`SOURCE_KEY`] for loaded files.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document whose metadata carries its source path.
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        let metadata = HashMap::from([(SOURCE_KEY.to_string(), path.display().to_string())]);
        Self { path, content: content.into(), metadata }
    }
}

/// A contiguous slice of a [`Document`], the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The chunk text, an exact substring of the document content.
    pub text: String,
    /// Position of this chunk within its document, starting at zero.
    pub ordinal: usize,
    /// Metadata inherited from the document plus [`CHUNK_INDEX_KEY`].
    pub metadata: HashMap<String, String>,
}

/// A chunk persisted with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Unique record identifier.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// The embedding of `text`.
    pub embedding: Vec<f32>,
    /// Metadata carried over from the chunk.
    pub metadata: HashMap<String, String>,
}

impl VectorRecord {
    /// Pair a chunk with its embedding under a fresh random id.
    pub fn from_chunk(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: chunk.text,
            embedding,
            metadata: chunk.metadata,
        }
    }
}

/// A retrieved record paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Identifier of the matched record.
    pub id: String,
    /// The matched chunk text.
    pub text: String,
    /// Metadata of the matched record.
    pub metadata: HashMap<String, String>,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

impl SearchResult {
    /// The source path recorded for this result, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}
