//! Document chunking.
//!
//! [`RecursiveChunker`] splits text hierarchically: paragraphs, lines,
//! sentences, words, and finally single characters when nothing else fits.
//! Chunks are exact substrings of the source, and sizes are counted in
//! characters rather than bytes.

use std::collections::VecDeque;

use crate::config::RagConfig;
use crate::document::{CHUNK_INDEX_KEY, Chunk, Document};

/// Separators tried in order, coarsest first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace content.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text hierarchically with character overlap between neighbours.
///
/// The first separator that occurs in the text is used to cut it into
/// pieces; each separator stays attached to the piece before it, so no
/// character is dropped. Pieces longer than `chunk_size` are split again with
/// the remaining separators, bottoming out at single characters. Fitting
/// pieces are merged greedily, and when a chunk is emitted its trailing
/// pieces (up to `chunk_overlap` characters) open the next one.
///
/// No chunk is longer than `chunk_size` characters.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk, at least 1
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        split_recursive(text, self.chunk_size, self.chunk_overlap, &SEPARATORS)
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let (pieces, remaining) = match separators.iter().position(|sep| text.contains(sep)) {
        Some(i) => (split_keeping_separator(text, separators[i]), &separators[i + 1..]),
        None => (split_chars(text), &[][..]),
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
            fitting.clear();
        }
        chunks.extend(split_recursive(piece, chunk_size, chunk_overlap, remaining));
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
    }

    chunks
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

fn split_chars(text: &str) -> Vec<&str> {
    text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect()
}

/// Merge contiguous pieces into chunks of at most `chunk_size` characters.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > chunk_size && !window.is_empty() {
            chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
            // Keep a tail of at most `chunk_overlap` chars that still leaves room for `piece`.
            while total > chunk_overlap || (total > 0 && total + len > chunk_size) {
                let Some((_, dropped)) = window.pop_front() else { break };
                total -= dropped;
            }
        }
        window.push_back((piece, len));
        total += len;
    }

    if !window.is_empty() {
        chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), ordinal.to_string());
                Chunk { text, ordinal, metadata }
            })
            .collect()
    }
}
