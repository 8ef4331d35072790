//! Persistent vector store kept in a directory of JSON files.
//!
//! Layout of a store directory:
//!
//! - `manifest.json` describes the index: format version, vector dimension,
//!   record count, the name of the records file and timestamps.
//! - `records.jsonl` (or the file the manifest names after a replacement)
//!   holds one [`VectorRecord`] per line, in insertion order.
//!
//! The manifest is the commit point. Appends write records first and then
//! rename a new manifest into place; only the first `record_count` lines are
//! ever read, so a write that fails half way leaves an ignored tail that the
//! next append overwrites. Replacements write a fresh records file and switch
//! to it with the same rename.
//!
//! Opening the same directory after a restart rebuilds the same index
//! without re-ingestion. A directory that does not exist opens as an empty
//! store and is only created by the first non-empty write.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{SearchResult, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, check_batch_dimensions, check_query_dimensions, rank};

/// Version of the on-disk layout written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Records file of a store that was never replaced.
pub const DEFAULT_RECORDS_FILE: &str = "records.jsonl";

const MANIFEST_FILE: &str = "manifest.json";
const BACKEND: &str = "file";

fn default_records_file() -> String {
    DEFAULT_RECORDS_FILE.to_string()
}

/// Self-describing header of a store directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// On-disk layout version.
    pub format_version: u32,
    /// Dimension of every stored vector; `None` until the first record.
    pub dimensions: Option<usize>,
    /// Number of committed lines at the start of the records file.
    pub record_count: usize,
    /// Name of the records file inside the store directory.
    #[serde(default = "default_records_file")]
    pub records_file: String,
    /// When the store was first written.
    pub created_at: DateTime<Utc>,
    /// When the store was last written.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<VectorRecord>,
    manifest: Option<Manifest>,
    /// Byte length of the committed prefix of the records file.
    committed_bytes: u64,
}

impl State {
    fn dimensions(&self) -> Option<usize> {
        self.manifest.as_ref().and_then(|m| m.dimensions)
    }

    fn records_file(&self) -> &str {
        self.manifest.as_ref().map_or(DEFAULT_RECORDS_FILE, |m| m.records_file.as_str())
    }

    fn next_manifest(&self, dimensions: Option<usize>, record_count: usize) -> Manifest {
        let now = Utc::now();
        Manifest {
            format_version: FORMAT_VERSION,
            dimensions,
            record_count,
            records_file: self.records_file().to_string(),
            created_at: self.manifest.as_ref().map_or(now, |m| m.created_at),
            updated_at: now,
        }
    }
}

/// A [`VectorStore`] persisted to a directory.
///
/// Records are loaded into memory on open; searches never touch disk.
///
/// # Example
///
/// ```rust,ignore
/// use sopqa_rag::{FileVectorStore, VectorStore};
///
/// let store = FileVectorStore::open("./vector_db").await?;
/// println!("{} records", store.len().await?);
/// ```
#[derive(Debug)]
pub struct FileVectorStore {
    root: PathBuf,
    state: RwLock<State>,
}

fn store_error(message: impl Into<String>) -> RagError {
    RagError::VectorStore { backend: BACKEND.to_string(), message: message.into() }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> RagError {
    store_error(format!("failed to {action} {}: {e}", path.display()))
}

impl FileVectorStore {
    /// Open the store at `path`, loading any previously written records.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if the directory holds a manifest
    /// that cannot be read or parsed, has an unknown format version, or
    /// lists more records than the records file holds.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let root = path.into();
        let state = Self::load(&root).await?;
        info!(
            path = %root.display(),
            records = state.records.len(),
            dimensions = ?state.dimensions(),
            "opened vector store"
        );
        Ok(Self { root, state: RwLock::new(state) })
    }

    /// The directory backing this store.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// A copy of the current manifest, `None` if nothing was ever written.
    pub async fn manifest(&self) -> Option<Manifest> {
        self.state.read().await.manifest.clone()
    }

    async fn load(root: &Path) -> Result<State> {
        let manifest_path = root.join(MANIFEST_FILE);

        let manifest_exists = tokio::fs::try_exists(&manifest_path)
            .await
            .map_err(|e| io_error("inspect", &manifest_path, e))?;
        if !manifest_exists {
            let records_path = root.join(DEFAULT_RECORDS_FILE);
            let records_exist = tokio::fs::try_exists(&records_path)
                .await
                .map_err(|e| io_error("inspect", &records_path, e))?;
            if records_exist {
                return Err(store_error(format!(
                    "{} exists without {MANIFEST_FILE}",
                    records_path.display()
                )));
            }
            return Ok(State::default());
        }

        let raw = tokio::fs::read_to_string(&manifest_path)
            .await
            .map_err(|e| io_error("read", &manifest_path, e))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| store_error(format!("invalid {MANIFEST_FILE}: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(store_error(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            )));
        }
        if Path::new(&manifest.records_file).file_name().and_then(|n| n.to_str())
            != Some(manifest.records_file.as_str())
        {
            return Err(store_error(format!(
                "records file {:?} is not a plain file name",
                manifest.records_file
            )));
        }

        let (records, committed_bytes) = if manifest.record_count == 0 {
            (Vec::new(), 0)
        } else {
            let records_path = root.join(&manifest.records_file);
            let raw = tokio::fs::read(&records_path)
                .await
                .map_err(|e| io_error("read", &records_path, e))?;
            let (records, committed) = parse_committed(&raw, manifest.record_count)?;
            if committed < raw.len() {
                warn!(
                    path = %records_path.display(),
                    bytes = raw.len() - committed,
                    "ignoring uncommitted tail of records file"
                );
            }
            (records, committed as u64)
        };

        if let Some(expected) = manifest.dimensions {
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: bad.embedding.len(),
                });
            }
        }

        Ok(State { records, manifest: Some(manifest), committed_bytes })
    }

    async fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = self.root.join(MANIFEST_FILE);
        let tmp = self.root.join(format!("{MANIFEST_FILE}.tmp"));
        let contents = serde_json::to_string_pretty(manifest)
            .map_err(|e| store_error(format!("failed to serialize manifest: {e}")))?;
        tokio::fs::write(&tmp, contents).await.map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| io_error("replace", &path, e))
    }

    /// Write `lines` at the end of the committed prefix of `path`.
    async fn append_at(path: &Path, offset: u64, lines: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .await
            .map_err(|e| io_error("open", path, e))?;
        file.set_len(offset).await.map_err(|e| io_error("truncate", path, e))?;
        file.seek(SeekFrom::Start(offset)).await.map_err(|e| io_error("seek", path, e))?;
        file.write_all(lines).await.map_err(|e| io_error("append to", path, e))?;
        file.flush().await.map_err(|e| io_error("flush", path, e))?;
        file.sync_data().await.map_err(|e| io_error("sync", path, e))
    }

    /// Cut `path` back to `offset` after a failed write.
    async fn roll_back(path: &Path, offset: u64) {
        let truncated = match tokio::fs::OpenOptions::new().write(true).open(path).await {
            Ok(file) => file.set_len(offset).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = truncated {
            warn!(path = %path.display(), error = %e, "could not drop uncommitted records");
        }
    }
}

fn serialize_lines(records: &[VectorRecord]) -> Result<Vec<u8>> {
    let mut lines = Vec::new();
    for record in records {
        serde_json::to_writer(&mut lines, record)
            .map_err(|e| store_error(format!("failed to serialize record: {e}")))?;
        lines.push(b'\n');
    }
    Ok(lines)
}

/// Parse the first `expected` records and return them with the byte length
/// they occupy. Anything after them is an uncommitted tail.
fn parse_committed(raw: &[u8], expected: usize) -> Result<(Vec<VectorRecord>, usize)> {
    let mut records: Vec<VectorRecord> = Vec::with_capacity(expected);
    let mut offset = 0;
    for (i, line) in raw.split_inclusive(|b| *b == b'\n').enumerate() {
        if records.len() == expected {
            break;
        }
        offset += line.len();
        if line.trim_ascii().is_empty() {
            continue;
        }
        let record: VectorRecord = serde_json::from_slice(line)
            .map_err(|e| store_error(format!("invalid record on line {}: {e}", i + 1)))?;
        records.push(record);
    }

    if records.len() < expected {
        return Err(store_error(format!(
            "manifest lists {expected} records but the records file holds {}",
            records.len()
        )));
    }
    Ok((records, offset))
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let dimensions = check_batch_dimensions(state.dimensions(), records)?;
        let lines = serialize_lines(records)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error("create", &self.root, e))?;

        let records_path = self.root.join(state.records_file());
        let manifest = state.next_manifest(dimensions, state.records.len() + records.len());
        let written = match Self::append_at(&records_path, state.committed_bytes, &lines).await {
            Ok(()) => self.write_manifest(&manifest).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if state.manifest.is_some() {
                Self::roll_back(&records_path, state.committed_bytes).await;
            } else if let Err(cleanup) = tokio::fs::remove_file(&records_path).await {
                warn!(path = %records_path.display(), error = %cleanup, "could not remove uncommitted records file");
            }
            return Err(e);
        }

        state.records.extend_from_slice(records);
        state.committed_bytes += lines.len() as u64;
        state.manifest = Some(manifest);
        debug!(path = %self.root.display(), added = records.len(), "records persisted");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;
        if state.records.is_empty() {
            return Ok(Vec::new());
        }
        check_query_dimensions(state.dimensions(), embedding)?;
        Ok(rank(&state.records, embedding, top_k))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.manifest.is_none() {
            return Ok(());
        }

        let manifest = state.next_manifest(None, 0);
        self.write_manifest(&manifest).await?;

        // Committed as empty; leftover lines are an ignored tail from here on.
        let records_path = self.root.join(state.records_file());
        Self::roll_back(&records_path, 0).await;

        state.records.clear();
        state.committed_bytes = 0;
        state.manifest = Some(manifest);
        info!(path = %self.root.display(), "vector store cleared");
        Ok(())
    }

    async fn replace(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return self.clear().await;
        }

        let mut state = self.state.write().await;
        let dimensions = check_batch_dimensions(None, records)?;
        let lines = serialize_lines(records)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error("create", &self.root, e))?;

        let previous_file = state.manifest.as_ref().map(|m| m.records_file.clone());
        let next_file = format!("records-{}.jsonl", uuid::Uuid::new_v4().simple());
        let next_path = self.root.join(&next_file);
        let mut manifest = state.next_manifest(dimensions, records.len());
        manifest.records_file = next_file;

        let written = match tokio::fs::write(&next_path, &lines).await {
            Ok(()) => self.write_manifest(&manifest).await,
            Err(e) => Err(io_error("write", &next_path, e)),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&next_path).await {
                debug!(path = %next_path.display(), error = %cleanup, "no partial records file to remove");
            }
            return Err(e);
        }

        if let Some(previous) = previous_file {
            let previous_path = self.root.join(previous);
            if let Err(e) = tokio::fs::remove_file(&previous_path).await {
                warn!(path = %previous_path.display(), error = %e, "could not remove replaced records file");
            }
        }

        state.records = records.to_vec();
        state.committed_bytes = lines.len() as u64;
        state.manifest = Some(manifest);
        info!(path = %self.root.display(), records = records.len(), "vector store replaced");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.read().await.records.len())
    }

    async fn dimensions(&self) -> Result<Option<usize>> {
        Ok(self.state.read().await.dimensions())
    }
}
