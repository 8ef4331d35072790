//! Persistence tests for the file-backed vector store.

use std::collections::HashMap;

use sopqa_rag::filestore::{FORMAT_VERSION, FileVectorStore};
use sopqa_rag::{RagError, VectorRecord, VectorStore};

fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: id.into(),
        text: format!("chunk {id}"),
        embedding,
        metadata: HashMap::from([("source".to_string(), "sop.md".to_string())]),
    }
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vector_db");

    {
        let store = FileVectorStore::open(&path).await.unwrap();
        store
            .upsert(&[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])])
            .await
            .unwrap();
        store.upsert(&[record("c", vec![0.7, 0.7])]).await.unwrap();
    }

    let reopened = FileVectorStore::open(&path).await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 3);
    assert_eq!(reopened.dimensions().await.unwrap(), Some(2));

    let manifest = reopened.manifest().await.unwrap();
    assert_eq!(manifest.format_version, FORMAT_VERSION);
    assert_eq!(manifest.record_count, 3);

    let results = reopened.search(&[0.0, 1.0], 1).await.unwrap();
    assert_eq!(results[0].id, "b");
    assert_eq!(results[0].source(), Some("sop.md"));
}

#[tokio::test]
async fn missing_path_is_empty_and_not_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never_written");

    let store = FileVectorStore::open(&path).await.unwrap();
    assert!(store.is_empty().await.unwrap());
    assert!(store.search(&[1.0, 0.0], 3).await.unwrap().is_empty());
    store.upsert(&[]).await.unwrap();
    store.clear().await.unwrap();

    assert!(!path.exists());
    assert!(store.manifest().await.is_none());
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.upsert(&[record("a", vec![1.0, 0.0, 0.0])]).await.unwrap();

    let err = store.upsert(&[record("b", vec![1.0])]).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 1 }));

    let err = store.search(&[1.0, 0.0], 1).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 1);
}

#[tokio::test]
async fn clear_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.upsert(&[record("a", vec![1.0, 0.0])]).await.unwrap();
    let created_at = store.manifest().await.unwrap().created_at;
    store.clear().await.unwrap();

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    assert!(reopened.is_empty().await.unwrap());
    let manifest = reopened.manifest().await.unwrap();
    assert_eq!(manifest.dimensions, None);
    assert_eq!(manifest.created_at, created_at);
}

#[tokio::test]
async fn corrupt_manifest_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("manifest.json"), "{ not json").unwrap();

    let err = FileVectorStore::open(dir.path()).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
}

#[tokio::test]
async fn unknown_format_version_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.upsert(&[record("a", vec![1.0])]).await.unwrap();

    let manifest_path = dir.path().join("manifest.json");
    let mut manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    manifest["format_version"] = serde_json::json!(FORMAT_VERSION + 1);
    std::fs::write(&manifest_path, manifest.to_string()).unwrap();

    let err = FileVectorStore::open(dir.path()).await.unwrap_err();
    assert!(err.to_string().contains("unsupported format version"));
}

#[tokio::test]
async fn record_count_disagreement_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.upsert(&[record("a", vec![1.0]), record("b", vec![0.5])]).await.unwrap();

    let records_path = dir.path().join("records.jsonl");
    let raw = std::fs::read_to_string(&records_path).unwrap();
    let first_line = raw.lines().next().unwrap();
    std::fs::write(&records_path, format!("{first_line}\n")).unwrap();

    let err = FileVectorStore::open(dir.path()).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
}

#[tokio::test]
async fn records_without_manifest_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("records.jsonl"), "").unwrap();

    assert!(FileVectorStore::open(dir.path()).await.is_err());
}

/// Make the next manifest write fail by putting a directory where its
/// temporary file goes.
fn block_manifest_writes(dir: &std::path::Path) -> std::path::PathBuf {
    let blocker = dir.join("manifest.json.tmp");
    std::fs::create_dir(&blocker).unwrap();
    blocker
}

#[tokio::test]
async fn failed_manifest_write_keeps_the_store_openable() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.upsert(&[record("a", vec![1.0, 0.0])]).await.unwrap();

    let blocker = block_manifest_writes(dir.path());
    let err = store.upsert(&[record("b", vec![0.0, 1.0])]).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
    assert_eq!(store.len().await.unwrap(), 1);

    let raw = std::fs::read_to_string(dir.path().join("records.jsonl")).unwrap();
    assert_eq!(raw.lines().count(), 1);

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 1);

    std::fs::remove_dir(&blocker).unwrap();
    store.upsert(&[record("c", vec![0.0, 1.0])]).await.unwrap();
    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    let ids: Vec<_> =
        reopened.search(&[1.0, 0.0], 5).await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["a", "c"]);
}

#[tokio::test]
async fn torn_tail_is_ignored_and_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        store.upsert(&[record("a", vec![1.0, 0.0])]).await.unwrap();
    }

    let records_path = dir.path().join("records.jsonl");
    let mut raw = std::fs::read(&records_path).unwrap();
    raw.extend_from_slice(b"{\"id\":\"half-writ");
    std::fs::write(&records_path, raw).unwrap();

    let store = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 1);
    store.upsert(&[record("b", vec![0.0, 1.0])]).await.unwrap();

    let raw = std::fs::read_to_string(&records_path).unwrap();
    assert_eq!(raw.lines().count(), 2);
    assert!(!raw.contains("half-writ"));
    assert_eq!(FileVectorStore::open(dir.path()).await.unwrap().len().await.unwrap(), 2);
}

#[tokio::test]
async fn failed_replace_keeps_previous_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.upsert(&[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])]).await.unwrap();

    let blocker = block_manifest_writes(dir.path());
    assert!(store.replace(&[record("new", vec![1.0, 1.0, 1.0])]).await.is_err());
    assert_eq!(store.len().await.unwrap(), 2);
    std::fs::remove_dir(&blocker).unwrap();

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 2);
    assert_eq!(reopened.dimensions().await.unwrap(), Some(2));
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.starts_with("records-"))
        .collect();
    assert!(leftovers.is_empty(), "partial records files left behind: {leftovers:?}");
}

#[tokio::test]
async fn replace_swaps_contents_and_dimension() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.upsert(&[record("a", vec![1.0, 0.0])]).await.unwrap();

    store.replace(&[record("x", vec![1.0, 0.0, 0.0]), record("y", vec![0.0, 0.0, 1.0])]).await.unwrap();
    store.upsert(&[record("z", vec![0.0, 1.0, 0.0])]).await.unwrap();

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    let manifest = reopened.manifest().await.unwrap();
    assert_eq!(manifest.record_count, 3);
    assert_eq!(manifest.dimensions, Some(3));
    assert_ne!(manifest.records_file, "records.jsonl");
    assert!(!dir.path().join("records.jsonl").exists());

    let ids: Vec<_> =
        reopened.search(&[1.0, 0.0, 0.0], 5).await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["x", "y", "z"]);
}

#[tokio::test]
async fn failed_first_write_leaves_no_records_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();

    let blocker = block_manifest_writes(dir.path());
    assert!(store.upsert(&[record("a", vec![1.0])]).await.is_err());
    std::fs::remove_dir(&blocker).unwrap();

    assert!(!dir.path().join("records.jsonl").exists());
    assert!(FileVectorStore::open(dir.path()).await.unwrap().is_empty().await.unwrap());
}
