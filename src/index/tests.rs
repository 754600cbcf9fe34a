use super::*;
use crate::index::flat::FlatIndex;

fn record(id: &str, vector: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        vector,
        metadata: ChunkMetadata {
            chunk_id: id.to_string(),
            document_id: "doc-1".to_string(),
            source: "doc-1.txt".to_string(),
            title: None,
            page: None,
            chunk_index: 0,
            content: "some content".to_string(),
        },
    }
}

#[tokio::test]
async fn open_writes_manifest_on_first_use() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    let index = SearchIndex::open(
        Box::new(FlatIndex::in_memory()),
        dir.path(),
        "offline-hash-v1",
        4,
    )
    .expect("open should succeed");

    assert!(dir.path().join("manifest.json").exists());
    assert_eq!(index.manifest().model, "offline-hash-v1");
    assert_eq!(index.manifest().dimension, 4);
}

#[tokio::test]
async fn reopening_with_same_model_succeeds() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    SearchIndex::open(Box::new(FlatIndex::in_memory()), dir.path(), "model-a", 4)
        .expect("first open should succeed");
    SearchIndex::open(Box::new(FlatIndex::in_memory()), dir.path(), "model-a", 4)
        .expect("second open should succeed");
}

#[tokio::test]
async fn model_mismatch_is_refused() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    SearchIndex::open(Box::new(FlatIndex::in_memory()), dir.path(), "model-a", 4)
        .expect("first open should succeed");

    let result = SearchIndex::open(Box::new(FlatIndex::in_memory()), dir.path(), "model-b", 4);
    assert!(matches!(result, Err(RagError::Index(_))));
}

#[tokio::test]
async fn dimension_mismatch_is_refused() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    SearchIndex::open(Box::new(FlatIndex::in_memory()), dir.path(), "model-a", 4)
        .expect("first open should succeed");

    let result = SearchIndex::open(Box::new(FlatIndex::in_memory()), dir.path(), "model-a", 8);
    assert!(matches!(result, Err(RagError::Index(_))));
}

#[tokio::test]
async fn insert_rejects_wrong_dimension() {
    let index = SearchIndex::in_memory(Box::new(FlatIndex::in_memory()), "model-a", 4);

    let result = index.insert(vec![record("a", vec![1.0, 0.0])]).await;
    assert!(matches!(result, Err(RagError::Index(_))));
    assert_eq!(index.count().await.expect("count"), 0);
}

#[tokio::test]
async fn search_rejects_wrong_dimension() {
    let index = SearchIndex::in_memory(Box::new(FlatIndex::in_memory()), "model-a", 4);

    let result = index.search(&[1.0, 0.0], 5, None).await;
    assert!(matches!(result, Err(RagError::Index(_))));
}

#[tokio::test]
async fn insert_search_and_remove_round_trip() {
    let index = SearchIndex::in_memory(Box::new(FlatIndex::in_memory()), "model-a", 2);

    index
        .insert(vec![record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])])
        .await
        .expect("insert should succeed");
    assert_eq!(index.count().await.expect("count"), 2);

    let hits = index
        .search(&[1.0, 0.0], 1, None)
        .await
        .expect("search should succeed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.chunk_id, "a");

    let removed = index
        .remove_document("doc-1")
        .await
        .expect("removal should succeed");
    assert_eq!(removed, 2);
    assert_eq!(index.count().await.expect("count"), 0);
}
