use super::*;
use crate::index::ChunkMetadata;

fn record(id: &str, document_id: &str, vector: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        vector,
        metadata: ChunkMetadata {
            chunk_id: id.to_string(),
            document_id: document_id.to_string(),
            source: format!("{}.txt", document_id),
            title: Some("Test Title".to_string()),
            page: Some(1),
            chunk_index: 0,
            content: format!("content of {}", id),
        },
    }
}

#[test]
fn document_predicate_quotes_ids() {
    let documents: HashSet<String> = ["doc-1".to_string()].into_iter().collect();
    assert_eq!(document_predicate(&documents), "document_id IN ('doc-1')");
}

#[test]
fn escape_literal_doubles_single_quotes() {
    assert_eq!(escape_literal("o'brien"), "o''brien");
    assert_eq!(escape_literal("plain"), "plain");
}

#[tokio::test]
async fn insert_search_and_count() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut index = LanceIndex::open(&dir.path().join("vectors.lance"), 2)
        .await
        .expect("Failed to open index");

    index
        .insert(vec![
            record("a", "doc-1", vec![1.0, 0.0]),
            record("b", "doc-2", vec![0.0, 1.0]),
        ])
        .await
        .expect("insert should succeed");

    assert_eq!(index.count().await.expect("count"), 2);

    let hits = index
        .search(&[1.0, 0.0], 1, None)
        .await
        .expect("search should succeed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.chunk_id, "a");
    assert_eq!(hits[0].metadata.title.as_deref(), Some("Test Title"));
    assert_eq!(hits[0].metadata.page, Some(1));
}

#[tokio::test]
async fn search_applies_document_filter_natively() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut index = LanceIndex::open(&dir.path().join("vectors.lance"), 2)
        .await
        .expect("Failed to open index");

    index
        .insert(vec![
            record("a", "doc-1", vec![1.0, 0.0]),
            record("b", "doc-2", vec![0.9, 0.1]),
        ])
        .await
        .expect("insert should succeed");

    let documents: HashSet<String> = ["doc-2".to_string()].into_iter().collect();
    let hits = index
        .search(&[1.0, 0.0], 5, Some(&documents))
        .await
        .expect("search should succeed");

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.document_id, "doc-2");
}

#[tokio::test]
async fn empty_document_filter_returns_nothing() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut index = LanceIndex::open(&dir.path().join("vectors.lance"), 2)
        .await
        .expect("Failed to open index");

    index
        .insert(vec![record("a", "doc-1", vec![1.0, 0.0])])
        .await
        .expect("insert should succeed");

    let documents = HashSet::new();
    let hits = index
        .search(&[1.0, 0.0], 5, Some(&documents))
        .await
        .expect("search should succeed");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn remove_document_reports_count() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut index = LanceIndex::open(&dir.path().join("vectors.lance"), 2)
        .await
        .expect("Failed to open index");

    index
        .insert(vec![
            record("a", "doc-1", vec![1.0, 0.0]),
            record("b", "doc-1", vec![0.0, 1.0]),
            record("c", "doc-2", vec![0.5, 0.5]),
        ])
        .await
        .expect("insert should succeed");

    let removed = index
        .remove_document("doc-1")
        .await
        .expect("removal should succeed");
    assert_eq!(removed, 2);
    assert_eq!(index.count().await.expect("count"), 1);
}

#[tokio::test]
async fn dimension_mismatch_on_insert_is_rejected() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut index = LanceIndex::open(&dir.path().join("vectors.lance"), 2)
        .await
        .expect("Failed to open index");

    let result = index.insert(vec![record("a", "doc-1", vec![1.0, 0.0, 0.0])]).await;
    assert!(matches!(result, Err(RagError::Index(_))));
}
