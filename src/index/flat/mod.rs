
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{ChunkRecord, IndexBackend, SearchHit};
use crate::{RagError, Result};

/// Brute-force in-memory index persisted as a single JSON file.
///
/// Every search scans all records and ranks them by cosine distance, which is
/// exact and plenty fast for the corpus sizes a local assistant sees. The
/// backend cannot delete in place; removal rebuilds the record list from the
/// survivors and rewrites the file.
pub struct FlatIndex {
    path: Option<PathBuf>,
    records: Vec<ChunkRecord>,
}

impl FlatIndex {
    /// Open (or start) a persistent flat index backed by `path`.
    ///
    /// A missing file is a new empty index. An unreadable or corrupt file
    /// also degrades to an empty index with a logged warning, so a damaged
    /// store never blocks startup.
    #[inline]
    pub fn open(path: PathBuf) -> Self {
        let records = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<ChunkRecord>>(&raw) {
                Ok(records) => {
                    debug!("Loaded {} records from {:?}", records.len(), path);
                    records
                }
                Err(e) => {
                    warn!(
                        "Index file {:?} is corrupt ({}), starting with an empty index",
                        path, e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    "Failed to read index file {:?} ({}), starting with an empty index",
                    path, e
                );
                Vec::new()
            }
        };

        Self {
            path: Some(path),
            records,
        }
    }

    /// In-memory index with no persistence.
    #[inline]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the full record list to disk via a temp file and rename, so a
    /// crash mid-write leaves the previous snapshot intact. An empty index
    /// removes the file instead.
    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if self.records.is_empty() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed empty index file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let raw = serde_json::to_string(&self.records)
            .map_err(|e| RagError::Index(format!("Failed to serialize index: {}", e)))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, raw)?;
        std::fs::rename(&tmp_path, path)?;

        debug!("Persisted {} records to {:?}", self.records.len(), path);
        Ok(())
    }
}

#[async_trait]
impl IndexBackend for FlatIndex {
    async fn insert(&mut self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        debug!("Inserting {} records into flat index", records.len());
        self.records.extend(records);
        self.persist()
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        _documents: Option<&HashSet<String>>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .map(|record| {
                let similarity = cosine_similarity(vector, &record.vector);
                SearchHit {
                    metadata: record.metadata.clone(),
                    distance: 1.0 - similarity,
                    similarity,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn remove_document(&mut self, document_id: &str) -> Result<u64> {
        let before = self.records.len();
        self.records
            .retain(|record| record.metadata.document_id != document_id);
        let removed = (before - self.records.len()) as u64;

        if removed > 0 {
            self.persist()?;
            info!(
                "Removed {} records for document {} from flat index",
                removed, document_id
            );
        }

        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    fn supports_document_filter(&self) -> bool {
        false
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
