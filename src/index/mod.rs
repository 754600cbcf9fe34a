// Vector index: backend trait, the flat and LanceDB implementations, and the
// SearchIndex wrapper that owns locking and the embedding-model manifest.

pub mod flat;
pub mod lance;
#[cfg(test)]
mod tests;

pub use flat::FlatIndex;
pub use lance::LanceIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{RagError, Result};

/// Metadata carried alongside every stored vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub document_id: String,
    pub source: String,
    pub title: Option<String>,
    pub page: Option<u32>,
    pub chunk_index: u32,
    pub content: String,
}

/// A vector plus its metadata, as stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A single search match. `distance` is cosine distance, `similarity` is
/// `1.0 - distance` so that higher is better.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub metadata: ChunkMetadata,
    pub distance: f32,
    pub similarity: f32,
}

/// Identity of the embedding space an index was built with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexManifest {
    pub model: String,
    pub dimension: usize,
}

/// Storage backend for chunk vectors.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Insert a batch of records
    async fn insert(&mut self, records: Vec<ChunkRecord>) -> Result<()>;

    /// Nearest-neighbor search by cosine distance. Backends that cannot
    /// filter natively ignore `documents`; callers check
    /// [`supports_document_filter`](IndexBackend::supports_document_filter)
    /// and over-fetch instead.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        documents: Option<&HashSet<String>>,
    ) -> Result<Vec<SearchHit>>;

    /// Remove every record belonging to a document, returning how many were
    /// dropped
    async fn remove_document(&mut self, document_id: &str) -> Result<u64>;

    /// Total number of stored records
    async fn count(&self) -> Result<u64>;

    /// Whether `search` applies the document filter itself
    fn supports_document_filter(&self) -> bool;
}

const MANIFEST_FILENAME: &str = "manifest.json";

/// Concurrency and compatibility wrapper around an [`IndexBackend`].
///
/// All access goes through a `tokio::sync::RwLock`: searches share a read
/// lock while inserts and deletes take the write lock. The manifest records
/// which embedding model built the index; opening with a different model or
/// dimension is refused rather than silently mixing vector spaces.
pub struct SearchIndex {
    backend: RwLock<Box<dyn IndexBackend>>,
    manifest: IndexManifest,
}

impl SearchIndex {
    /// Wrap a backend, checking (or creating) the manifest under `index_dir`.
    #[inline]
    pub fn open(
        backend: Box<dyn IndexBackend>,
        index_dir: &Path,
        model: &str,
        dimension: usize,
    ) -> Result<Self> {
        let manifest = IndexManifest {
            model: model.to_string(),
            dimension,
        };

        let manifest_path = index_dir.join(MANIFEST_FILENAME);
        if let Some(existing) = read_manifest(&manifest_path)? {
            if existing != manifest {
                return Err(RagError::Index(format!(
                    "index was built with model '{}' ({} dims) but '{}' ({} dims) is configured; \
                     delete the index or restore the original model",
                    existing.model, existing.dimension, manifest.model, manifest.dimension
                )));
            }
            debug!("Index manifest matches model {}", manifest.model);
        } else {
            write_manifest(&manifest_path, &manifest)?;
            info!(
                "Recorded index manifest: model {} with {} dimensions",
                manifest.model, manifest.dimension
            );
        }

        Ok(Self {
            backend: RwLock::new(backend),
            manifest,
        })
    }

    /// Wrap a backend without touching the filesystem. Test and in-memory use
    #[inline]
    pub fn in_memory(backend: Box<dyn IndexBackend>, model: &str, dimension: usize) -> Self {
        Self {
            backend: RwLock::new(backend),
            manifest: IndexManifest {
                model: model.to_string(),
                dimension,
            },
        }
    }

    #[inline]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    #[inline]
    pub async fn insert(&self, records: Vec<ChunkRecord>) -> Result<()> {
        for record in &records {
            self.check_dimension(record.vector.len())?;
        }
        self.backend.write().await.insert(records).await
    }

    #[inline]
    pub async fn search(
        &self,
        vector: &[f32],
        k: usize,
        documents: Option<&HashSet<String>>,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension(vector.len())?;
        self.backend.read().await.search(vector, k, documents).await
    }

    #[inline]
    pub async fn remove_document(&self, document_id: &str) -> Result<u64> {
        self.backend.write().await.remove_document(document_id).await
    }

    #[inline]
    pub async fn count(&self) -> Result<u64> {
        self.backend.read().await.count().await
    }

    #[inline]
    pub async fn supports_document_filter(&self) -> bool {
        self.backend.read().await.supports_document_filter()
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual == self.manifest.dimension {
            Ok(())
        } else {
            Err(RagError::Index(format!(
                "vector has {} dimensions but the index expects {}",
                actual, self.manifest.dimension
            )))
        }
    }
}

fn read_manifest(path: &Path) -> Result<Option<IndexManifest>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let manifest = serde_json::from_str(&raw)
        .map_err(|e| RagError::Index(format!("Failed to parse index manifest: {}", e)))?;
    Ok(Some(manifest))
}

fn write_manifest(path: &Path, manifest: &IndexManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(manifest)
        .map_err(|e| RagError::Index(format!("Failed to serialize index manifest: {}", e)))?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Path of the flat index data file under an index directory.
#[inline]
pub fn flat_index_path(index_dir: &Path) -> PathBuf {
    index_dir.join("flat.json")
}

/// Path of the LanceDB dataset under an index directory.
#[inline]
pub fn lance_index_path(index_dir: &Path) -> PathBuf {
    index_dir.join("vectors.lance")
}
