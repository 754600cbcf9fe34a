// The composed retrieval pipeline: chunk -> embed -> index on the write
// side, retrieve -> filter -> re-rank -> estimate on the query side.

pub mod analysis;

pub use analysis::{Answerer, DocumentAnalysis, DocumentAnalyzer};

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chunking::chunk_pages;
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::index::{ChunkMetadata, ChunkRecord, SearchIndex};
use crate::loader::{DocumentPage, load_document};
use crate::ranking::{self, Candidate, StructuralFilter};
use crate::registry::{Document, DocumentStatus, NewDocument, Registry};
use crate::retrieval::Retriever;
use crate::{RagError, Result, confidence};

/// Per-query knobs. `k` falls back to the configured default when unset.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub documents: Option<HashSet<String>>,
    pub k: Option<usize>,
    pub filters: Vec<StructuralFilter>,
}

/// Ranked chunks plus a confidence score. Transient, returned to the caller.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub chunks: Vec<Candidate>,
    pub confidence: f32,
}

impl QueryResult {
    #[inline]
    pub fn empty() -> Self {
        Self {
            chunks: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Owns the embedder, index, and registry, and composes them into the
/// document-level operations the CLI and host services call.
pub struct RagPipeline {
    config: Config,
    embedder: Arc<dyn Embedder>,
    index: Arc<SearchIndex>,
    registry: Registry,
    retriever: Retriever,
}

impl RagPipeline {
    #[inline]
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<SearchIndex>,
        registry: Registry,
    ) -> Self {
        let retriever = Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            config.retrieval.overfetch_multiplier,
        );

        Self {
            config,
            embedder,
            index,
            registry,
            retriever,
        }
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[inline]
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Chunk, embed, and index a document's pages, then record the page and
    /// chunk counts in the registry. Returns the number of chunks indexed.
    #[inline]
    pub async fn index_document(
        &self,
        document_id: &str,
        pages: &[DocumentPage],
    ) -> Result<usize> {
        let chunks = chunk_pages(document_id, pages, &self.config.chunking)?;
        let chunk_count = chunks.len();
        debug!("Chunked document {} into {} chunks", document_id, chunk_count);

        self.registry
            .set_status(document_id, DocumentStatus::Chunked)
            .await?;

        let (source, title) = self.document_identity(document_id).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embedder = Arc::clone(&self.embedder);
        let vectors = tokio::task::spawn_blocking(move || embedder.embed(&texts))
            .await
            .map_err(|e| RagError::Embedding(format!("embedding task failed: {}", e)))??;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkRecord {
                id: chunk.id.clone(),
                vector,
                metadata: ChunkMetadata {
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    source: source.clone(),
                    title: title.clone(),
                    page: chunk.page_number,
                    chunk_index: chunk.chunk_index as u32,
                    content: chunk.content,
                },
            })
            .collect();

        self.index.insert(records).await?;

        self.registry
            .set_counts(document_id, pages.len() as i64, chunk_count as i64)
            .await?;
        self.registry
            .set_status(document_id, DocumentStatus::Indexed)
            .await?;

        info!("Indexed document {} ({} chunks)", document_id, chunk_count);
        Ok(chunk_count)
    }

    /// Remove a document's vectors from the index and mark it deleted.
    #[inline]
    pub async fn delete_document_index(&self, document_id: &str) -> Result<u64> {
        let removed = self.index.remove_document(document_id).await?;
        self.registry
            .set_status(document_id, DocumentStatus::Deleted)
            .await?;

        info!(
            "Removed {} indexed chunks for document {}",
            removed, document_id
        );
        Ok(removed)
    }

    /// Register a file, copy it into the uploads directory, and index it.
    #[inline]
    pub async fn upload_document(&self, path: &Path) -> Result<Document> {
        let pages = load_document(path)?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("Path has no filename: {}", path.display()))?;

        let uploads_dir = self.config.uploads_dir();
        std::fs::create_dir_all(&uploads_dir)?;
        let stored_path = uploads_dir.join(&filename);
        if stored_path != path {
            std::fs::copy(path, &stored_path)?;
        }

        let file_size = std::fs::metadata(&stored_path)?.len() as i64;
        let document = self
            .registry
            .create(NewDocument {
                filename,
                path: stored_path.to_string_lossy().into_owned(),
                file_size,
            })
            .await?;

        self.index_document(&document.id, &pages).await?;

        self.registry
            .get(&document.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Document vanished during indexing").into())
    }

    /// Remove a document completely: index entries, stored file, registry
    /// row. Returns false when the document is unknown.
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let Some(document) = self.registry.get(document_id).await? else {
            return Ok(false);
        };

        self.delete_document_index(document_id).await?;

        if let Err(e) = std::fs::remove_file(&document.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove stored file {}: {}", document.path, e);
            }
        }

        self.registry.delete(document_id).await?;
        info!("Deleted document {} ({})", document.filename, document_id);
        Ok(true)
    }

    /// The composed query path: retrieve, filter, re-rank, and estimate
    /// confidence (with no answer text yet; see
    /// [`estimate_confidence`](Self::estimate_confidence) for re-scoring
    /// once an answer exists).
    ///
    /// A blank query is rejected. Any other retrieval failure degrades to an
    /// empty result with zero confidence rather than propagating.
    #[inline]
    pub async fn answer_query(&self, query: &str, options: &QueryOptions) -> Result<QueryResult> {
        let k = options.k.unwrap_or(self.config.retrieval.default_k);

        let hits = match self
            .retriever
            .retrieve(query, options.documents.as_ref(), k)
            .await
        {
            Ok(hits) => hits,
            Err(RagError::EmptyQuery) => return Err(RagError::EmptyQuery),
            Err(e) => {
                warn!("Query-path retrieval failed, returning empty result: {}", e);
                return Ok(QueryResult::empty());
            }
        };

        let chunks = ranking::apply(hits, &options.filters, query);
        let confidence = confidence::estimate(
            self.config.retrieval.confidence_profile,
            &chunks,
            query,
            "",
        );

        Ok(QueryResult { chunks, confidence })
    }

    /// Re-estimate confidence once answer text exists.
    #[inline]
    pub fn estimate_confidence(&self, chunks: &[Candidate], query: &str, answer: &str) -> f32 {
        confidence::estimate(
            self.config.retrieval.confidence_profile,
            chunks,
            query,
            answer,
        )
    }

    /// Source filename and display title for a document, falling back to the
    /// raw id when it was never registered.
    async fn document_identity(&self, document_id: &str) -> Result<(String, Option<String>)> {
        match self.registry.get(document_id).await? {
            Some(document) => {
                let title = Path::new(&document.filename)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned());
                Ok((document.filename, title))
            }
            None => Ok((document_id.to_string(), None)),
        }
    }
}
