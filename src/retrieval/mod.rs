
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::index::{SearchHit, SearchIndex};
use crate::{RagError, Result};

/// Retrieves candidate chunks for a query by embedding it and searching the
/// index, optionally scoped to a set of documents.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<SearchIndex>,
    overfetch_multiplier: usize,
}

impl Retriever {
    /// `overfetch_multiplier` is floored at 2: when the backend cannot filter
    /// natively, fewer over-fetched candidates make filtered recall too lossy.
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<SearchIndex>,
        overfetch_multiplier: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            overfetch_multiplier: overfetch_multiplier.max(2),
        }
    }

    /// Top-k nearest chunks for `query`, deduplicated by chunk id.
    ///
    /// With a document filter, backends with native predicates search
    /// filtered directly; others over-fetch unfiltered candidates and keep
    /// the matching ones, which makes filtered recall approximate. May
    /// return fewer than k results, never padded.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        documents: Option<&HashSet<String>>,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed_query(query).await?;

        let hits = match documents {
            Some(filter) if self.index.supports_document_filter().await => {
                self.index.search(&vector, k, Some(filter)).await?
            }
            Some(filter) => {
                let fetched = self
                    .index
                    .search(&vector, k * self.overfetch_multiplier, None)
                    .await?;
                debug!(
                    "Over-fetched {} candidates to filter down to {} documents",
                    fetched.len(),
                    filter.len()
                );
                fetched
                    .into_iter()
                    .filter(|hit| filter.contains(&hit.metadata.document_id))
                    .collect()
            }
            None => self.index.search(&vector, k, None).await?,
        };

        let mut hits: Vec<SearchHit> = hits
            .into_iter()
            .unique_by(|hit| hit.metadata.chunk_id.clone())
            .collect();
        hits.truncate(k);

        debug!("Retrieved {} chunks for query", hits.len());
        Ok(hits)
    }

    /// Run the blocking embedder off the async runtime.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();

        tokio::task::spawn_blocking(move || embedder.embed_one(&text))
            .await
            .map_err(|e| RagError::Embedding(format!("embedding task failed: {}", e)))?
    }
}
