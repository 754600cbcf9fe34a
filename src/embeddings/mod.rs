// Embeddings: the model seam plus the concrete Ollama and offline backends.

pub mod offline;
pub mod ollama;

pub use offline::OfflineEmbedder;
pub use ollama::OllamaEmbedder;

use crate::Result;

/// Text embedding capability.
///
/// Implementations are assumed deterministic and versioned: the same model
/// identity produces the same vector for the same text. The index records
/// the model identity and refuses to mix embedding spaces.
pub trait Embedder: Send + Sync {
    /// Stable identity of the embedding model, recorded in the index manifest
    fn model_id(&self) -> &str;

    /// Dimension of produced vectors
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(std::slice::from_ref(&text.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| crate::RagError::Embedding("empty embedding response".to_string()))
    }
}
