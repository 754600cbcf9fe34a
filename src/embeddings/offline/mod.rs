#[cfg(test)]
mod tests;

use crate::Result;
use crate::embeddings::Embedder;

pub const DEFAULT_OFFLINE_DIMENSION: usize = 384;
const MODEL_ID: &str = "offline-hash-v1";

/// Deterministic bag-of-words embedder with no external dependencies.
///
/// Each lower-cased alphanumeric token is hashed into a dimension bucket and
/// the resulting count vector is L2-normalized, so texts sharing vocabulary
/// land close under cosine distance. Useful for tests and air-gapped smoke
/// runs; not a substitute for a learned embedding model.
#[derive(Debug, Clone)]
pub struct OfflineEmbedder {
    dimension: usize,
}

impl OfflineEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

impl Default for OfflineEmbedder {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_OFFLINE_DIMENSION)
    }
}

impl Embedder for OfflineEmbedder {
    #[inline]
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// FNV-1a, hand-rolled so bucket assignment stays stable across toolchains
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
