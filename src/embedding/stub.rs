use async_trait::async_trait;
use tracing::debug;

use super::error::EmbeddingError;
use super::provider::{EmbeddingBatch, EmbeddingProvider, EmbeddingUsage};
use crate::chunk::estimate_tokens;
use crate::hashing::hash_to_u64;

/// Deterministic, model-free embedder.
///
/// Equal texts map to equal unit vectors. Useful offline and in tests; similarity
/// between different texts carries no meaning.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "dimension must be non-zero".to_string(),
            });
        }
        Ok(Self { dimension })
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = Vec::with_capacity(self.dimension);
        let mut state = hash_to_u64(text.as_bytes());

        for _ in 0..self.dimension {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            embedding.push(value);
        }

        normalize(&mut embedding);
        embedding
    }
}

fn normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in embedding {
            *x /= norm;
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<EmbeddingBatch, EmbeddingError> {
        debug!(inputs = texts.len(), "Generating stub embeddings");

        let prompt_tokens = texts.iter().map(|t| estimate_tokens(t) as u64).sum();
        Ok(EmbeddingBatch {
            vectors: texts.iter().map(|t| self.embed_text(t)).collect(),
            usage: EmbeddingUsage::new(prompt_tokens, 0.0),
        })
    }
}
