use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::EmbeddingError;

/// Token usage and cost reported for one embedding request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u64,
    /// Cost in the job's budget currency.
    pub cost: f64,
}

impl EmbeddingUsage {
    pub fn new(prompt_tokens: u64, cost: f64) -> Self {
        Self {
            prompt_tokens,
            cost,
        }
    }

    pub fn add(&mut self, other: EmbeddingUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.cost += other.cost;
    }
}

/// Vectors for a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub usage: EmbeddingUsage,
}

#[async_trait]
/// Turns query text into vectors matching the index dimension.
pub trait EmbeddingProvider: Send + Sync {
    /// Output dimension of every vector this provider returns.
    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[&str]) -> Result<EmbeddingBatch, EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<(Vec<f32>, EmbeddingUsage), EmbeddingError> {
        let batch = self.embed_batch(&[text]).await?;
        let vector =
            batch
                .vectors
                .into_iter()
                .next()
                .ok_or_else(|| EmbeddingError::InvalidResponse {
                    reason: "provider returned no vector for a single input".to_string(),
                })?;
        Ok((vector, batch.usage))
    }
}
