use async_trait::async_trait;

use super::error::RerankerError;

#[async_trait]
/// Pairwise query/passage relevance model.
pub trait RerankModel: Send + Sync {
    /// Scores every passage against `query`; output order matches `passages`.
    async fn score_batch(&self, query: &str, passages: &[&str])
    -> Result<Vec<f32>, RerankerError>;

    async fn score(&self, query: &str, passage: &str) -> Result<f32, RerankerError> {
        let scores = self.score_batch(query, &[passage]).await?;
        scores
            .into_iter()
            .next()
            .ok_or_else(|| RerankerError::InvalidResponse {
                reason: "model returned no score for a single passage".to_string(),
            })
    }

    /// Short label used in logs.
    fn name(&self) -> &str {
        "rerank-model"
    }
}
