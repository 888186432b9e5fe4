//! Stage 3: pairwise rescoring with local fallback.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::config::RerankConfig;
use super::error::{FunnelError, FunnelStage, QueryContext};
use crate::chunk::{Candidate, RankedCandidate};
use crate::rerank::{RerankModel, RerankerError};


/// Stage 3 result. Reranking never fails the query.
#[derive(Debug, Default)]
pub struct RerankOutcome {
    pub candidates: Vec<RankedCandidate>,
    /// The model was configured but could not be used.
    pub degraded: bool,
    /// The recovered error when `degraded`.
    pub fallback: Option<FunnelError>,
    pub model_latency: Option<Duration>,
}

pub struct RerankerAdapter {
    model: Option<Arc<dyn RerankModel>>,
    config: RerankConfig,
}

impl std::fmt::Debug for RerankerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RerankerAdapter")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

impl RerankerAdapter {
    pub fn new(model: Arc<dyn RerankModel>, config: RerankConfig) -> Self {
        Self {
            model: Some(model),
            config,
        }
    }

    /// Adapter without a model: keeps Stage 2 order, not reported as degraded.
    pub fn disabled(config: RerankConfig) -> Self {
        Self {
            model: None,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    /// Orders `candidates` by model score (stable on ties), truncated to `top_k`.
    #[instrument(
        skip(self, ctx, query, candidates),
        fields(job_id = %ctx.job_id, candidates = candidates.len(), top_k = self.config.top_k)
    )]
    pub async fn rerank(
        &self,
        ctx: &QueryContext,
        query: &str,
        candidates: Vec<Candidate>,
    ) -> RerankOutcome {
        let Some(model) = &self.model else {
            return RerankOutcome {
                candidates: self.fallback_order(candidates),
                ..RerankOutcome::default()
            };
        };

        if candidates.is_empty() {
            return RerankOutcome::default();
        }

        let start = Instant::now();
        let result = {
            let passages: Vec<&str> = candidates.iter().map(|c| c.chunk.text()).collect();
            match tokio::time::timeout(self.config.timeout, model.score_batch(query, &passages))
                .await
            {
                Ok(Ok(scores)) => check_scores(scores, candidates.len()),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(RerankerError::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                }),
            }
        };
        let latency = start.elapsed();

        match result {
            Ok(scores) => {
                let mut ranked: Vec<RankedCandidate> = candidates
                    .into_iter()
                    .zip(scores)
                    .map(|(c, score)| RankedCandidate::new(c.chunk, score, c.score))
                    .collect();
                ranked.sort_by(|a, b| {
                    b.rerank_score
                        .partial_cmp(&a.rerank_score)
                        .unwrap_or(Ordering::Equal)
                });
                ranked.truncate(self.config.top_k);

                debug!(
                    model = model.name(),
                    kept = ranked.len(),
                    top_score = ranked.first().map(|c| c.rerank_score),
                    latency_ms = latency.as_millis() as u64,
                    "Stage 3 rerank complete"
                );

                RerankOutcome {
                    candidates: ranked,
                    degraded: false,
                    fallback: None,
                    model_latency: Some(latency),
                }
            }
            Err(e) => {
                warn!(
                    model = model.name(),
                    error = %e,
                    "Reranker unavailable, keeping similarity order"
                );

                RerankOutcome {
                    candidates: self.fallback_order(candidates),
                    degraded: true,
                    fallback: Some(FunnelError::RerankerUnavailable {
                        context: ctx.at(FunnelStage::Rerank),
                        reason: e.to_string(),
                    }),
                    model_latency: Some(latency),
                }
            }
        }
    }

    fn fallback_order(&self, candidates: Vec<Candidate>) -> Vec<RankedCandidate> {
        candidates
            .into_iter()
            .take(self.config.top_k)
            .map(|c| RankedCandidate::new(c.chunk, c.score, c.score))
            .collect()
    }
}

fn check_scores(scores: Vec<f32>, expected: usize) -> Result<Vec<f32>, RerankerError> {
    if scores.len() != expected {
        return Err(RerankerError::InvalidResponse {
            reason: format!("expected {expected} scores, got {}", scores.len()),
        });
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(RerankerError::InvalidResponse {
            reason: format!("non-finite score {bad}"),
        });
    }
    Ok(scores)
}
