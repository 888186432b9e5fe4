//! Client for text-embeddings-inference style `/rerank` endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::HttpRerankerConfig;
use super::error::RerankerError;
use super::model::RerankModel;

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

pub struct HttpReranker {
    client: reqwest::Client,
    config: HttpRerankerConfig,
}

impl std::fmt::Debug for HttpReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReranker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpReranker {
    pub fn new(config: HttpRerankerConfig) -> Result<Self, RerankerError> {
        if let Err(msg) = config.validate() {
            return Err(RerankerError::InvalidConfig { reason: msg });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RerankerError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpRerankerConfig {
        &self.config
    }
}

#[async_trait]
impl RerankModel for HttpReranker {
    #[instrument(skip(self, query, passages), fields(passages = passages.len()))]
    async fn score_batch(
        &self,
        query: &str,
        passages: &[&str],
    ) -> Result<Vec<f32>, RerankerError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.config.endpoint())
            .json(&RerankRequest {
                query,
                texts: passages,
                truncate: self.config.truncate,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RerankerError::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    }
                } else {
                    RerankerError::from(e)
                }
            })?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(RerankerError::Unavailable {
                reason: format!(
                    "reranker returned {status}: {}",
                    String::from_utf8_lossy(&body)
                ),
            });
        }

        let scores = parse_rerank_response(&body, passages.len())?;
        debug!(
            top_score = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            "Scored passages"
        );
        Ok(scores)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Maps `[{index, score}]` (any order) back onto input positions.
pub(crate) fn parse_rerank_response(
    body: &[u8],
    expected: usize,
) -> Result<Vec<f32>, RerankerError> {
    let hits: Vec<RerankHit> = serde_json::from_slice(body)?;

    if hits.len() != expected {
        return Err(RerankerError::InvalidResponse {
            reason: format!("expected {expected} scores, got {}", hits.len()),
        });
    }

    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for hit in hits {
        match scores.get_mut(hit.index) {
            Some(slot) if slot.is_none() => *slot = Some(hit.score),
            _ => {
                return Err(RerankerError::InvalidResponse {
                    reason: format!("score index {} is out of range or repeated", hit.index),
                });
            }
        }
    }

    Ok(scores.into_iter().flatten().collect())
}
