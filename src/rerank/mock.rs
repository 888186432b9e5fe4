use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::RerankerError;
use super::model::RerankModel;

/// Scripted [`RerankModel`] for tests.
///
/// Passages are scored by exact text lookup, falling back to `default_score`.
pub struct MockRerankModel {
    scores: RwLock<HashMap<String, f32>>,
    default_score: f32,
    failing: AtomicBool,
    latency: RwLock<Option<Duration>>,
    response_override: RwLock<Option<Vec<f32>>>,
    calls: AtomicUsize,
}

impl Default for MockRerankModel {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl MockRerankModel {
    pub fn new(default_score: f32) -> Self {
        Self {
            scores: RwLock::new(HashMap::new()),
            default_score,
            failing: AtomicBool::new(false),
            latency: RwLock::new(None),
            response_override: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_score(self, passage: impl Into<String>, score: f32) -> Self {
        self.scores.write().insert(passage.into(), score);
        self
    }

    pub fn set_score(&self, passage: impl Into<String>, score: f32) {
        self.scores.write().insert(passage.into(), score);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Returns `scores` verbatim on every call, whatever the input length.
    pub fn set_response_override(&self, scores: Option<Vec<f32>>) {
        *self.response_override.write() = scores;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RerankModel for MockRerankModel {
    async fn score_batch(
        &self,
        _query: &str,
        passages: &[&str],
    ) -> Result<Vec<f32>, RerankerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(RerankerError::Unavailable {
                reason: "mock reranker marked failing".to_string(),
            });
        }

        if let Some(scores) = self.response_override.read().clone() {
            return Ok(scores);
        }

        let scores = self.scores.read();
        Ok(passages
            .iter()
            .map(|p| scores.get(*p).copied().unwrap_or(self.default_score))
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
