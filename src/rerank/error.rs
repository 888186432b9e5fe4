use thiserror::Error;

#[derive(Debug, Error)]
pub enum RerankerError {
    #[error("reranker not available: {reason}")]
    Unavailable { reason: String },

    #[error("reranker timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("invalid reranker response: {reason}")]
    InvalidResponse { reason: String },

    #[error("invalid reranker configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<reqwest::Error> for RerankerError {
    fn from(err: reqwest::Error) -> Self {
        RerankerError::Unavailable {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RerankerError {
    fn from(err: serde_json::Error) -> Self {
        RerankerError::InvalidResponse {
            reason: err.to_string(),
        }
    }
}
