//! OpenAI-compatible `/embeddings` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::EmbeddingError;
use super::provider::{EmbeddingBatch, EmbeddingProvider, EmbeddingUsage};
use crate::constants::DEFAULT_EMBEDDING_DIM;

pub const DEFAULT_EMBEDDINGS_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
/// USD per million prompt tokens for `text-embedding-3-large`.
pub const DEFAULT_COST_PER_MILLION_TOKENS: f64 = 0.13;
pub const DEFAULT_EMBEDDINGS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingsConfig {
    /// Base URL; requests go to `{base_url}/embeddings`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
    pub cost_per_million_tokens: f64,
}

impl Default for OpenAiEmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EMBEDDINGS_URL.to_string(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIM,
            timeout: DEFAULT_EMBEDDINGS_TIMEOUT,
            cost_per_million_tokens: DEFAULT_COST_PER_MILLION_TOKENS,
        }
    }
}

impl OpenAiEmbeddingsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cost_per_million_tokens(mut self, cost: f64) -> Self {
        self.cost_per_million_tokens = cost;
        self
    }

    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.base_url.trim().is_empty() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "base_url cannot be empty".to_string(),
            });
        }
        if self.dimension == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "dimension must be non-zero".to_string(),
            });
        }
        if !self.cost_per_million_tokens.is_finite() || self.cost_per_million_tokens < 0.0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: format!(
                    "cost_per_million_tokens must be a non-negative number, got {}",
                    self.cost_per_million_tokens
                ),
            });
        }
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
    #[serde(default)]
    usage: Option<EmbedUsage>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedUsage {
    #[serde(default)]
    prompt_tokens: u64,
}

/// Embedding provider speaking the OpenAI `/embeddings` protocol.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    config: OpenAiEmbeddingsConfig,
}

impl std::fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("endpoint", &self.config.endpoint())
            .field("model", &self.config.model)
            .field("dimension", &self.config.dimension)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddings {
    pub fn new(config: OpenAiEmbeddingsConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiEmbeddingsConfig {
        &self.config
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    #[instrument(skip(self, texts), fields(model = %self.config.model, inputs = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<EmbeddingBatch, EmbeddingError> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::default());
        }

        let mut request = self.client.post(self.config.endpoint()).json(&EmbedRequest {
            model: &self.config.model,
            input: texts,
        });
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(EmbeddingError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let batch = parse_embeddings_response(
            &body,
            texts.len(),
            self.config.dimension,
            self.config.cost_per_million_tokens,
        )?;

        debug!(
            prompt_tokens = batch.usage.prompt_tokens,
            cost = batch.usage.cost,
            "Embedded batch"
        );

        Ok(batch)
    }
}

/// Parses an `/embeddings` response body, restoring input order from `index`.
pub(crate) fn parse_embeddings_response(
    body: &[u8],
    expected_count: usize,
    expected_dim: usize,
    cost_per_million_tokens: f64,
) -> Result<EmbeddingBatch, EmbeddingError> {
    let response: EmbedResponse = serde_json::from_slice(body)?;

    if response.data.len() != expected_count {
        return Err(EmbeddingError::InvalidResponse {
            reason: format!(
                "expected {expected_count} embeddings, got {}",
                response.data.len()
            ),
        });
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected_count];
    for (position, item) in response.data.into_iter().enumerate() {
        let index = item.index.unwrap_or(position);
        if item.embedding.len() != expected_dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: expected_dim,
                actual: item.embedding.len(),
            });
        }
        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(EmbeddingError::InvalidResponse {
                    reason: format!("embedding index {index} is out of range or repeated"),
                });
            }
        }
    }

    let vectors = slots.into_iter().flatten().collect();
    let prompt_tokens = response.usage.map(|u| u.prompt_tokens).unwrap_or(0);
    let cost = prompt_tokens as f64 * cost_per_million_tokens / 1_000_000.0;

    Ok(EmbeddingBatch {
        vectors,
        usage: EmbeddingUsage::new(prompt_tokens, cost),
    })
}
