//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `FUNNEL_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BUDGET_LIMIT, DEFAULT_EMBEDDING_DIM, DEFAULT_INDEX_TIMEOUT_MS,
    DEFAULT_MAX_CONTEXT_TOKENS, DEFAULT_MEMORY_MAX_TOKENS, DEFAULT_MIN_SURVIVORS,
    DEFAULT_RELAX_FLOOR, DEFAULT_RELAX_STEP, DEFAULT_RERANK_TIMEOUT_MS, DEFAULT_RERANK_TOP_K,
    DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_STAGE1_TOP_K, DEFAULT_TARGET_CONTEXT_TOKENS,
};
use crate::embedding::OpenAiEmbeddingsConfig;
use crate::memory::JobMemoryConfig;
use crate::rerank::HttpRerankerConfig;
use crate::retrieval::{
    AssemblerConfig, FilterConfig, FunnelConfig, RerankConfig, RetrieverConfig,
};
use crate::vectordb::DEFAULT_COLLECTION_NAME;

/// Default Qdrant URL used when `FUNNEL_QDRANT_URL` is not set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default directory for job memory files.
pub const DEFAULT_MEMORY_PATH: &str = "./.data/jobs";

/// Funnel and job memory settings loaded from environment variables.
///
/// Use [`Config::from_env`] to read `FUNNEL_*` overrides on top of defaults, then
/// [`Config::funnel_config`] / [`Config::memory_config`] for the per-component structs.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// Chunk collection name. Default: `rag_job_chunks`.
    pub collection: String,

    /// Query/chunk vector dimension. Default: `3072`.
    pub embedding_dim: usize,

    /// Directory for persisted job memory. Default: `./.data/jobs`.
    pub memory_path: PathBuf,

    pub index_timeout: Duration,
    pub rerank_timeout: Duration,

    pub stage1_top_k: u64,
    pub similarity_threshold: f32,
    pub min_survivors: usize,
    pub relax_step: f32,
    pub relax_floor: f32,
    pub rerank_top_k: usize,

    pub max_context_tokens: usize,
    pub target_context_tokens: usize,

    /// Per-job spend limit in dollars. Default: `200.0`.
    pub budget_limit: f64,
    pub memory_max_tokens: usize,

    /// OpenAI-compatible embeddings endpoint. Unset means callers supply vectors.
    pub embeddings_url: Option<String>,
    pub embeddings_api_key: Option<String>,

    /// TEI-compatible rerank endpoint. Unset disables Stage 3 rescoring.
    pub reranker_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION_NAME.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            memory_path: PathBuf::from(DEFAULT_MEMORY_PATH),
            index_timeout: Duration::from_millis(DEFAULT_INDEX_TIMEOUT_MS),
            rerank_timeout: Duration::from_millis(DEFAULT_RERANK_TIMEOUT_MS),
            stage1_top_k: DEFAULT_STAGE1_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_survivors: DEFAULT_MIN_SURVIVORS,
            relax_step: DEFAULT_RELAX_STEP,
            relax_floor: DEFAULT_RELAX_FLOOR,
            rerank_top_k: DEFAULT_RERANK_TOP_K,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            target_context_tokens: DEFAULT_TARGET_CONTEXT_TOKENS,
            budget_limit: DEFAULT_BUDGET_LIMIT,
            memory_max_tokens: DEFAULT_MEMORY_MAX_TOKENS,
            embeddings_url: None,
            embeddings_api_key: None,
            reranker_url: None,
        }
    }
}

impl Config {
    const ENV_QDRANT_URL: &'static str = "FUNNEL_QDRANT_URL";
    const ENV_COLLECTION: &'static str = "FUNNEL_COLLECTION";
    const ENV_EMBEDDING_DIM: &'static str = "FUNNEL_EMBEDDING_DIM";
    const ENV_MEMORY_PATH: &'static str = "FUNNEL_MEMORY_PATH";
    const ENV_INDEX_TIMEOUT_MS: &'static str = "FUNNEL_INDEX_TIMEOUT_MS";
    const ENV_RERANK_TIMEOUT_MS: &'static str = "FUNNEL_RERANK_TIMEOUT_MS";
    const ENV_STAGE1_TOP_K: &'static str = "FUNNEL_STAGE1_TOP_K";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "FUNNEL_SIMILARITY_THRESHOLD";
    const ENV_MIN_SURVIVORS: &'static str = "FUNNEL_MIN_SURVIVORS";
    const ENV_RELAX_STEP: &'static str = "FUNNEL_RELAX_STEP";
    const ENV_RELAX_FLOOR: &'static str = "FUNNEL_RELAX_FLOOR";
    const ENV_RERANK_TOP_K: &'static str = "FUNNEL_RERANK_TOP_K";
    const ENV_MAX_CONTEXT_TOKENS: &'static str = "FUNNEL_MAX_CONTEXT_TOKENS";
    const ENV_TARGET_CONTEXT_TOKENS: &'static str = "FUNNEL_TARGET_CONTEXT_TOKENS";
    const ENV_BUDGET_LIMIT: &'static str = "FUNNEL_BUDGET_LIMIT";
    const ENV_MEMORY_MAX_TOKENS: &'static str = "FUNNEL_MEMORY_MAX_TOKENS";
    const ENV_EMBEDDINGS_URL: &'static str = "FUNNEL_EMBEDDINGS_URL";
    const ENV_EMBEDDINGS_API_KEY: &'static str = "FUNNEL_EMBEDDINGS_API_KEY";
    const ENV_RERANKER_URL: &'static str = crate::rerank::config::ENV_RERANKER_URL;

    /// Loads configuration from environment variables (falling back to defaults).
    ///
    /// A variable that is set but malformed is an error, not a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        Ok(Self {
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, d.qdrant_url),
            collection: Self::parse_string_from_env(Self::ENV_COLLECTION, d.collection),
            embedding_dim: Self::parse_from_env(Self::ENV_EMBEDDING_DIM, d.embedding_dim)?,
            memory_path: Self::parse_path_from_env(Self::ENV_MEMORY_PATH, d.memory_path),
            index_timeout: Self::parse_millis_from_env(
                Self::ENV_INDEX_TIMEOUT_MS,
                d.index_timeout,
            )?,
            rerank_timeout: Self::parse_millis_from_env(
                Self::ENV_RERANK_TIMEOUT_MS,
                d.rerank_timeout,
            )?,
            stage1_top_k: Self::parse_from_env(Self::ENV_STAGE1_TOP_K, d.stage1_top_k)?,
            similarity_threshold: Self::parse_from_env(
                Self::ENV_SIMILARITY_THRESHOLD,
                d.similarity_threshold,
            )?,
            min_survivors: Self::parse_from_env(Self::ENV_MIN_SURVIVORS, d.min_survivors)?,
            relax_step: Self::parse_from_env(Self::ENV_RELAX_STEP, d.relax_step)?,
            relax_floor: Self::parse_from_env(Self::ENV_RELAX_FLOOR, d.relax_floor)?,
            rerank_top_k: Self::parse_from_env(Self::ENV_RERANK_TOP_K, d.rerank_top_k)?,
            max_context_tokens: Self::parse_from_env(
                Self::ENV_MAX_CONTEXT_TOKENS,
                d.max_context_tokens,
            )?,
            target_context_tokens: Self::parse_from_env(
                Self::ENV_TARGET_CONTEXT_TOKENS,
                d.target_context_tokens,
            )?,
            budget_limit: Self::parse_from_env(Self::ENV_BUDGET_LIMIT, d.budget_limit)?,
            memory_max_tokens: Self::parse_from_env(
                Self::ENV_MEMORY_MAX_TOKENS,
                d.memory_max_tokens,
            )?,
            embeddings_url: Self::parse_optional_string_from_env(Self::ENV_EMBEDDINGS_URL),
            embeddings_api_key: Self::parse_optional_string_from_env(
                Self::ENV_EMBEDDINGS_API_KEY,
            ),
            reranker_url: Self::parse_optional_string_from_env(Self::ENV_RERANKER_URL),
        })
    }

    /// Checks ranges and cross-field rules (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_path.exists() && !self.memory_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.memory_path.clone(),
            });
        }

        if self.qdrant_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "qdrant_url cannot be empty".to_string(),
            });
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "collection cannot be empty".to_string(),
            });
        }

        self.funnel_config()
            .validate()
            .map_err(|reason| ConfigError::Invalid { reason })?;
        self.memory_config()
            .validate()
            .map_err(|reason| ConfigError::Invalid { reason })?;

        Ok(())
    }

    pub fn funnel_config(&self) -> FunnelConfig {
        FunnelConfig {
            retriever: RetrieverConfig::default()
                .with_top_k(self.stage1_top_k)
                .with_index_timeout(self.index_timeout)
                .with_embedding_dim(self.embedding_dim),
            filter: FilterConfig::default()
                .with_threshold(self.similarity_threshold)
                .with_min_survivors(self.min_survivors)
                .with_relaxation(self.relax_step, self.relax_floor),
            rerank: RerankConfig::default()
                .with_top_k(self.rerank_top_k)
                .with_timeout(self.rerank_timeout),
            assembler: AssemblerConfig::default()
                .with_budget(self.max_context_tokens, self.target_context_tokens),
        }
    }

    pub fn memory_config(&self) -> JobMemoryConfig {
        JobMemoryConfig::default()
            .with_budget_limit(self.budget_limit)
            .with_max_tokens(self.memory_max_tokens)
    }

    /// `None` when no embeddings endpoint is configured.
    pub fn embeddings_config(&self) -> Option<OpenAiEmbeddingsConfig> {
        let url = self.embeddings_url.as_ref()?;
        let mut config = OpenAiEmbeddingsConfig::new(url.clone());
        config.dimension = self.embedding_dim;
        if let Some(key) = &self.embeddings_api_key {
            config = config.with_api_key(key.clone());
        }
        Some(config)
    }

    /// `None` when no reranker endpoint is configured.
    pub fn reranker_config(&self) -> Option<HttpRerankerConfig> {
        self.reranker_url.as_ref().map(HttpRerankerConfig::new)
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: var_name,
                    value: value.clone(),
                    reason: e.to_string(),
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_millis_from_env(
        var_name: &'static str,
        default: Duration,
    ) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        Self::parse_from_env(var_name, default_ms).map(Duration::from_millis)
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
