use std::time::Duration;

use crate::constants::{
    DEFAULT_EMBEDDING_DIM, DEFAULT_INDEX_TIMEOUT_MS, DEFAULT_MAX_CONTEXT_TOKENS,
    DEFAULT_MAX_SURVIVORS, DEFAULT_MIN_SURVIVORS, DEFAULT_RELAX_FLOOR, DEFAULT_RELAX_STEP,
    DEFAULT_RERANK_TIMEOUT_MS, DEFAULT_RERANK_TOP_K, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_STAGE1_TOP_K, DEFAULT_TARGET_CONTEXT_TOKENS, SIGNATURE_PREFIX_CHARS,
};

/// Stage 1 settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieverConfig {
    pub top_k: u64,
    pub index_timeout: Duration,
    /// Expected query vector dimension.
    pub embedding_dim: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_STAGE1_TOP_K,
            index_timeout: Duration::from_millis(DEFAULT_INDEX_TIMEOUT_MS),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl RetrieverConfig {
    pub fn with_top_k(mut self, top_k: u64) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_index_timeout(mut self, timeout: Duration) -> Self {
        self.index_timeout = timeout;
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("retriever top_k must be at least 1".to_string());
        }
        if self.index_timeout.is_zero() {
            return Err("index_timeout must be non-zero".to_string());
        }
        if self.embedding_dim == 0 {
            return Err("embedding_dim must be non-zero".to_string());
        }
        Ok(())
    }
}

/// How raw index scores map onto `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoreNormalization {
    /// Clamp into `[0, 1]`. Right for indexes that already report cosine similarity
    /// of normalized vectors.
    #[default]
    Clamp,
    /// `(s + 1) / 2` for scores in `[-1, 1]`.
    Cosine,
    /// Rescale so the best candidate is 1 and the worst 0.
    MinMax,
}

/// What Stage 2 returns when even the floor threshold keeps too few candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StarvationPolicy {
    /// Return the best `min_survivors` candidates regardless of threshold.
    #[default]
    TopN,
    /// Return nothing.
    Empty,
}

/// Stage 2 settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub threshold: f32,
    pub min_survivors: usize,
    pub relax_step: f32,
    pub relax_floor: f32,
    pub max_survivors: usize,
    pub normalization: ScoreNormalization,
    pub starvation: StarvationPolicy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_survivors: DEFAULT_MIN_SURVIVORS,
            relax_step: DEFAULT_RELAX_STEP,
            relax_floor: DEFAULT_RELAX_FLOOR,
            max_survivors: DEFAULT_MAX_SURVIVORS,
            normalization: ScoreNormalization::default(),
            starvation: StarvationPolicy::default(),
        }
    }
}

impl FilterConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_survivors(mut self, min_survivors: usize) -> Self {
        self.min_survivors = min_survivors;
        self
    }

    pub fn with_relaxation(mut self, step: f32, floor: f32) -> Self {
        self.relax_step = step;
        self.relax_floor = floor;
        self
    }

    pub fn with_max_survivors(mut self, max_survivors: usize) -> Self {
        self.max_survivors = max_survivors;
        self
    }

    pub fn with_normalization(mut self, normalization: ScoreNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_starvation(mut self, starvation: StarvationPolicy) -> Self {
        self.starvation = starvation;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "threshold must be between 0.0 and 1.0, got {}",
                self.threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.relax_floor) {
            return Err(format!(
                "relax_floor must be between 0.0 and 1.0, got {}",
                self.relax_floor
            ));
        }
        if self.relax_floor > self.threshold {
            return Err(format!(
                "relax_floor ({}) must not exceed threshold ({})",
                self.relax_floor, self.threshold
            ));
        }
        if !(self.relax_step > 0.0 && self.relax_step <= 1.0) {
            return Err(format!(
                "relax_step must be in (0.0, 1.0], got {}",
                self.relax_step
            ));
        }
        if self.min_survivors == 0 {
            return Err("min_survivors must be at least 1".to_string());
        }
        if self.max_survivors < self.min_survivors {
            return Err(format!(
                "max_survivors ({}) must be >= min_survivors ({})",
                self.max_survivors, self.min_survivors
            ));
        }
        Ok(())
    }
}

/// Stage 3 settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankConfig {
    pub top_k: usize,
    pub timeout: Duration,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_RERANK_TOP_K,
            timeout: Duration::from_millis(DEFAULT_RERANK_TIMEOUT_MS),
        }
    }
}

impl RerankConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("rerank top_k must be at least 1".to_string());
        }
        if self.timeout.is_zero() {
            return Err("rerank timeout must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Stage 4 settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblerConfig {
    pub max_tokens: usize,
    /// Soft target; reported, never enforced.
    pub target_tokens: usize,
    pub signature_chars: usize,
    pub deduplicate: bool,
    pub merge_adjacent: bool,
    pub attribute: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            target_tokens: DEFAULT_TARGET_CONTEXT_TOKENS,
            signature_chars: SIGNATURE_PREFIX_CHARS,
            deduplicate: true,
            merge_adjacent: true,
            attribute: true,
        }
    }
}

impl AssemblerConfig {
    pub fn with_budget(mut self, max_tokens: usize, target_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self.target_tokens = target_tokens;
        self
    }

    pub fn with_deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    pub fn with_merge_adjacent(mut self, enabled: bool) -> Self {
        self.merge_adjacent = enabled;
        self
    }

    pub fn with_attribution(mut self, enabled: bool) -> Self {
        self.attribute = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be non-zero".to_string());
        }
        if self.target_tokens > self.max_tokens {
            return Err(format!(
                "target_tokens ({}) must not exceed max_tokens ({})",
                self.target_tokens, self.max_tokens
            ));
        }
        if self.signature_chars == 0 {
            return Err("signature_chars must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Settings for all four stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelConfig {
    pub retriever: RetrieverConfig,
    pub filter: FilterConfig,
    pub rerank: RerankConfig,
    pub assembler: AssemblerConfig,
}

impl FunnelConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.retriever.validate()?;
        self.filter.validate()?;
        self.rerank.validate()?;
        self.assembler.validate()?;

        if self.filter.min_survivors as u64 > self.retriever.top_k {
            return Err(format!(
                "min_survivors ({}) must not exceed retriever top_k ({})",
                self.filter.min_survivors, self.retriever.top_k
            ));
        }
        if self.rerank.top_k as u64 > self.retriever.top_k {
            return Err(format!(
                "rerank top_k ({}) must not exceed retriever top_k ({})",
                self.rerank.top_k, self.retriever.top_k
            ));
        }
        Ok(())
    }
}
