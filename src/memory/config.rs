use std::time::Duration;

use crate::constants::{
    DEFAULT_BUDGET_LIMIT, DEFAULT_MEMORY_MAX_TOKENS, DEFAULT_MIN_QUALITY_SCORE,
    DEFAULT_TIME_LIMIT_SECS, DEFAULT_VERBOSE_STAGES, MIN_MEMORY_MAX_TOKENS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct JobMemoryConfig {
    /// Spend limit applied to new jobs.
    pub budget_limit: f64,
    /// Wall-clock limit applied to new jobs.
    pub time_limit: Duration,
    /// Upper bound for [`crate::memory::JobMemory::get_compressed_context`].
    pub max_tokens: usize,
    /// Most recent stages rendered in full.
    pub verbose_stages: usize,
    /// Average quality below this raises a quality risk.
    pub min_quality_score: f64,
}

impl Default for JobMemoryConfig {
    fn default() -> Self {
        Self {
            budget_limit: DEFAULT_BUDGET_LIMIT,
            time_limit: Duration::from_secs(DEFAULT_TIME_LIMIT_SECS),
            max_tokens: DEFAULT_MEMORY_MAX_TOKENS,
            verbose_stages: DEFAULT_VERBOSE_STAGES,
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
        }
    }
}

impl JobMemoryConfig {
    pub fn with_budget_limit(mut self, limit: f64) -> Self {
        self.budget_limit = limit;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_verbose_stages(mut self, verbose_stages: usize) -> Self {
        self.verbose_stages = verbose_stages;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.budget_limit.is_finite() || self.budget_limit < 0.0 {
            return Err(format!(
                "budget_limit must be a non-negative number, got {}",
                self.budget_limit
            ));
        }
        if self.time_limit.is_zero() {
            return Err("time_limit must be non-zero".to_string());
        }
        if self.max_tokens < MIN_MEMORY_MAX_TOKENS {
            return Err(format!(
                "memory max_tokens must be at least {MIN_MEMORY_MAX_TOKENS}, got {}",
                self.max_tokens
            ));
        }
        if !(0.0..=100.0).contains(&self.min_quality_score) {
            return Err(format!(
                "min_quality_score must be between 0 and 100, got {}",
                self.min_quality_score
            ));
        }
        Ok(())
    }
}
