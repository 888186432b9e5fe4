//! Cross-cutting, shared constants.
//!
//! Stage defaults live here so the env-backed [`Config`](crate::config::Config) and the
//! per-stage config structs agree on them.
//!
//! # Dimension Invariants
//!
//! The query embedding must match the dimension the vector index was built with. Use
//! [`DimConfig`] to carry the dimension through initialization and
//! [`validate_embedding_dim`] at the retriever boundary.

/// `text-embedding-3-large` output size.
pub const DEFAULT_EMBEDDING_DIM: usize = 3072;

pub const DEFAULT_STAGE1_TOP_K: u64 = 50;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;
pub const DEFAULT_MIN_SURVIVORS: usize = 5;
pub const DEFAULT_RELAX_STEP: f32 = 0.05;
pub const DEFAULT_RELAX_FLOOR: f32 = 0.5;
pub const DEFAULT_MAX_SURVIVORS: usize = 30;

pub const DEFAULT_RERANK_TOP_K: usize = 15;

pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 15_000;
pub const DEFAULT_TARGET_CONTEXT_TOKENS: usize = 12_000;

/// Number of normalized characters that make up a dedup signature.
pub const SIGNATURE_PREFIX_CHARS: usize = 100;

/// Rough chars-per-token ratio used when a chunk carries no token count.
pub const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_INDEX_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_RERANK_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_MEMORY_MAX_TOKENS: usize = 2_000;
/// Smallest memory summary budget; leaves room for the truncation marker.
pub const MIN_MEMORY_MAX_TOKENS: usize = 8;
pub const DEFAULT_VERBOSE_STAGES: usize = 3;
pub const DEFAULT_BUDGET_LIMIT: f64 = 200.0;
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_MIN_QUALITY_SCORE: f64 = 80.0;

/// Runtime dimension configuration shared by the embedder and the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimConfig {
    /// The embedding vector dimension (number of floats).
    pub embedding_dim: usize,
}

impl Default for DimConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl DimConfig {
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim }
    }

    pub fn validate(&self) -> Result<(), DimValidationError> {
        if self.embedding_dim == 0 {
            return Err(DimValidationError::ZeroDimension);
        }
        Ok(())
    }

    /// Checks an incoming vector against the configured dimension.
    pub fn check(&self, vector: &[f32]) -> Result<(), DimValidationError> {
        validate_embedding_dim(vector.len(), self.embedding_dim)
    }
}

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimValidationError {
    /// Embedding dimension cannot be zero.
    ZeroDimension,
    /// Runtime dimension does not match expected dimension.
    DimensionMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for DimValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroDimension => write!(f, "embedding dimension cannot be zero"),
            Self::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "dimension mismatch: expected {}, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for DimValidationError {}

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// ```
/// use funnel::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// validate_embedding_dim(3072, DEFAULT_EMBEDDING_DIM).unwrap();
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dim_config_default() {
        let config = DimConfig::default();
        assert_eq!(config.embedding_dim, DEFAULT_EMBEDDING_DIM);
    }

    #[test]
    fn test_dim_config_validate_zero() {
        let config = DimConfig::new(0);
        assert_eq!(config.validate(), Err(DimValidationError::ZeroDimension));
    }

    #[test]
    fn test_dim_config_check_vector() {
        let config = DimConfig::new(4);
        assert!(config.check(&[0.0; 4]).is_ok());
        assert_eq!(
            config.check(&[0.0; 3]),
            Err(DimValidationError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_relaxation_defaults_are_consistent() {
        assert!(DEFAULT_RELAX_FLOOR <= DEFAULT_SIMILARITY_THRESHOLD);
        assert!(DEFAULT_TARGET_CONTEXT_TOKENS <= DEFAULT_MAX_CONTEXT_TOKENS);
        assert!(DEFAULT_RERANK_TOP_K <= DEFAULT_MAX_SURVIVORS);
    }

    #[test]
    fn test_error_display() {
        let err = DimValidationError::ZeroDimension;
        assert_eq!(err.to_string(), "embedding dimension cannot be zero");

        let err = DimValidationError::DimensionMismatch {
            expected: 3072,
            actual: 768,
        };
        assert!(err.to_string().contains("3072"));
        assert!(err.to_string().contains("768"));
    }
}
