use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::EmbeddingError;

/// Funnel stage an error or signal originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    Embed,
    Retrieve,
    Filter,
    Rerank,
    Assemble,
    Memory,
}

impl FunnelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStage::Embed => "embed",
            FunnelStage::Retrieve => "retrieve",
            FunnelStage::Filter => "filter",
            FunnelStage::Rerank => "rerank",
            FunnelStage::Assemble => "assemble",
            FunnelStage::Memory => "memory",
        }
    }
}

impl fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the query an error belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub job_id: String,
    pub stage: FunnelStage,
    pub query: String,
}

impl QueryContext {
    pub fn new(job_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            stage: FunnelStage::Retrieve,
            query: query.into(),
        }
    }

    /// Same query, attributed to `stage`.
    pub fn at(&self, stage: FunnelStage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job={} stage={} query={:?}",
            self.job_id, self.stage, self.query
        )
    }
}

#[derive(Debug, Error)]
pub enum FunnelError {
    /// The vector index could not answer. Fatal for the query.
    #[error("retrieval unavailable ({context}): {reason}")]
    RetrievalUnavailable {
        context: QueryContext,
        reason: String,
    },

    /// The request itself is malformed, e.g. a query vector of the wrong dimension.
    #[error("invalid query ({context}): {reason}")]
    InvalidQuery {
        context: QueryContext,
        reason: String,
    },

    /// The rerank model failed or timed out. Recovered by the adapter.
    #[error("reranker unavailable ({context}): {reason}")]
    RerankerUnavailable {
        context: QueryContext,
        reason: String,
    },

    /// More than one block remained over budget after trimming.
    #[error("token budget violated ({context}): {total} tokens > {budget}")]
    TokenBudgetViolation {
        context: QueryContext,
        total: usize,
        budget: usize,
    },

    #[error("query cancelled ({context})")]
    Cancelled { context: QueryContext },

    #[error("query embedding failed ({context}): {source}")]
    EmbeddingFailed {
        context: QueryContext,
        #[source]
        source: EmbeddingError,
    },

    #[error("invalid funnel configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl FunnelError {
    pub fn context(&self) -> Option<&QueryContext> {
        match self {
            FunnelError::RetrievalUnavailable { context, .. }
            | FunnelError::InvalidQuery { context, .. }
            | FunnelError::RerankerUnavailable { context, .. }
            | FunnelError::TokenBudgetViolation { context, .. }
            | FunnelError::Cancelled { context }
            | FunnelError::EmbeddingFailed { context, .. } => Some(context),
            FunnelError::InvalidConfig { .. } => None,
        }
    }

    pub fn stage(&self) -> Option<FunnelStage> {
        self.context().map(|c| c.stage)
    }
}

pub type FunnelResult<T> = Result<T, FunnelError>;

/// Non-fatal signal: nothing survived filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyCandidateSet {
    pub context: QueryContext,
    /// Number of Stage 1 candidates before filtering.
    pub stage1_candidates: usize,
}

impl fmt::Display for EmptyCandidateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no relevant context ({}): {} candidates retrieved, none kept",
            self.context, self.stage1_candidates
        )
    }
}
