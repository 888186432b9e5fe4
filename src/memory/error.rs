use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobMemoryError {
    /// Spending `requested` would take the job past its limit.
    #[error(
        "budget exceeded for job '{job_id}' (stage {stage:?}): used {used:.2} + requested {requested:.2} > limit {limit:.2}"
    )]
    BudgetExceeded {
        job_id: String,
        stage: Option<u32>,
        used: f64,
        limit: f64,
        requested: f64,
    },

    #[error("job '{job_id}': cannot begin stage {requested} after stage {last}")]
    StageOutOfOrder {
        job_id: String,
        last: u32,
        requested: u32,
    },

    #[error("job '{job_id}' is already {state}")]
    JobTerminated { job_id: String, state: String },

    #[error("job memory not found: {job_id}")]
    NotFound { job_id: String },

    #[error("invalid job id: {job_id:?}")]
    InvalidJobId { job_id: String },

    #[error("invalid job memory configuration: {reason}")]
    InvalidConfig { reason: String },

    /// JSON has no encoding for NaN or infinity, so such a record could not be loaded back.
    #[error("job '{job_id}' cannot be persisted: {field} is not a finite number")]
    NonFiniteValue { job_id: String, field: &'static str },

    #[error("unsupported job memory schema version {found} (max supported {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobMemoryError {
    pub(crate) fn invalid_config(reason: String) -> Self {
        JobMemoryError::InvalidConfig { reason }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobMemoryError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type JobMemoryResult<T> = Result<T, JobMemoryError>;
