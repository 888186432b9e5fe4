//! Job Memory: compact, durable state for a job spanning many queries and stages.
//!
//! - [`JobMemory`] owns one job's [`JobMemoryRecord`] and enforces the stage order.
//! - [`JobMemoryRegistry`] hands out per-job [`JobMemoryHandle`]s.
//! - [`JobMemoryStore`] persists records ([`FileJobStore`], [`InMemoryJobStore`]).

pub mod compress;
pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod store;
pub mod types;


pub use config::JobMemoryConfig;
pub use error::{JobMemoryError, JobMemoryResult};
pub use manager::JobMemory;
pub use registry::{JobMemoryHandle, JobMemoryRegistry};
pub use store::{FileJobStore, InMemoryJobStore, JobMemoryStore, validate_job_id};
pub use types::{
    JobMemoryRecord, RetrievalStats, Risk, RiskKind, RiskLevel, SCHEMA_VERSION, StageCompletion,
    StageRecord, StageState,
};
