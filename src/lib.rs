//! Retrieval funnel and job memory for long-running, multi-stage RAG jobs.
//!
//! # Public API Surface
//!
//! ## Retrieval funnel
//! - [`RetrievalFunnel`], [`QueryRequest`], [`FunnelOutcome`] - Four-stage query pipeline
//! - [`CandidateRetriever`], [`RelevanceFilter`], [`RerankerAdapter`], [`ContextAssembler`]
//!   - The individual stages
//! - [`FunnelConfig`] and the per-stage config structs
//! - [`FunnelError`], [`EmptyCandidateSet`] - Fatal errors and the no-context signal
//!
//! ## Job memory
//! - [`JobMemory`], [`JobMemoryRecord`] - Stage history, budget, risks
//! - [`JobMemoryRegistry`], [`JobMemoryHandle`] - One serialized handle per job
//! - [`FileJobStore`], [`InMemoryJobStore`] - Persistence
//!
//! ## Collaborators
//! - [`VectorIndex`], [`QdrantIndex`] - Nearest-neighbor search
//! - [`EmbeddingProvider`], [`OpenAiEmbeddings`], [`HashEmbedder`] - Query embeddings
//! - [`RerankModel`], [`HttpReranker`], [`LexicalReranker`] - Pairwise scoring
//! - [`GenerationConsumer`], [`TurnSession`] - Generation turns with optional context
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod chunk;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod hashing;
pub mod memory;
pub mod rerank;
pub mod retrieval;
pub mod session;
pub mod telemetry;
pub mod vectordb;

pub use chunk::{Candidate, Chunk, RankedCandidate, estimate_tokens, text_signature};
pub use config::{Config, ConfigError};
pub use constants::{DimConfig, DimValidationError, validate_embedding_dim};
pub use embedding::{
    EmbeddingError, EmbeddingProvider, EmbeddingUsage, HashEmbedder, OpenAiEmbeddings,
    OpenAiEmbeddingsConfig,
};
pub use hashing::{hash_to_u64, point_id};
pub use memory::{
    FileJobStore, InMemoryJobStore, JobMemory, JobMemoryConfig, JobMemoryError,
    JobMemoryHandle, JobMemoryRecord, JobMemoryRegistry, JobMemoryStore, RiskLevel,
    StageRecord, StageState,
};
#[cfg(any(test, feature = "mock"))]
pub use rerank::MockRerankModel;
pub use rerank::{HttpReranker, HttpRerankerConfig, LexicalReranker, RerankModel, RerankerError};
pub use retrieval::{
    AssembledBlock, AssembledContext, AssemblerConfig, CandidateRetriever, ContextAssembler,
    EmptyCandidateSet, FilterConfig, FunnelConfig, FunnelError, FunnelOutcome, FunnelResult,
    FunnelRun, FunnelStage, FunnelTrace, QueryCancellation, QueryContext, QueryRequest,
    RelevanceFilter, RerankConfig, RerankerAdapter, RetrievalFunnel, RetrieverConfig,
    ScoreNormalization, StarvationPolicy,
};
pub use session::{
    ContextCapability, GenerationConsumer, GenerationError, GenerationOutput, GenerationRequest,
    GenerationUsage, SessionError, TurnOutcome, TurnRequest, TurnSession,
};
pub use telemetry::init_tracing;
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockVectorIndex;
pub use vectordb::{
    ChunkStore, InMemoryChunkStore, QdrantIndex, Scope, SearchHit, VectorDbError, VectorIndex,
};
