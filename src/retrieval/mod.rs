//! The multi-stage retrieval funnel.
//!
//! 1. [`CandidateRetriever`]: nearest-neighbor recall from the vector index.
//! 2. [`RelevanceFilter`]: similarity threshold with bounded relaxation.
//! 3. [`RerankerAdapter`]: pairwise rescoring, falling back to Stage 2 order.
//! 4. [`ContextAssembler`]: dedupe, merge, order, attribute, trim to budget.
//!
//! [`RetrievalFunnel`] runs the four stages for one query.

pub mod assembler;
pub mod cancel;
pub mod config;
pub mod error;
pub mod filter;
pub mod funnel;
pub mod reranker;
pub mod retriever;

pub use assembler::{AssembledBlock, AssembledContext, ContextAssembler, citation_for};
pub use cancel::QueryCancellation;
pub use config::{
    AssemblerConfig, FilterConfig, FunnelConfig, RerankConfig, RetrieverConfig,
    ScoreNormalization, StarvationPolicy,
};
pub use error::{EmptyCandidateSet, FunnelError, FunnelResult, FunnelStage, QueryContext};
pub use filter::{FilterOutcome, RelevanceFilter};
pub use funnel::{FunnelOutcome, FunnelRun, FunnelTrace, QueryRequest, RetrievalFunnel};
pub use reranker::{RerankOutcome, RerankerAdapter};
pub use retriever::{CandidateRetriever, RetrievalBatch};
