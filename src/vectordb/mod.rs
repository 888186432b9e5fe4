//! Vector index access for Stage 1 retrieval.
//!
//! The index is populated by an external loader; this module only reads it (plus the
//! maintenance calls the loader uses on [`QdrantIndex`]).

pub mod client;
pub mod error;
pub mod index;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod store;


pub use client::QdrantIndex;
pub use error::VectorDbError;
pub use index::{ChunkStore, VectorIndex};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockVectorIndex, cosine_similarity};
pub use model::{IndexedChunk, Scope, SearchHit};
pub use store::InMemoryChunkStore;

pub const DEFAULT_COLLECTION_NAME: &str = "rag_job_chunks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteConsistency {
    /// Wait until written chunks are searchable.
    /// Maps to `wait=true`.
    Strong,
    /// Return once the server acknowledges the write.
    /// Maps to `wait=false`.
    Eventual,
}

impl From<WriteConsistency> for bool {
    fn from(c: WriteConsistency) -> bool {
        matches!(c, WriteConsistency::Strong)
    }
}
