use std::sync::Arc;

use async_trait::async_trait;

use crate::chunk::Chunk;

use super::error::VectorDbError;
use super::model::{Scope, SearchHit};

#[async_trait]
/// Nearest-neighbor search over an externally populated index.
pub trait VectorIndex: Send + Sync {
    /// Returns up to `k` hits inside `scope`, best first.
    async fn knn_search(
        &self,
        query: &[f32],
        k: u64,
        scope: &Scope,
    ) -> Result<Vec<SearchHit>, VectorDbError>;

    /// Returns `true` if the index answers requests.
    async fn is_ready(&self) -> bool {
        true
    }
}

#[async_trait]
/// Resolves chunk ids returned by an index that does not store chunk metadata.
pub trait ChunkStore: Send + Sync {
    async fn get(&self, chunk_id: &str) -> Option<Arc<Chunk>>;
}
