use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::chunk::Chunk;

use super::index::ChunkStore;

/// Chunk lookup table filled by the loader (or by tests).
#[derive(Debug, Default)]
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<String, Arc<Chunk>>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `chunk`; an existing chunk with the same id is kept.
    pub fn insert(&self, chunk: Arc<Chunk>) -> bool {
        let mut chunks = self.chunks.write();
        if chunks.contains_key(chunk.id()) {
            return false;
        }
        chunks.insert(chunk.id().to_string(), chunk);
        true
    }

    pub fn extend(&self, chunks: impl IntoIterator<Item = Arc<Chunk>>) -> usize {
        chunks.into_iter().filter(|c| self.insert(Arc::clone(c))).count()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn get(&self, chunk_id: &str) -> Option<Arc<Chunk>> {
        self.chunks.read().get(chunk_id).cloned()
    }
}
