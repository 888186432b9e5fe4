//! Stage 1: broad recall from the vector index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use super::config::RetrieverConfig;
use super::error::{FunnelError, FunnelResult, FunnelStage, QueryContext};
use crate::chunk::Candidate;
use crate::constants::DimConfig;
use crate::vectordb::{ChunkStore, Scope, SearchHit, VectorIndex};


/// Stage 1 result.
#[derive(Debug, Clone, Default)]
pub struct RetrievalBatch {
    /// Best first, at most `top_k`.
    pub candidates: Vec<Candidate>,
    /// Wall time of the index call plus chunk resolution.
    pub latency: Duration,
    /// Hits dropped because their chunk could not be resolved.
    pub unresolved: usize,
}

pub struct CandidateRetriever {
    index: Arc<dyn VectorIndex>,
    chunks: Option<Arc<dyn ChunkStore>>,
    config: RetrieverConfig,
    dims: DimConfig,
}

impl std::fmt::Debug for CandidateRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateRetriever")
            .field("config", &self.config)
            .field("has_chunk_store", &self.chunks.is_some())
            .finish_non_exhaustive()
    }
}

impl CandidateRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, config: RetrieverConfig) -> Self {
        let dims = DimConfig::new(config.embedding_dim);
        Self {
            index,
            chunks: None,
            config,
            dims,
        }
    }

    /// Resolves hits that arrive without chunk metadata.
    pub fn with_chunk_store(mut self, chunks: Arc<dyn ChunkStore>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Returns up to `top_k` candidates inside `scope`.
    ///
    /// Fewer results than `top_k` is not an error. An unreachable or slow index is, and
    /// so is a query vector of the wrong dimension.
    #[instrument(
        skip(self, ctx, query_vector, scope),
        fields(job_id = %ctx.job_id, scope = %scope, top_k = self.config.top_k)
    )]
    pub async fn retrieve(
        &self,
        ctx: &QueryContext,
        query_vector: &[f32],
        scope: &Scope,
    ) -> FunnelResult<RetrievalBatch> {
        let ctx = ctx.at(FunnelStage::Retrieve);

        self.dims
            .check(query_vector)
            .map_err(|e| FunnelError::InvalidQuery {
                context: ctx.clone(),
                reason: e.to_string(),
            })?;

        let start = Instant::now();
        let search = self.index.knn_search(query_vector, self.config.top_k, scope);
        let mut hits = match tokio::time::timeout(self.config.index_timeout, search).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(error = %e, "Vector index search failed");
                return Err(FunnelError::RetrievalUnavailable {
                    context: ctx,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                let timeout_ms = self.config.index_timeout.as_millis() as u64;
                warn!(timeout_ms, "Vector index search timed out");
                return Err(FunnelError::RetrievalUnavailable {
                    context: ctx,
                    reason: format!("index search timed out after {timeout_ms} ms"),
                });
            }
        };

        hits.truncate(usize::try_from(self.config.top_k).unwrap_or(usize::MAX));
        let hit_count = hits.len();

        let resolved = join_all(hits.into_iter().map(|hit| self.resolve(hit))).await;
        let candidates: Vec<Candidate> = resolved.into_iter().flatten().collect();
        let unresolved = hit_count - candidates.len();
        let latency = start.elapsed();

        debug!(
            hits = hit_count,
            candidates = candidates.len(),
            unresolved,
            latency_ms = latency.as_millis() as u64,
            "Stage 1 retrieval complete"
        );

        Ok(RetrievalBatch {
            candidates,
            latency,
            unresolved,
        })
    }

    async fn resolve(&self, hit: SearchHit) -> Option<Candidate> {
        if let Some(chunk) = hit.chunk {
            return Some(Candidate::new(chunk, hit.raw_score));
        }

        let chunk = match &self.chunks {
            Some(store) => store.get(&hit.chunk_id).await,
            None => None,
        };

        match chunk {
            Some(chunk) => Some(Candidate::new(chunk, hit.raw_score)),
            None => {
                warn!(chunk_id = %hit.chunk_id, "Chunk not found for index hit, skipping");
                None
            }
        }
    }
}
