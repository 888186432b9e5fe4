//! The four stages wired together for one query.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use super::assembler::{AssembledContext, ContextAssembler};
use super::cancel::QueryCancellation;
use super::config::FunnelConfig;
use super::error::{EmptyCandidateSet, FunnelError, FunnelResult, FunnelStage, QueryContext};
use super::filter::RelevanceFilter;
use super::reranker::RerankerAdapter;
use super::retriever::CandidateRetriever;
use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingUsage};
use crate::memory::JobMemoryHandle;
use crate::rerank::RerankModel;
use crate::vectordb::{ChunkStore, Scope, VectorIndex};


/// One query against one job's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub job_id: String,
    pub query: String,
    pub scope: Scope,
    /// Precomputed query embedding. Without one the funnel's embedder is used.
    pub vector: Option<Vec<f32>>,
}

impl QueryRequest {
    pub fn new(job_id: impl Into<String>, query: impl Into<String>, scope: Scope) -> Self {
        Self {
            job_id: job_id.into(),
            query: query.into(),
            scope,
            vector: None,
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunnelOutcome {
    Context(AssembledContext),
    /// Nothing survived filtering. Not an error; the caller decides how to proceed.
    NoRelevantContext(EmptyCandidateSet),
}

impl FunnelOutcome {
    pub fn context(&self) -> Option<&AssembledContext> {
        match self {
            FunnelOutcome::Context(context) => Some(context),
            FunnelOutcome::NoRelevantContext(_) => None,
        }
    }

    pub fn into_context(self) -> Option<AssembledContext> {
        match self {
            FunnelOutcome::Context(context) => Some(context),
            FunnelOutcome::NoRelevantContext(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.context().is_some_and(|c| c.degraded)
    }
}

/// Per-stage counts and timings of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelTrace {
    pub stage1_candidates: usize,
    pub unresolved_hits: usize,
    pub stage2_survivors: usize,
    pub effective_threshold: f32,
    pub relaxation_steps: usize,
    pub filter_fallback: bool,
    pub stage3_candidates: usize,
    pub rerank_degraded: bool,
    pub rerank_fallback_reason: Option<String>,
    pub retrieval_latency: Duration,
    pub rerank_latency: Option<Duration>,
    pub embedding_usage: Option<EmbeddingUsage>,
    pub total_latency: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunnelRun {
    pub outcome: FunnelOutcome,
    pub trace: FunnelTrace,
}

/// Retriever, filter, reranker and assembler built from injected clients.
pub struct RetrievalFunnel {
    retriever: CandidateRetriever,
    filter: RelevanceFilter,
    reranker: RerankerAdapter,
    assembler: ContextAssembler,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: FunnelConfig,
}

impl std::fmt::Debug for RetrievalFunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalFunnel")
            .field("retriever", &self.retriever)
            .field("reranker", &self.reranker)
            .field("has_embedder", &self.embedder.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl RetrievalFunnel {
    /// Builds a funnel. `reranker = None` keeps Stage 2 ordering without marking
    /// results degraded.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        reranker: Option<Arc<dyn RerankModel>>,
        config: FunnelConfig,
    ) -> FunnelResult<Self> {
        config
            .validate()
            .map_err(|reason| FunnelError::InvalidConfig { reason })?;

        let reranker = match reranker {
            Some(model) => RerankerAdapter::new(model, config.rerank.clone()),
            None => RerankerAdapter::disabled(config.rerank.clone()),
        };

        Ok(Self {
            retriever: CandidateRetriever::new(index, config.retriever.clone()),
            filter: RelevanceFilter::new(config.filter.clone()),
            reranker,
            assembler: ContextAssembler::new(config.assembler.clone()),
            embedder: None,
            config,
        })
    }

    pub fn with_chunk_store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.retriever = self.retriever.with_chunk_store(store);
        self
    }

    /// Embeds queries that arrive without a vector. The provider's dimension must
    /// match the retriever's.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> FunnelResult<Self> {
        let expected = self.config.retriever.embedding_dim;
        if embedder.dimension() != expected {
            return Err(FunnelError::InvalidConfig {
                reason: format!(
                    "embedder dimension {} does not match index dimension {expected}",
                    embedder.dimension()
                ),
            });
        }
        self.embedder = Some(embedder);
        Ok(self)
    }

    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// Runs Stages 1 to 4 for `request`.
    ///
    /// `cancel` is checked before every stage. Retrieval latency is written to
    /// `memory` only once the query has finished.
    #[instrument(
        skip(self, request, memory, cancel),
        fields(job_id = %request.job_id, scope = %request.scope)
    )]
    pub async fn run(
        &self,
        request: &QueryRequest,
        memory: Option<&JobMemoryHandle>,
        cancel: &QueryCancellation,
    ) -> FunnelResult<FunnelRun> {
        let start = Instant::now();
        let ctx = QueryContext::new(&request.job_id, &request.query);
        let mut trace = FunnelTrace::default();

        ensure_live(cancel, &ctx, FunnelStage::Embed)?;
        let vector = match &request.vector {
            Some(vector) => vector.clone(),
            None => {
                let (vector, usage) = self.embed_query(&ctx).await?;
                trace.embedding_usage = Some(usage);
                vector
            }
        };

        ensure_live(cancel, &ctx, FunnelStage::Retrieve)?;
        let batch = self.retriever.retrieve(&ctx, &vector, &request.scope).await?;
        trace.stage1_candidates = batch.candidates.len();
        trace.unresolved_hits = batch.unresolved;
        trace.retrieval_latency = batch.latency;

        ensure_live(cancel, &ctx, FunnelStage::Filter)?;
        let filtered = self.filter.filter(batch.candidates);
        trace.stage2_survivors = filtered.candidates.len();
        trace.effective_threshold = filtered.effective_threshold;
        trace.relaxation_steps = filtered.relaxation_steps;
        trace.filter_fallback = filtered.fallback;

        if filtered.is_empty() {
            let signal = EmptyCandidateSet {
                context: ctx.at(FunnelStage::Filter),
                stage1_candidates: trace.stage1_candidates,
            };
            debug!(%signal, "No relevant context");
            self.record_latency(memory, batch.latency).await;
            trace.total_latency = start.elapsed();
            return Ok(FunnelRun {
                outcome: FunnelOutcome::NoRelevantContext(signal),
                trace,
            });
        }

        ensure_live(cancel, &ctx, FunnelStage::Rerank)?;
        let reranked = self
            .reranker
            .rerank(&ctx, &request.query, filtered.candidates)
            .await;
        trace.stage3_candidates = reranked.candidates.len();
        trace.rerank_degraded = reranked.degraded;
        trace.rerank_fallback_reason = reranked.fallback.as_ref().map(|e| e.to_string());
        trace.rerank_latency = reranked.model_latency;

        ensure_live(cancel, &ctx, FunnelStage::Assemble)?;
        let context = self
            .assembler
            .assemble(&ctx, reranked.candidates, reranked.degraded)?;

        self.record_latency(memory, batch.latency).await;
        trace.total_latency = start.elapsed();

        info!(
            stage1 = trace.stage1_candidates,
            stage2 = trace.stage2_survivors,
            stage3 = trace.stage3_candidates,
            blocks = context.blocks.len(),
            tokens = context.total_tokens,
            degraded = context.degraded,
            latency_ms = trace.total_latency.as_millis() as u64,
            "Funnel complete"
        );

        Ok(FunnelRun {
            outcome: FunnelOutcome::Context(context),
            trace,
        })
    }

    async fn embed_query(&self, ctx: &QueryContext) -> FunnelResult<(Vec<f32>, EmbeddingUsage)> {
        let ctx = ctx.at(FunnelStage::Embed);
        let Some(embedder) = &self.embedder else {
            return Err(FunnelError::EmbeddingFailed {
                context: ctx,
                source: EmbeddingError::InvalidConfig {
                    reason: "no query vector supplied and no embedding provider configured"
                        .to_string(),
                },
            });
        };

        embedder
            .embed(&ctx.query)
            .await
            .map_err(|source| FunnelError::EmbeddingFailed {
                context: ctx.clone(),
                source,
            })
    }

    async fn record_latency(&self, memory: Option<&JobMemoryHandle>, latency: Duration) {
        if let Some(memory) = memory {
            memory.lock().await.record_retrieval_latency(latency);
        }
    }
}

fn ensure_live(
    cancel: &QueryCancellation,
    ctx: &QueryContext,
    stage: FunnelStage,
) -> FunnelResult<()> {
    if cancel.is_cancelled() {
        return Err(FunnelError::Cancelled {
            context: ctx.at(stage),
        });
    }
    Ok(())
}
