//! One generation turn: budget check, optional retrieval, generation, bookkeeping.
//!
//! Retrieval is an optional capability. A [`TurnSession`] built with
//! [`ContextCapability::Disabled`], or a funnel that finds nothing relevant, takes the
//! explicit no-context branch and still runs generation with the job summary.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::memory::{JobMemoryError, JobMemoryHandle, JobMemoryStore};
use crate::retrieval::{
    AssembledContext, EmptyCandidateSet, FunnelError, FunnelOutcome, FunnelTrace,
    QueryCancellation, QueryRequest, RetrievalFunnel,
};
use crate::vectordb::Scope;

#[cfg(test)]
mod tests;

/// Boxed error returned by a [`GenerationConsumer`].
pub type GenerationError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Funnel(#[from] FunnelError),

    #[error(transparent)]
    Memory(#[from] JobMemoryError),

    #[error("generation failed (job={job_id} stage={stage_id}): {source}")]
    Generation {
        job_id: String,
        stage_id: u32,
        #[source]
        source: GenerationError,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Whether turns retrieve context at all.
#[derive(Debug, Clone)]
pub enum ContextCapability {
    Enabled(Arc<RetrievalFunnel>),
    Disabled,
}

impl ContextCapability {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ContextCapability::Enabled(_))
    }
}

/// What the generation collaborator receives.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub job_id: &'a str,
    pub stage_id: u32,
    pub query: &'a str,
    /// `None` on the no-context branch.
    pub context: Option<&'a AssembledContext>,
    /// Compressed job memory.
    pub memory_summary: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    pub answer: String,
    pub key_findings: Vec<String>,
    /// 0 to 100.
    pub quality_score: f64,
    pub usage: GenerationUsage,
    /// Dollars spent on generation.
    pub cost: f64,
}

#[async_trait]
/// The LLM (or anything else) that turns context into an answer.
pub trait GenerationConsumer: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GenerationOutput, GenerationError>;
}

/// One turn's input.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub stage_id: u32,
    pub query: String,
    pub scope: Scope,
    pub vector: Option<Vec<f32>>,
    /// Spend expected for this turn, checked against the remaining budget up front.
    pub estimated_cost: f64,
}

impl TurnRequest {
    pub fn new(stage_id: u32, query: impl Into<String>, scope: Scope) -> Self {
        Self {
            stage_id,
            query: query.into(),
            scope,
            vector: None,
            estimated_cost: 0.0,
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub stage_id: u32,
    pub output: GenerationOutput,
    /// Context handed to generation, if any.
    pub context: Option<AssembledContext>,
    /// Set when retrieval ran but found nothing relevant.
    pub no_context: Option<EmptyCandidateSet>,
    pub trace: Option<FunnelTrace>,
    /// Generation plus query embedding cost, as recorded in job memory.
    pub cost: f64,
}

impl TurnOutcome {
    pub fn degraded(&self) -> bool {
        self.context.as_ref().is_some_and(|c| c.degraded)
    }
}

/// Runs turns for one job.
pub struct TurnSession {
    capability: ContextCapability,
    generator: Arc<dyn GenerationConsumer>,
    memory: JobMemoryHandle,
    store: Option<Arc<dyn JobMemoryStore>>,
}

impl std::fmt::Debug for TurnSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnSession")
            .field("job_id", &self.memory.job_id())
            .field("context_enabled", &self.capability.is_enabled())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

impl TurnSession {
    pub fn new(
        capability: ContextCapability,
        generator: Arc<dyn GenerationConsumer>,
        memory: JobMemoryHandle,
    ) -> Self {
        Self {
            capability,
            generator,
            memory,
            store: None,
        }
    }

    /// Checkpoints job memory after every completed turn.
    pub fn with_store(mut self, store: Arc<dyn JobMemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn memory(&self) -> &JobMemoryHandle {
        &self.memory
    }

    pub fn capability(&self) -> &ContextCapability {
        &self.capability
    }

    /// Runs stage `request.stage_id` end to end.
    ///
    /// Budget and stage order are checked before any external call. A failed
    /// retrieval or generation leaves the stage in progress with nothing recorded.
    #[instrument(
        skip(self, request, cancel),
        fields(job_id = %self.memory.job_id(), stage_id = request.stage_id)
    )]
    pub async fn run_turn(
        &self,
        request: &TurnRequest,
        cancel: &QueryCancellation,
    ) -> SessionResult<TurnOutcome> {
        let job_id = self.memory.job_id().to_string();

        {
            let mut memory = self.memory.lock().await;
            memory.check_budget(request.estimated_cost)?;
            memory.begin_stage(request.stage_id)?;
        }

        let mut context = None;
        let mut no_context = None;
        let mut trace = None;

        match &self.capability {
            ContextCapability::Enabled(funnel) => {
                let mut query = QueryRequest::new(&job_id, &request.query, request.scope.clone());
                if let Some(vector) = &request.vector {
                    query = query.with_vector(vector.clone());
                }

                let run = funnel.run(&query, Some(&self.memory), cancel).await?;
                match run.outcome {
                    FunnelOutcome::Context(assembled) => context = Some(assembled),
                    FunnelOutcome::NoRelevantContext(signal) => {
                        debug!(%signal, "Generating without retrieved context");
                        no_context = Some(signal);
                    }
                }
                trace = Some(run.trace);
            }
            ContextCapability::Disabled => {
                debug!("Context capability disabled");
            }
        }

        let summary = self.memory.compressed_context().await;
        let output = self
            .generator
            .generate(GenerationRequest {
                job_id: &job_id,
                stage_id: request.stage_id,
                query: &request.query,
                context: context.as_ref(),
                memory_summary: &summary,
            })
            .await
            .map_err(|source| SessionError::Generation {
                job_id: job_id.clone(),
                stage_id: request.stage_id,
                source,
            })?;

        let embedding_cost = trace
            .as_ref()
            .and_then(|t| t.embedding_usage)
            .map(|u| u.cost)
            .unwrap_or(0.0);
        let cost = output.cost + embedding_cost;

        self.memory.lock().await.record_stage_completion(
            request.stage_id,
            output.key_findings.clone(),
            output.quality_score,
            cost,
        );

        if let Some(store) = &self.store {
            self.memory.checkpoint(store.as_ref()).await?;
        }

        info!(
            cost,
            quality = output.quality_score,
            with_context = context.is_some(),
            "Turn complete"
        );

        Ok(TurnOutcome {
            stage_id: request.stage_id,
            output,
            context,
            no_context,
            trace,
            cost,
        })
    }
}
