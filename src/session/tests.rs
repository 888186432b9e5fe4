use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::chunk::Chunk;
use crate::memory::{InMemoryJobStore, JobMemory, JobMemoryConfig, StageState};
use crate::retrieval::{FunnelConfig, RerankConfig, RetrieverConfig};
use crate::vectordb::MockVectorIndex;

const DIM: usize = 3;

#[derive(Debug, Clone)]
struct Seen {
    stage_id: u32,
    had_context: bool,
    context_chunks: usize,
    memory_summary: String,
}

/// Records what it was asked and answers with a fixed output.
struct RecordingGenerator {
    seen: Mutex<Vec<Seen>>,
    output: GenerationOutput,
    fail: bool,
}

impl RecordingGenerator {
    fn new(cost: f64) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            output: GenerationOutput {
                answer: "The warranty lasts two years.".to_string(),
                key_findings: vec!["warranty is two years".to_string()],
                quality_score: 92.0,
                usage: GenerationUsage {
                    prompt_tokens: 1200,
                    completion_tokens: 80,
                },
                cost,
            },
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0.0)
        }
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl GenerationConsumer for RecordingGenerator {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GenerationOutput, GenerationError> {
        self.seen.lock().push(Seen {
            stage_id: request.stage_id,
            had_context: request.context.is_some(),
            context_chunks: request.context.map(|c| c.chunk_count()).unwrap_or(0),
            memory_summary: request.memory_summary.to_string(),
        });
        if self.fail {
            return Err("model overloaded".into());
        }
        Ok(self.output.clone())
    }
}

fn scope() -> Scope {
    Scope::new("job-s")
}

fn funnel(scores: &[f32]) -> Arc<RetrievalFunnel> {
    let index = Arc::new(MockVectorIndex::new());
    for (i, &score) in scores.iter().enumerate() {
        let chunk = Chunk::new(
            format!("w{i}"),
            format!("warranty clause {i}"),
            "warranty.md",
            i as u32 * 3,
        );
        index.insert_scored(&scope(), Arc::new(chunk), score);
    }

    let config = FunnelConfig {
        retriever: RetrieverConfig::default()
            .with_embedding_dim(DIM)
            .with_top_k(10),
        rerank: RerankConfig::default().with_top_k(5),
        ..FunnelConfig::default()
    };
    Arc::new(RetrievalFunnel::new(index, None, config).unwrap())
}

fn memory() -> JobMemoryHandle {
    JobMemoryHandle::new(
        JobMemory::new(
            "job-s",
            JobMemoryConfig::default().with_budget_limit(10.0),
        )
        .unwrap(),
    )
}

fn turn(stage_id: u32) -> TurnRequest {
    TurnRequest::new(stage_id, "how long is the warranty", scope()).with_vector(vec![1.0; DIM])
}

#[tokio::test]
async fn test_turn_with_context_records_completion() {
    let generator = Arc::new(RecordingGenerator::new(1.5));
    let session = TurnSession::new(
        ContextCapability::Enabled(funnel(&[0.9, 0.85, 0.8, 0.79, 0.77])),
        generator.clone(),
        memory(),
    );

    let outcome = session
        .run_turn(&turn(1), &QueryCancellation::new())
        .await
        .unwrap();

    assert_eq!(outcome.stage_id, 1);
    assert_eq!(outcome.context.as_ref().unwrap().chunk_count(), 5);
    assert!(outcome.no_context.is_none());
    assert!(!outcome.degraded());
    assert_eq!(outcome.cost, 1.5);

    let seen = generator.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].had_context);
    assert_eq!(seen[0].context_chunks, 5);
    assert!(seen[0].memory_summary.contains("Stage 1 (0% complete)"));

    let mem = session.memory().lock().await;
    assert_eq!(mem.current_stage(), &StageState::Completed { stage_id: 1 });
    assert_eq!(mem.budget_used(), 1.5);
    assert_eq!(mem.record().stage_history[0].key_findings, vec!["warranty is two years"]);
    assert_eq!(mem.record().retrieval.queries, 1);
}

#[tokio::test]
async fn test_disabled_capability_takes_no_context_branch() {
    let generator = Arc::new(RecordingGenerator::new(0.5));
    let session = TurnSession::new(ContextCapability::Disabled, generator.clone(), memory());

    let outcome = session
        .run_turn(&turn(1), &QueryCancellation::new())
        .await
        .unwrap();

    assert!(outcome.context.is_none());
    assert!(outcome.no_context.is_none());
    assert!(outcome.trace.is_none());
    assert!(!generator.seen()[0].had_context);
    assert_eq!(session.memory().lock().await.record().stage_history.len(), 1);
}

#[tokio::test]
async fn test_no_relevant_context_still_generates() {
    let generator = Arc::new(RecordingGenerator::new(0.5));
    let mut config = FunnelConfig {
        retriever: RetrieverConfig::default()
            .with_embedding_dim(DIM)
            .with_top_k(10),
        rerank: RerankConfig::default().with_top_k(5),
        ..FunnelConfig::default()
    };
    config.filter = config
        .filter
        .with_starvation(crate::retrieval::StarvationPolicy::Empty);

    let index = Arc::new(MockVectorIndex::new());
    index.insert_scored(
        &scope(),
        Arc::new(Chunk::new("x", "unrelated", "misc.md", 0)),
        0.1,
    );
    let funnel = Arc::new(RetrievalFunnel::new(index, None, config).unwrap());

    let session = TurnSession::new(
        ContextCapability::Enabled(funnel),
        generator.clone(),
        memory(),
    );
    let outcome = session
        .run_turn(&turn(1), &QueryCancellation::new())
        .await
        .unwrap();

    assert!(outcome.context.is_none());
    assert_eq!(outcome.no_context.unwrap().stage1_candidates, 1);
    assert!(!generator.seen()[0].had_context);
}

#[tokio::test]
async fn test_budget_exceeded_stops_before_generation() {
    let generator = Arc::new(RecordingGenerator::new(0.5));
    let session = TurnSession::new(ContextCapability::Disabled, generator.clone(), memory());

    let err = session
        .run_turn(
            &turn(1).with_estimated_cost(10.5),
            &QueryCancellation::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Memory(JobMemoryError::BudgetExceeded { .. })
    ));
    assert!(generator.seen().is_empty());
    assert_eq!(
        session.memory().lock().await.current_stage(),
        &StageState::NotStarted
    );
}

#[tokio::test]
async fn test_stage_must_advance() {
    let generator = Arc::new(RecordingGenerator::new(0.5));
    let session = TurnSession::new(ContextCapability::Disabled, generator.clone(), memory());
    let cancel = QueryCancellation::new();

    session.run_turn(&turn(2), &cancel).await.unwrap();
    let err = session.run_turn(&turn(2), &cancel).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Memory(JobMemoryError::StageOutOfOrder { .. })
    ));
    assert_eq!(generator.seen().len(), 1);
    assert_eq!(generator.seen()[0].stage_id, 2);
}

#[tokio::test]
async fn test_generation_failure_records_nothing() {
    let session = TurnSession::new(
        ContextCapability::Disabled,
        Arc::new(RecordingGenerator::failing()),
        memory(),
    );

    let err = session
        .run_turn(&turn(1), &QueryCancellation::new())
        .await
        .unwrap_err();

    match &err {
        SessionError::Generation { job_id, stage_id, .. } => {
            assert_eq!(job_id, "job-s");
            assert_eq!(*stage_id, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("model overloaded"));

    let mem = session.memory().lock().await;
    assert!(mem.record().stage_history.is_empty());
    assert!(matches!(
        mem.current_stage(),
        StageState::InProgress { stage_id: 1, .. }
    ));
}

#[tokio::test]
async fn test_failed_stage_can_be_retried() {
    let handle = memory();
    let cancel = QueryCancellation::new();

    let failing = TurnSession::new(
        ContextCapability::Disabled,
        Arc::new(RecordingGenerator::failing()),
        handle.clone(),
    );
    assert!(matches!(
        failing.run_turn(&turn(1), &cancel).await,
        Err(SessionError::Generation { stage_id: 1, .. })
    ));

    let generator = Arc::new(RecordingGenerator::new(0.5));
    let retry = TurnSession::new(ContextCapability::Disabled, generator.clone(), handle);
    let outcome = retry.run_turn(&turn(1), &cancel).await.unwrap();

    assert_eq!(outcome.stage_id, 1);
    assert_eq!(generator.seen().len(), 1);
    let mem = retry.memory().lock().await;
    assert_eq!(mem.record().stage_history.len(), 1);
    assert_eq!(mem.current_stage(), &StageState::Completed { stage_id: 1 });
    assert_eq!(mem.budget_used(), 0.5);
}

#[tokio::test]
async fn test_cancelled_turn_records_nothing() {
    let generator = Arc::new(RecordingGenerator::new(0.5));
    let session = TurnSession::new(
        ContextCapability::Enabled(funnel(&[0.9])),
        generator.clone(),
        memory(),
    );

    let cancel = QueryCancellation::new();
    cancel.cancel();
    let err = session.run_turn(&turn(1), &cancel).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Funnel(FunnelError::Cancelled { .. })
    ));
    assert!(generator.seen().is_empty());
    let mem = session.memory().lock().await;
    assert!(mem.record().stage_history.is_empty());
    assert_eq!(mem.record().retrieval.queries, 0);
}

#[tokio::test]
async fn test_turn_checkpoints_to_store() {
    let store = Arc::new(InMemoryJobStore::new());
    let session = TurnSession::new(
        ContextCapability::Disabled,
        Arc::new(RecordingGenerator::new(2.0)),
        memory(),
    )
    .with_store(store.clone());

    session
        .run_turn(&turn(1), &QueryCancellation::new())
        .await
        .unwrap();

    let saved = store.load("job-s").await.unwrap();
    assert_eq!(saved.budget_used, 2.0);
    assert_eq!(saved.stage_history.len(), 1);
}
