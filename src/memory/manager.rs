use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::compress::compress;
use super::config::JobMemoryConfig;
use super::error::{JobMemoryError, JobMemoryResult};
use super::store::{JobMemoryStore, validate_job_id};
use super::types::{
    JobMemoryRecord, Risk, RiskKind, RiskLevel, StageCompletion, StageRecord, StageState,
};

/// Stage history, spend and risk state of one job.
///
/// Not synchronized; share it through [`crate::memory::JobMemoryHandle`].
#[derive(Debug, Clone)]
pub struct JobMemory {
    record: JobMemoryRecord,
    config: JobMemoryConfig,
}

impl JobMemory {
    pub fn new(job_id: impl Into<String>, config: JobMemoryConfig) -> JobMemoryResult<Self> {
        let job_id = job_id.into();
        validate_job_id(&job_id)?;
        config.validate().map_err(JobMemoryError::invalid_config)?;

        let record =
            JobMemoryRecord::new(job_id, config.budget_limit, config.time_limit, Utc::now());
        Ok(Self { record, config })
    }

    /// New job with a generated `job-<uuid>` id.
    pub fn create(config: JobMemoryConfig) -> JobMemoryResult<Self> {
        Self::new(format!("job-{}", Uuid::new_v4()), config)
    }

    pub fn from_record(record: JobMemoryRecord, config: JobMemoryConfig) -> Self {
        Self { record, config }
    }

    pub fn job_id(&self) -> &str {
        &self.record.job_id
    }

    pub fn record(&self) -> &JobMemoryRecord {
        &self.record
    }

    pub fn config(&self) -> &JobMemoryConfig {
        &self.config
    }

    pub fn current_stage(&self) -> &StageState {
        &self.record.current_stage
    }

    pub fn budget_used(&self) -> f64 {
        self.record.budget_used
    }

    pub fn remaining_budget(&self) -> f64 {
        (self.record.budget_limit - self.record.budget_used).max(0.0)
    }

    /// Moves to `stage_id`, which must be above every completed stage. Beginning the
    /// stage that is already in progress restarts it.
    pub fn begin_stage(&mut self, stage_id: u32) -> JobMemoryResult<()> {
        self.ensure_active()?;

        if let Some(last) = self.record.last_completed_stage_id()
            && stage_id <= last
        {
            return Err(JobMemoryError::StageOutOfOrder {
                job_id: self.record.job_id.clone(),
                last,
                requested: stage_id,
            });
        }

        match self.record.current_stage {
            StageState::InProgress {
                stage_id: current, ..
            } if current == stage_id => {
                debug!(job_id = %self.record.job_id, stage_id, "Restarting in-progress stage");
            }
            StageState::InProgress {
                stage_id: abandoned,
                ..
            } => {
                warn!(
                    job_id = %self.record.job_id,
                    abandoned,
                    next = stage_id,
                    "Starting a stage while another is in progress"
                );
            }
            _ => {}
        }

        self.record.current_stage = StageState::InProgress {
            stage_id,
            percent_complete: 0.0,
        };
        self.touch(Utc::now());
        debug!(job_id = %self.record.job_id, stage_id, "Stage started");
        Ok(())
    }

    /// Updates the in-progress percentage; ignored outside an in-progress stage.
    pub fn update_progress(&mut self, percent: f64) {
        if let StageState::InProgress {
            percent_complete, ..
        } = &mut self.record.current_stage
        {
            *percent_complete = if percent.is_finite() {
                percent.clamp(0.0, 100.0)
            } else {
                0.0
            };
            self.record.updated_at = Utc::now();
        }
    }

    /// Appends a completed stage. Never fails: out-of-order or post-terminal
    /// completions are recorded and logged.
    pub fn record_stage_completion(
        &mut self,
        stage_id: u32,
        key_findings: Vec<String>,
        quality_score: f64,
        cost: f64,
    ) {
        self.record_completion(StageCompletion::new(
            stage_id,
            key_findings,
            quality_score,
            cost,
        ));
    }

    pub fn record_completion(&mut self, completion: StageCompletion) {
        self.record_completion_at(completion, Utc::now());
    }

    pub(crate) fn record_completion_at(&mut self, completion: StageCompletion, now: DateTime<Utc>) {
        let StageCompletion {
            stage_id,
            key_findings,
            quality_score,
            cost,
            coverage,
        } = completion;

        let cost = if cost.is_finite() && cost > 0.0 {
            cost
        } else {
            if cost != 0.0 {
                warn!(job_id = %self.record.job_id, stage_id, cost, "Invalid stage cost, recording 0");
            }
            0.0
        };
        let quality_score = if quality_score.is_finite() {
            quality_score
        } else {
            0.0
        };

        match &self.record.current_stage {
            StageState::InProgress { stage_id: current, .. } if *current == stage_id => {}
            state if state.is_terminal() => {
                warn!(job_id = %self.record.job_id, stage_id, state = %state, "Stage completed after job ended");
            }
            state => {
                warn!(job_id = %self.record.job_id, stage_id, state = %state, "Stage completed out of order");
            }
        }

        self.record.stage_history.push(StageRecord {
            stage_id,
            completed_at: now,
            key_findings,
            quality_score,
            cost,
            coverage,
        });
        *self
            .record
            .costs_by_stage
            .entry(format!("stage_{stage_id}"))
            .or_insert(0.0) += cost;
        self.record.budget_used += cost;

        if !self.record.current_stage.is_terminal() {
            self.record.current_stage = StageState::Completed { stage_id };
        }

        self.refresh_elapsed(now);
        self.recompute_risks();
        self.touch(now);

        info!(
            job_id = %self.record.job_id,
            stage_id,
            quality_score,
            cost,
            budget_used = self.record.budget_used,
            "Stage completed"
        );
    }

    /// Fails if spending `additional_cost` would exceed the budget limit.
    ///
    /// Not atomic with [`JobMemory::record_stage_completion`]: concurrent callers can
    /// both pass the check.
    pub fn check_budget(&self, additional_cost: f64) -> JobMemoryResult<()> {
        let requested = if additional_cost.is_finite() {
            additional_cost.max(0.0)
        } else {
            0.0
        };
        let used = self.record.budget_used;
        let limit = self.record.budget_limit;

        if used + requested > limit {
            return Err(JobMemoryError::BudgetExceeded {
                job_id: self.record.job_id.clone(),
                stage: self.record.current_stage.stage_id(),
                used,
                limit,
                requested,
            });
        }
        Ok(())
    }

    pub fn complete_job(&mut self) -> JobMemoryResult<()> {
        self.ensure_active()?;
        self.record.current_stage = StageState::JobCompleted;
        let now = Utc::now();
        self.refresh_elapsed(now);
        self.touch(now);
        info!(job_id = %self.record.job_id, budget_used = self.record.budget_used, "Job completed");
        Ok(())
    }

    pub fn abort(&mut self, reason: impl Into<String>) -> JobMemoryResult<()> {
        self.ensure_active()?;
        let reason = reason.into();
        warn!(job_id = %self.record.job_id, reason = %reason, "Job aborted");
        self.record.current_stage = StageState::Aborted { reason };
        let now = Utc::now();
        self.refresh_elapsed(now);
        self.touch(now);
        Ok(())
    }

    /// Adds an orchestrator-supplied risk. Returns `false` for a duplicate.
    pub fn add_risk(&mut self, level: RiskLevel, detail: impl Into<String>) -> bool {
        let risk = Risk::new(RiskKind::Manual, level, detail);
        if self.record.risks.contains(&risk) {
            return false;
        }
        self.record.risks.push(risk);
        self.touch(Utc::now());
        true
    }

    /// Returns `false` for a duplicate.
    pub fn add_gap(&mut self, gap: impl Into<String>) -> bool {
        let gap = gap.into();
        if self.record.gaps.contains(&gap) {
            return false;
        }
        self.record.gaps.push(gap);
        self.touch(Utc::now());
        true
    }

    pub fn update_executive_summary(&mut self, summary: impl Into<String>) {
        self.record.executive_summary = summary.into();
        self.touch(Utc::now());
    }

    pub fn record_retrieval_latency(&mut self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let stats = &mut self.record.retrieval;
        stats.queries = stats.queries.saturating_add(1);
        stats.total_latency_ms = stats.total_latency_ms.saturating_add(ms);
        stats.last_latency_ms = ms;
    }

    /// Bounded summary for prompting; see [`crate::memory::compress`].
    pub fn get_compressed_context(&self) -> String {
        compress(&self.record, self.config.max_tokens, self.config.verbose_stages)
    }

    pub async fn persist(&self, store: &dyn JobMemoryStore) -> JobMemoryResult<()> {
        store.save(&self.record).await
    }

    pub async fn load(
        job_id: &str,
        store: &dyn JobMemoryStore,
        config: JobMemoryConfig,
    ) -> JobMemoryResult<Self> {
        config.validate().map_err(JobMemoryError::invalid_config)?;
        let record = store.load(job_id).await?;
        Ok(Self::from_record(record, config))
    }

    fn ensure_active(&self) -> JobMemoryResult<()> {
        if self.record.current_stage.is_terminal() {
            return Err(JobMemoryError::JobTerminated {
                job_id: self.record.job_id.clone(),
                state: self.record.current_stage.to_string(),
            });
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.record.updated_at {
            self.record.updated_at = now;
        }
    }

    fn refresh_elapsed(&mut self, now: DateTime<Utc>) {
        if let Ok(elapsed) = (now - self.record.created_at).to_std() {
            self.record.elapsed_time = elapsed;
        }
    }

    fn recompute_risks(&mut self) {
        let record = &self.record;
        let mut risks: Vec<Risk> = Vec::new();

        let budget_pct = record.budget_fraction() * 100.0;
        let budget_level = if budget_pct > 90.0 {
            Some(RiskLevel::Critical)
        } else if budget_pct > 75.0 {
            Some(RiskLevel::High)
        } else if budget_pct > 50.0 {
            Some(RiskLevel::Medium)
        } else {
            None
        };
        if let Some(level) = budget_level {
            risks.push(Risk::new(
                RiskKind::Budget,
                level,
                format!("{budget_pct:.0}% used"),
            ));
        }

        let time_pct = record.time_fraction() * 100.0;
        let time_level = if time_pct > 90.0 {
            Some(RiskLevel::Critical)
        } else if time_pct > 75.0 {
            Some(RiskLevel::High)
        } else {
            None
        };
        if let Some(level) = time_level {
            risks.push(Risk::new(
                RiskKind::Time,
                level,
                format!("{time_pct:.0}% elapsed"),
            ));
        }

        if let Some(avg) = record.average_quality()
            && avg < self.config.min_quality_score
        {
            risks.push(Risk::new(
                RiskKind::Quality,
                RiskLevel::Medium,
                format!("avg score: {avg:.1}"),
            ));
        }

        risks.extend(
            record
                .risks
                .iter()
                .filter(|r| r.kind == RiskKind::Manual)
                .cloned(),
        );
        self.record.risks = risks;
    }
}
