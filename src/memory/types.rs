use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk layout of [`JobMemoryRecord`].
pub const SCHEMA_VERSION: u32 = 1;

/// One completed stage. History entries are never modified after being appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage_id: u32,
    pub completed_at: DateTime<Utc>,
    pub key_findings: Vec<String>,
    /// 0 to 100.
    pub quality_score: f64,
    pub cost: f64,
    #[serde(default)]
    pub coverage: BTreeMap<String, serde_json::Value>,
}

/// Input for [`crate::memory::JobMemory::record_completion`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageCompletion {
    pub stage_id: u32,
    pub key_findings: Vec<String>,
    pub quality_score: f64,
    pub cost: f64,
    pub coverage: BTreeMap<String, serde_json::Value>,
}

impl StageCompletion {
    pub fn new(stage_id: u32, key_findings: Vec<String>, quality_score: f64, cost: f64) -> Self {
        Self {
            stage_id,
            key_findings,
            quality_score,
            cost,
            coverage: BTreeMap::new(),
        }
    }

    pub fn with_coverage(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.coverage.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageState {
    NotStarted,
    InProgress {
        stage_id: u32,
        #[serde(default)]
        percent_complete: f64,
    },
    Completed {
        stage_id: u32,
    },
    JobCompleted,
    Aborted {
        reason: String,
    },
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::JobCompleted | StageState::Aborted { .. })
    }

    pub fn stage_id(&self) -> Option<u32> {
        match self {
            StageState::InProgress { stage_id, .. } | StageState::Completed { stage_id } => {
                Some(*stage_id)
            }
            _ => None,
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::NotStarted => f.write_str("not started"),
            StageState::InProgress {
                stage_id,
                percent_complete,
            } => write!(f, "Stage {stage_id} ({percent_complete:.0}% complete)"),
            StageState::Completed { stage_id } => write!(f, "Stage {stage_id} (completed)"),
            StageState::JobCompleted => f.write_str("job completed"),
            StageState::Aborted { reason } => write!(f, "job aborted ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
    Budget,
    Time,
    Quality,
    /// Added by the orchestrator; survives risk recomputation.
    Manual,
}

impl RiskKind {
    fn label(&self) -> &'static str {
        match self {
            RiskKind::Budget => "Budget",
            RiskKind::Time => "Time",
            RiskKind::Quality => "Quality",
            RiskKind::Manual => "Manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub kind: RiskKind,
    pub level: RiskLevel,
    pub detail: String,
}

impl Risk {
    pub fn new(kind: RiskKind, level: RiskLevel, detail: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} risk: {} ({})", self.kind.label(), self.level, self.detail)
    }
}

/// Stage 1 latency telemetry. Not part of the stage history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub queries: u64,
    pub total_latency_ms: u64,
    pub last_latency_ms: u64,
}

impl RetrievalStats {
    pub fn average_latency_ms(&self) -> Option<u64> {
        self.total_latency_ms.checked_div(self.queries)
    }
}

/// Durable job state. Serialized as JSON by the job stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMemoryRecord {
    pub schema_version: u32,
    pub job_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executive_summary: String,
    pub stage_history: Vec<StageRecord>,
    pub current_stage: StageState,
    pub budget_used: f64,
    pub budget_limit: f64,
    pub elapsed_time: Duration,
    pub time_limit: Duration,
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub costs_by_stage: BTreeMap<String, f64>,
    #[serde(default)]
    pub retrieval: RetrievalStats,
}

impl JobMemoryRecord {
    pub fn new(
        job_id: impl Into<String>,
        budget_limit: f64,
        time_limit: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            job_id: job_id.into(),
            created_at: now,
            updated_at: now,
            executive_summary: "Job initialized".to_string(),
            stage_history: Vec::new(),
            current_stage: StageState::NotStarted,
            budget_used: 0.0,
            budget_limit,
            elapsed_time: Duration::ZERO,
            time_limit,
            risks: Vec::new(),
            gaps: Vec::new(),
            costs_by_stage: BTreeMap::new(),
            retrieval: RetrievalStats::default(),
        }
    }

    /// Highest stage id in the completed history.
    pub fn last_completed_stage_id(&self) -> Option<u32> {
        self.stage_history.iter().map(|s| s.stage_id).max()
    }

    /// Name of the first float field that JSON cannot carry (NaN or infinite).
    pub fn non_finite_field(&self) -> Option<&'static str> {
        if !self.budget_used.is_finite() {
            return Some("budget_used");
        }
        if !self.budget_limit.is_finite() {
            return Some("budget_limit");
        }
        if let StageState::InProgress {
            percent_complete, ..
        } = self.current_stage
            && !percent_complete.is_finite()
        {
            return Some("current_stage.percent_complete");
        }
        for stage in &self.stage_history {
            if !stage.quality_score.is_finite() {
                return Some("stage_history.quality_score");
            }
            if !stage.cost.is_finite() {
                return Some("stage_history.cost");
            }
        }
        if self.costs_by_stage.values().any(|c| !c.is_finite()) {
            return Some("costs_by_stage");
        }
        None
    }

    pub fn average_quality(&self) -> Option<f64> {
        if self.stage_history.is_empty() {
            return None;
        }
        let sum: f64 = self.stage_history.iter().map(|s| s.quality_score).sum();
        Some(sum / self.stage_history.len() as f64)
    }

    pub fn budget_fraction(&self) -> f64 {
        if self.budget_limit > 0.0 {
            self.budget_used / self.budget_limit
        } else {
            0.0
        }
    }

    pub fn time_fraction(&self) -> f64 {
        if self.time_limit.is_zero() {
            0.0
        } else {
            self.elapsed_time.as_secs_f64() / self.time_limit.as_secs_f64()
        }
    }
}
