//! Import run state machine
//!
//! A run is one end-to-end pass of the pipeline: group rows, pre-count
//! files, submit, await the remote job, verify. All run state lives in
//! memory for the duration of the run.

use crate::models::import_row::{ImportRow, RowStatus};
use crate::models::job::JobStatus;
use crate::models::verification::BatchVerificationSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Phases of the three-phase batch protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// Rows are being folded into per-asset batches
    Grouping,
    /// Phase 1: pre-count file lists for every unique asset
    Counting,
    /// Phase 2: per-asset file submissions, then set + job
    Submitting,
    /// Remote job triggered, poll loop in progress
    AwaitingJob,
    /// Phase 3: post-count and before/after diff
    Verifying,
    Done,
    Aborted,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Grouping => "GROUPING",
            RunPhase::Counting => "COUNTING",
            RunPhase::Submitting => "SUBMITTING",
            RunPhase::AwaitingJob => "AWAITING_JOB",
            RunPhase::Verifying => "VERIFYING",
            RunPhase::Done => "DONE",
            RunPhase::Aborted => "ABORTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Aborted)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of a phase change, for logging and event emission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub run_id: Uuid,
    pub from: RunPhase,
    pub to: RunPhase,
    pub timestamp: DateTime<Utc>,
}

/// Progress within the current phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
    pub current_operation: String,
    pub elapsed_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_seconds: Option<u64>,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            current: 0,
            total: 0,
            percentage: 0.0,
            current_operation: "Initializing...".to_string(),
            elapsed_seconds: 0,
            estimated_remaining_seconds: None,
        }
    }
}

/// Per-status row tallies for a run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RowCounts {
    pub pending: usize,
    pub success: usize,
    pub error: usize,
    pub unchanged: usize,
}

/// One import run and everything it has produced so far
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub progress: RunProgress,
    pub rows: Vec<ImportRow>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Remote set created for the job, once Phase 2 reaches it
    pub set_id: Option<String>,
    pub job_id: Option<String>,
    pub job_instance_id: Option<String>,
    pub job_status: Option<JobStatus>,
    /// Counters reported by the terminal job instance
    #[serde(default)]
    pub job_counters: HashMap<String, i64>,
    /// Non-fatal problems surfaced to the user alongside results
    pub warnings: Vec<String>,
    pub verification: Option<BatchVerificationSummary>,
    /// Set when the run aborts before completing
    pub error_message: Option<String>,
}

impl ImportRun {
    pub fn new(rows: Vec<ImportRow>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase: RunPhase::Grouping,
            progress: RunProgress::default(),
            rows,
            started_at: Utc::now(),
            ended_at: None,
            set_id: None,
            job_id: None,
            job_instance_id: None,
            job_status: None,
            job_counters: HashMap::new(),
            warnings: Vec::new(),
            verification: None,
            error_message: None,
        }
    }

    /// Move to the next phase, stamping `ended_at` on terminal phases
    pub fn transition_to(&mut self, next: RunPhase) -> PhaseTransition {
        let transition = PhaseTransition {
            run_id: self.run_id,
            from: self.phase,
            to: next,
            timestamp: Utc::now(),
        };
        self.phase = next;
        if next.is_terminal() {
            self.ended_at = Some(transition.timestamp);
        }
        transition
    }

    /// Update in-phase progress, recomputing percentage and ETA
    pub fn update_progress(&mut self, current: usize, total: usize, operation: impl Into<String>) {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
            .max(0) as u64;
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let estimated_remaining_seconds = if current > 0 && current < total {
            let per_item = elapsed as f64 / current as f64;
            Some((per_item * (total - current) as f64) as u64)
        } else {
            None
        };
        self.progress = RunProgress {
            current,
            total,
            percentage,
            current_operation: operation.into(),
            elapsed_seconds: elapsed,
            estimated_remaining_seconds,
        };
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Wall-clock duration, available once the run has ended
    pub fn duration_seconds(&self) -> Option<u64> {
        self.ended_at.map(|ended| {
            ended
                .signed_duration_since(self.started_at)
                .num_seconds()
                .max(0) as u64
        })
    }

    pub fn row_counts(&self) -> RowCounts {
        let mut counts = RowCounts::default();
        for row in &self.rows {
            match row.status {
                RowStatus::Pending => counts.pending += 1,
                RowStatus::Success => counts.success += 1,
                RowStatus::Error => counts.error += 1,
                RowStatus::Unchanged => counts.unchanged += 1,
            }
        }
        counts
    }
}
