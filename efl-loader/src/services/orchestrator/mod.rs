//! Batch import orchestrator
//!
//! Drives one import run through the three-phase protocol:
//!
//! `Grouping → Counting → Submitting → AwaitingJob → Verifying → Done`
//!
//! with `Aborted` reachable from any phase. Each phase is handled by a
//! dedicated `phase_*` method:
//!
//! - **Counting** (phase_counting.rs): concurrent asset lookups, capture
//!   pre-submission file counts
//! - **Submitting** (phase_submitting.rs): sequential per-asset file
//!   submissions, then set creation and job trigger
//! - **Verifying** (phase_verifying.rs): concurrent post-job re-fetch and
//!   before/after diff
//!
//! The orchestrator owns no run storage of its own; it writes the run
//! record into the shared run map at every checkpoint so status queries
//! observe live progress. Remote failures are recorded on rows and as
//! run warnings, never propagated as task errors.

use crate::models::{AssetBatch, FileLink, ImportRun, RunPhase};
use crate::services::esploro_client::EsploroClient;
use crate::services::job_monitor::{JobMonitor, MonitorOutcome};
use chrono::Utc;
use efl_common::events::{EventBus, LoaderEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

mod phase_counting;
mod phase_submitting;
mod phase_verifying;

/// Shared, in-memory run records keyed by run id
///
/// Handlers read from this map; only the owning run task writes a given
/// run's entry.
pub type RunStore = Arc<RwLock<HashMap<Uuid, ImportRun>>>;

/// Batch orchestrator service
pub struct BatchOrchestrator {
    client: Arc<EsploroClient>,
    event_bus: EventBus,
    runs: RunStore,
    monitor: JobMonitor,
    /// Job id used when discovery by name fails or finds nothing
    fallback_job_id: String,
}

impl BatchOrchestrator {
    pub fn new(
        client: Arc<EsploroClient>,
        event_bus: EventBus,
        runs: RunStore,
        monitor: JobMonitor,
        fallback_job_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            event_bus,
            runs,
            monitor,
            fallback_job_id: fallback_job_id.into(),
        }
    }

    /// Execute one import run end to end.
    ///
    /// The returned run is terminal (`Done` or `Aborted`). The token is
    /// honored between phases, between Phase 2 submissions, and inside
    /// the poll loop; an issued submission is never aborted mid-flight.
    pub async fn execute(
        &self,
        mut run: ImportRun,
        default_file_type: Option<String>,
        cancel: CancellationToken,
    ) -> ImportRun {
        info!(
            run_id = %run.run_id,
            rows = run.rows.len(),
            "Starting import run"
        );
        self.event_bus.emit_lossy(LoaderEvent::RunStarted {
            run_id: run.run_id,
            row_count: run.rows.len(),
            timestamp: Utc::now(),
        });

        // Grouping: fold rows into per-asset batches
        let mut batches = group_rows(&mut run, default_file_type.as_deref());
        info!(
            run_id = %run.run_id,
            batches = batches.len(),
            "Grouped rows into per-asset batches"
        );
        self.store(&run).await;
        if cancel.is_cancelled() {
            self.cancel_run(&mut run).await;
            return run;
        }

        // Phase 1: pre-count
        let mut cache = self.phase_counting(&mut run, &mut batches).await;
        if run.is_terminal() {
            return run;
        }
        if cancel.is_cancelled() {
            self.cancel_run(&mut run).await;
            return run;
        }

        // Phase 2: submit + set + job
        let job_started = self.phase_submitting(&mut run, &batches, &cancel).await;
        if cancel.is_cancelled() {
            self.cancel_run(&mut run).await;
            return run;
        }

        // AwaitingJob: poll until the job settles
        let verify = if job_started {
            self.await_job(&mut run, &cancel).await
        } else {
            false
        };
        if cancel.is_cancelled() {
            self.cancel_run(&mut run).await;
            return run;
        }

        // Phase 3: post-count + diff
        if verify {
            self.phase_verifying(&mut run, &mut batches, &mut cache).await;
        }

        self.complete(&mut run).await;
        run
    }

    /// Wait for the triggered job instance to reach a terminal status.
    ///
    /// Returns whether verification should run. Timeouts and poll
    /// failures leave row statuses untouched and tell the user to check
    /// the job manually.
    async fn await_job(&self, run: &mut ImportRun, cancel: &CancellationToken) -> bool {
        self.transition(run, RunPhase::AwaitingJob).await;

        let (job_id, instance_id) = match (run.job_id.clone(), run.job_instance_id.clone()) {
            (Some(job_id), Some(instance_id)) => (job_id, instance_id),
            _ => return false,
        };

        run.update_progress(0, 0, format!("Waiting for import job {}", job_id));
        self.emit_progress(run);
        self.store(run).await;

        let outcome = self
            .monitor
            .watch(
                &self.client,
                run.run_id,
                &job_id,
                &instance_id,
                &self.event_bus,
                cancel,
            )
            .await;

        match outcome {
            MonitorOutcome::Finished(instance) => {
                info!(
                    run_id = %run.run_id,
                    job_id = %job_id,
                    status = %instance.status,
                    "Import job finished"
                );
                run.job_status = Some(instance.status);
                run.job_counters = instance.counter_map();
                if let Some(&failed) = run
                    .job_counters
                    .get(crate::models::COUNTER_ASSETS_FAILED)
                {
                    if failed > 0 {
                        self.warn_run(run, format!("{} assets failed to process", failed))
                            .await;
                    }
                }
                self.store(run).await;
                true
            }
            MonitorOutcome::TimedOut { last_status } => {
                run.job_status = last_status;
                self.warn_run(run, "Job monitoring timed out; check job status manually")
                    .await;
                false
            }
            MonitorOutcome::Failed(message) => {
                self.warn_run(
                    run,
                    format!("Job status polling failed: {}; check job status manually", message),
                )
                .await;
                false
            }
            // The caller's cancellation check finalizes the run
            MonitorOutcome::Cancelled => false,
        }
    }

    /// Transition to `Done`, emit the completion event, and persist.
    async fn complete(&self, run: &mut ImportRun) {
        self.transition(run, RunPhase::Done).await;
        run.update_progress(run.rows.len(), run.rows.len(), "Import run complete");

        let counts = run.row_counts();
        let duration_seconds = run.duration_seconds().unwrap_or(0);
        self.event_bus.emit_lossy(LoaderEvent::RunCompleted {
            run_id: run.run_id,
            successful_rows: counts.success,
            error_rows: counts.error,
            unchanged_rows: counts.unchanged,
            duration_seconds,
            timestamp: Utc::now(),
        });
        self.store(run).await;

        info!(
            run_id = %run.run_id,
            success = counts.success,
            errors = counts.error,
            unchanged = counts.unchanged,
            duration_seconds,
            "Import run complete"
        );
    }

    /// Abort the run with an unrecoverable error.
    async fn abort(&self, run: &mut ImportRun, message: &str) {
        error!(run_id = %run.run_id, "Import run aborted: {}", message);
        run.error_message = Some(message.to_string());
        self.transition(run, RunPhase::Aborted).await;
        self.event_bus.emit_lossy(LoaderEvent::RunFailed {
            run_id: run.run_id,
            error_message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Finalize a run whose cancellation token fired.
    async fn cancel_run(&self, run: &mut ImportRun) {
        info!(run_id = %run.run_id, "Import run cancelled");
        run.error_message = Some("Cancelled by user".to_string());
        self.transition(run, RunPhase::Aborted).await;
        self.event_bus.emit_lossy(LoaderEvent::RunCancelled {
            run_id: run.run_id,
            timestamp: Utc::now(),
        });
    }

    /// Record a non-fatal problem on the run and broadcast it.
    async fn warn_run(&self, run: &mut ImportRun, message: impl Into<String>) {
        let message = message.into();
        warn!(run_id = %run.run_id, "{}", message);
        self.event_bus.emit_lossy(LoaderEvent::RunWarning {
            run_id: run.run_id,
            message: message.clone(),
            timestamp: Utc::now(),
        });
        run.add_warning(message);
        self.store(run).await;
    }

    /// Move the run to the next phase, log it, broadcast it, persist it.
    async fn transition(&self, run: &mut ImportRun, next: RunPhase) {
        let transition = run.transition_to(next);
        info!(
            run_id = %run.run_id,
            from = %transition.from,
            to = %transition.to,
            "Run phase transition"
        );
        self.event_bus.emit_lossy(LoaderEvent::RunPhaseChanged {
            run_id: run.run_id,
            old_phase: transition.from.as_str().to_string(),
            new_phase: transition.to.as_str().to_string(),
            timestamp: transition.timestamp,
        });
        self.store(run).await;
    }

    /// Broadcast the run's current in-phase progress.
    fn emit_progress(&self, run: &ImportRun) {
        self.event_bus.emit_lossy(LoaderEvent::RunProgress {
            run_id: run.run_id,
            phase: run.phase.as_str().to_string(),
            current: run.progress.current,
            total: run.progress.total,
            percentage: run.progress.percentage,
            current_operation: run.progress.current_operation.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Write the current run state into the shared map.
    async fn store(&self, run: &ImportRun) {
        self.runs.write().await.insert(run.run_id, run.clone());
    }
}

/// Fold rows into per-asset batches, preserving first-seen asset order.
///
/// Rows with an empty asset id are marked `error` and excluded. Rows
/// whose file type is empty receive the run's default type before the
/// link is built. A row with an empty URL still joins its batch (so the
/// batch can error it later) but contributes no link.
pub(crate) fn group_rows(
    run: &mut ImportRun,
    default_file_type: Option<&str>,
) -> Vec<AssetBatch> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, AssetBatch> = HashMap::new();

    for (index, row) in run.rows.iter_mut().enumerate() {
        let asset_id = row.asset_id.trim().to_string();
        if asset_id.is_empty() {
            row.mark_error("Missing MMS ID");
            continue;
        }

        if row.file_type.as_deref().map_or(true, |t| t.trim().is_empty()) {
            if let Some(default) = default_file_type {
                row.file_type = Some(default.to_string());
            }
        }

        let batch = by_id.entry(asset_id.clone()).or_insert_with(|| {
            order.push(asset_id.clone());
            AssetBatch::new(asset_id.clone())
        });
        batch.row_indices.push(index);

        let url = row.remote_url.trim();
        if !url.is_empty() {
            batch.files.push(FileLink {
                title: row.file_title.clone().unwrap_or_default(),
                url: url.to_string(),
                description: row.file_description.clone(),
                link_type: row.file_type.clone().unwrap_or_default(),
                supplemental: row.supplemental,
            });
        }
    }

    order.into_iter().filter_map(|id| by_id.remove(&id)).collect()
}
