//! Phase 2: submit + job
//!
//! One "add files" call per surviving asset, strictly sequential; the
//! client's rate limiter spaces the calls. Submission failures are
//! scoped to the affected batch. The successfully queued asset ids are
//! then collected into a timestamped itemized set and the import job is
//! run against it; any failure on that tail records a warning and the
//! run skips straight to Done without monitoring.

use super::BatchOrchestrator;
use crate::models::{AssetBatch, ImportRun, RowStatus, RunPhase};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl BatchOrchestrator {
    /// Phase 2: submit file links per asset, then create the set and
    /// trigger the import job.
    ///
    /// Returns whether a job instance was started. Cancellation stops
    /// the loop before the next submission is issued; rows not yet
    /// submitted stay pending for the caller to finalize.
    pub(super) async fn phase_submitting(
        &self,
        run: &mut ImportRun,
        batches: &[AssetBatch],
        cancel: &CancellationToken,
    ) -> bool {
        self.transition(run, RunPhase::Submitting).await;

        let total = batches.len();
        info!(
            run_id = %run.run_id,
            assets = total,
            "Phase 2: submitting file links"
        );

        let mut queued: Vec<String> = Vec::new();
        for (index, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    run_id = %run.run_id,
                    submitted = queued.len(),
                    "Cancellation requested; stopping before next submission"
                );
                return false;
            }

            run.update_progress(
                index,
                total,
                format!("Submitting files for asset {}", batch.asset_id),
            );
            self.emit_progress(run);
            self.store(run).await;

            if batch.files.is_empty() {
                for &row_index in &batch.row_indices {
                    if let Some(row) = run.rows.get_mut(row_index) {
                        row.mark_error("No file URL provided");
                    }
                }
                continue;
            }

            match self.client.submit_files(&batch.asset_id, &batch.files).await {
                Ok(()) => {
                    for &row_index in &batch.row_indices {
                        if let Some(row) = run.rows.get_mut(row_index) {
                            if row.status == RowStatus::Pending {
                                row.mark_success();
                            }
                        }
                    }
                    queued.push(batch.asset_id.clone());
                }
                Err(e) => {
                    warn!(
                        run_id = %run.run_id,
                        asset_id = %batch.asset_id,
                        error = %e,
                        "File submission failed"
                    );
                    let message = e.to_string();
                    for &row_index in &batch.row_indices {
                        if let Some(row) = run.rows.get_mut(row_index) {
                            if row.status == RowStatus::Pending {
                                row.mark_error(message.clone());
                            }
                        }
                    }
                }
            }
        }

        run.update_progress(total, total, "File submissions complete");
        self.emit_progress(run);
        self.store(run).await;

        if queued.is_empty() {
            self.warn_run(run, "No file submissions succeeded; the import job was not started")
                .await;
            return false;
        }
        if cancel.is_cancelled() {
            return false;
        }

        self.start_import_job(run, &queued).await
    }

    /// Collect queued assets into a set and run the import job on it.
    async fn start_import_job(&self, run: &mut ImportRun, queued: &[String]) -> bool {
        let set_name = format!(
            "Asset File Load - {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        let description = format!(
            "Auto-generated set for file ingestion. Contains {} asset(s).",
            queued.len()
        );

        let set_id = match self.client.create_set(&set_name, &description).await {
            Ok(set_id) => set_id,
            Err(e) => {
                self.warn_run(
                    run,
                    format!("Could not create asset set: {}; manual job execution may be required", e),
                )
                .await;
                return false;
            }
        };
        run.set_id = Some(set_id.clone());
        self.store(run).await;

        match self.client.add_set_members(&set_id, queued).await {
            Ok(count) => {
                info!(
                    run_id = %run.run_id,
                    set_id = %set_id,
                    members = count,
                    "Populated asset set"
                );
            }
            Err(e) => {
                self.warn_run(
                    run,
                    format!(
                        "Could not add assets to set {}: {}; manual job execution may be required",
                        set_id, e
                    ),
                )
                .await;
                return false;
            }
        }

        let job_id = match self.client.find_import_job().await {
            Ok(Some(job_id)) => job_id,
            Ok(None) => {
                let fallback = self.fallback_job_id.clone();
                self.warn_run(
                    run,
                    format!("Import job not found by name; falling back to job id {}", fallback),
                )
                .await;
                fallback
            }
            Err(e) => {
                let fallback = self.fallback_job_id.clone();
                self.warn_run(
                    run,
                    format!("Job discovery failed: {}; falling back to job id {}", e, fallback),
                )
                .await;
                fallback
            }
        };
        run.job_id = Some(job_id.clone());
        self.store(run).await;

        match self.client.run_job(&job_id, &set_id).await {
            Ok(instance_id) => {
                info!(
                    run_id = %run.run_id,
                    job_id = %job_id,
                    instance_id = %instance_id,
                    set_id = %set_id,
                    "Import job started"
                );
                run.job_instance_id = Some(instance_id);
                self.store(run).await;
                true
            }
            Err(e) => {
                self.warn_run(
                    run,
                    format!(
                        "Could not start import job {}: {}; manual job execution may be required",
                        job_id, e
                    ),
                )
                .await;
                false
            }
        }
    }
}
