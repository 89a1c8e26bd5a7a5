//! Phase 1: pre-count
//!
//! Validates every unique asset id with a concurrent metadata fan-out
//! and captures the pre-submission file list for the later diff. A
//! failed lookup is data: the batch's rows are errored and the batch
//! dropped. The phase is side-effect-free on the remote system, so
//! repeating it against unchanged state yields the same counts.

use super::BatchOrchestrator;
use crate::models::{AssetBatch, AssetLookup, CachedAssetState, ImportRun, RunPhase};
use crate::services::asset_validator;
use std::collections::HashMap;
use tracing::info;

impl BatchOrchestrator {
    /// Phase 1: look up every batched asset and record `file_count_before`.
    ///
    /// Returns the cached pre-states keyed by asset id. Aborts the run
    /// when no batch survives validation.
    pub(super) async fn phase_counting(
        &self,
        run: &mut ImportRun,
        batches: &mut Vec<AssetBatch>,
    ) -> HashMap<String, CachedAssetState> {
        self.transition(run, RunPhase::Counting).await;

        let ids: Vec<String> = batches.iter().map(|b| b.asset_id.clone()).collect();
        run.update_progress(0, ids.len(), "Validating assets and counting files");
        self.emit_progress(run);
        self.store(run).await;

        info!(
            run_id = %run.run_id,
            assets = ids.len(),
            "Phase 1: pre-counting files per asset"
        );

        let lookups = asset_validator::validate_assets(&self.client, &ids).await;

        let mut cache = HashMap::new();
        batches.retain_mut(|batch| match lookups.get(&batch.asset_id) {
            Some(AssetLookup::Found(metadata)) => {
                batch.file_count_before = metadata.files.len();
                cache.insert(
                    batch.asset_id.clone(),
                    CachedAssetState {
                        asset_id: batch.asset_id.clone(),
                        asset_type: metadata.asset_type.clone(),
                        files_before: metadata.files.clone(),
                        files_after: Vec::new(),
                        remote_url_from_csv: batch
                            .files
                            .first()
                            .map(|f| f.url.clone())
                            .unwrap_or_default(),
                    },
                );
                true
            }
            Some(lookup) => {
                let message = asset_validator::failure_message(&batch.asset_id, lookup);
                for &index in &batch.row_indices {
                    if let Some(row) = run.rows.get_mut(index) {
                        row.mark_error(message.clone());
                    }
                }
                false
            }
            // Every batch id was queried, so this arm is unreachable
            None => false,
        });

        run.update_progress(ids.len(), ids.len(), "Asset validation complete");
        self.emit_progress(run);
        self.store(run).await;

        info!(
            run_id = %run.run_id,
            valid = batches.len(),
            rejected = ids.len() - batches.len(),
            "Phase 1 complete"
        );

        if batches.is_empty() {
            self.abort(run, "No valid assets to process").await;
        }

        cache
    }
}
