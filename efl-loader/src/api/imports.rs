//! Import pipeline API handlers
//!
//! POST /imports/preview, POST /imports/validate-rows, POST /imports,
//! GET /imports/{run_id}[, /report, /export/*], POST /imports/{run_id}/cancel
//!
//! Starting an import validates the input up front (input errors are
//! 400s and nothing is submitted), creates the run record, and spawns a
//! background task that drives the orchestrator. Status queries read
//! the shared run map the task writes into.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    fallback_type_options, BatchVerificationSummary, ColumnMapping, EntryRow, EntryRowState,
    FileTypeConversion, FileTypeOption, ImportRow, ImportRun, JobStatus, MappedField, RowCounts,
    RunPhase, RunProgress,
};
use crate::services::csv_ingestor::{self, ParsedCsv};
use crate::services::job_monitor::JobMonitor;
use crate::services::orchestrator::BatchOrchestrator;
use crate::services::row_state::{self, DUPLICATES_MESSAGE, URL_FORMAT_MESSAGE};
use crate::services::{asset_validator, field_mapper, reports, type_reconciler};
use crate::AppState;

/// POST /imports/preview request
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// CSV file to inspect
    pub csv_path: PathBuf,
    /// Manual column remaps, keyed by CSV header
    #[serde(default)]
    pub mapping_overrides: HashMap<String, String>,
}

/// POST /imports/preview response
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub headers: Vec<String>,
    pub row_count: usize,
    pub mappings: Vec<ColumnMapping>,
    /// Missing/duplicate mapping problems; empty when processable
    pub mapping_errors: Vec<String>,
    /// Rows missing a required value, by spreadsheet row number
    pub value_errors: Vec<String>,
    /// Reconciliation of the type column's distinct values, when mapped
    pub type_conversions: Vec<FileTypeConversion>,
    pub warnings: Vec<String>,
}

/// POST /imports/validate-rows request (manual-entry path)
#[derive(Debug, Deserialize)]
pub struct ValidateRowsRequest {
    pub entries: Vec<EntryRow>,
}

/// POST /imports/validate-rows response
#[derive(Debug, Serialize)]
pub struct ValidateRowsResponse {
    /// Entries with recomputed states, invalid rows first
    pub entries: Vec<EntryRow>,
    pub messages: Vec<String>,
    pub invalid_count: usize,
    pub duplicate_count: usize,
    pub lookup_failures: usize,
    pub clean: bool,
}

/// POST /imports request
///
/// Exactly one of `csv_path` and `entries` supplies the rows.
#[derive(Debug, Deserialize)]
pub struct StartImportRequest {
    pub csv_path: Option<PathBuf>,
    pub entries: Option<Vec<EntryRow>>,
    #[serde(default)]
    pub mapping_overrides: HashMap<String, String>,
    /// Manual type resolutions, raw CSV value to vocabulary id
    #[serde(default)]
    pub type_overrides: HashMap<String, String>,
    /// Type applied to rows that carry none
    pub default_file_type: Option<String>,
}

/// POST /imports response
#[derive(Debug, Serialize)]
pub struct StartImportResponse {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /imports/{run_id} response
#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub progress: RunProgress,
    pub row_counts: RowCounts,
    pub rows: Vec<ImportRow>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<BatchVerificationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// GET /imports/{run_id}/report response
#[derive(Debug, Serialize)]
pub struct RunReportResponse {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: Option<u64>,
    pub row_counts: RowCounts,
    pub rows: Vec<ImportRow>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<JobStatus>,
    pub job_counters: HashMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<BatchVerificationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// POST /imports/{run_id}/cancel response
#[derive(Debug, Serialize)]
pub struct CancelRunResponse {
    pub run_id: Uuid,
    /// Phase at the moment the cancel was requested
    pub phase: RunPhase,
    pub cancellation_requested: bool,
}

/// POST /imports/preview
///
/// Parses a CSV and reports what an import of it would look like:
/// suggested column mappings, their validation problems, and the file
/// type reconciliation for the mapped type column. Nothing is submitted.
pub async fn preview_import(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let csv = ingest(&request.csv_path, state.config.max_csv_bytes)?;
    let (vocabulary, mut warnings) = load_vocabulary(&state).await;

    let mut mappings = field_mapper::suggest_mappings(&csv, &vocabulary);
    warnings.extend(field_mapper::apply_overrides(
        &mut mappings,
        &request.mapping_overrides,
    ));
    let mapping_errors = field_mapper::validate_mappings(&mappings);
    let value_errors = field_mapper::validate_required_values(&csv, &mappings);

    let type_conversions = match field_mapper::find_column(&mappings, MappedField::FileType) {
        Some(column) => {
            type_reconciler::reconcile_types(&csv.distinct_values(column), &vocabulary)
        }
        None => Vec::new(),
    };

    Ok(Json(PreviewResponse {
        headers: csv.headers.clone(),
        row_count: csv.row_count(),
        mappings,
        mapping_errors,
        value_errors,
        type_conversions,
        warnings,
    }))
}

/// POST /imports/validate-rows
///
/// Manual-entry validation sweep: URL format checks, duplicate
/// detection across the whole list, and a batch existence check for
/// every unique asset id. Entries come back reordered with the rows
/// that need attention first.
pub async fn validate_rows(
    State(state): State<AppState>,
    Json(request): Json<ValidateRowsRequest>,
) -> ApiResult<Json<ValidateRowsResponse>> {
    if request.entries.is_empty() {
        return Err(ApiError::BadRequest("No entries to validate".to_string()));
    }

    let mut entries = request.entries;
    let ids: Vec<String> = entries.iter().map(|e| e.asset_id.clone()).collect();
    let lookups = asset_validator::validate_assets(&state.client, &ids).await;
    let outcome = row_state::apply_validation(&mut entries, &lookups);

    Ok(Json(ValidateRowsResponse {
        entries,
        clean: outcome.is_clean(),
        messages: outcome.messages,
        invalid_count: outcome.invalid_count,
        duplicate_count: outcome.duplicate_count,
        lookup_failures: outcome.lookup_failures,
    }))
}

/// POST /imports
///
/// Validates the input, creates the run, and spawns the background
/// orchestrator task. Returns 202 with the run id; progress is
/// available via GET /imports/{run_id}.
pub async fn start_import(
    State(state): State<AppState>,
    Json(request): Json<StartImportRequest>,
) -> ApiResult<(StatusCode, Json<StartImportResponse>)> {
    let (rows, warnings) = match (&request.csv_path, request.entries) {
        (Some(csv_path), None) => {
            rows_from_csv(&state, csv_path, &request.mapping_overrides, &request.type_overrides)
                .await?
        }
        (None, Some(entries)) => (rows_from_entries(entries)?, Vec::new()),
        _ => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of csv_path or entries".to_string(),
            ))
        }
    };

    let mut run = ImportRun::new(rows);
    for warning in warnings {
        run.add_warning(warning);
    }

    let run_id = run.run_id;
    let response = StartImportResponse {
        run_id,
        phase: run.phase,
        started_at: run.started_at,
    };

    let cancel = CancellationToken::new();
    state.runs.write().await.insert(run_id, run.clone());
    state
        .cancellation_tokens
        .write()
        .await
        .insert(run_id, cancel.clone());

    tracing::info!(run_id = %run_id, rows = run.rows.len(), "Import run accepted");

    let orchestrator = BatchOrchestrator::new(
        state.client.clone(),
        state.event_bus.clone(),
        state.runs.clone(),
        JobMonitor::new(state.config.poll_interval(), state.config.poll_timeout()),
        state.config.import_job_id.clone(),
    );
    let tokens = state.cancellation_tokens.clone();
    let default_file_type = request.default_file_type;
    tokio::spawn(async move {
        let final_run = orchestrator.execute(run, default_file_type, cancel).await;
        tracing::info!(
            run_id = %run_id,
            phase = %final_run.phase,
            "Import run task finished"
        );
        tokens.write().await.remove(&run_id);
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /imports/{run_id}
pub async fn get_run_status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunStatusResponse>> {
    let run = load_run(&state, run_id).await?;

    Ok(Json(RunStatusResponse {
        run_id: run.run_id,
        phase: run.phase,
        progress: run.progress.clone(),
        row_counts: run.row_counts(),
        rows: run.rows,
        warnings: run.warnings,
        set_id: run.set_id,
        job_id: run.job_id,
        job_instance_id: run.job_instance_id,
        job_status: run.job_status,
        verification: run.verification,
        error_message: run.error_message,
    }))
}

/// GET /imports/{run_id}/report
///
/// Full report for a finished run. 409 while the run is still going.
pub async fn get_run_report(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunReportResponse>> {
    let run = load_run(&state, run_id).await?;
    if !run.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Run {} has not finished (phase {})",
            run_id, run.phase
        )));
    }

    Ok(Json(RunReportResponse {
        run_id: run.run_id,
        phase: run.phase,
        started_at: run.started_at,
        ended_at: run.ended_at,
        duration_seconds: run.duration_seconds(),
        row_counts: run.row_counts(),
        rows: run.rows,
        warnings: run.warnings,
        job_status: run.job_status,
        job_counters: run.job_counters,
        verification: run.verification,
        error_message: run.error_message,
    }))
}

/// GET /imports/{run_id}/export/mms-ids
pub async fn export_mms_ids(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let run = load_run(&state, run_id).await?;
    let body = reports::mms_ids_csv(&run.rows)?;
    Ok(csv_response("mms-ids.csv", body))
}

/// GET /imports/{run_id}/export/entries
pub async fn export_entries(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let run = load_run(&state, run_id).await?;
    let body = reports::entries_csv(&run.rows)?;
    Ok(csv_response("entries.csv", body))
}

/// GET /imports/{run_id}/export/report
///
/// Per-asset verification report. 409 until verification has run.
pub async fn export_verification_report(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let run = load_run(&state, run_id).await?;
    let Some(summary) = &run.verification else {
        return Err(ApiError::Conflict(format!(
            "Run {} has no verification results yet",
            run_id
        )));
    };
    let body = reports::verification_report_csv(summary)?;
    Ok(csv_response("verification-report.csv", body))
}

/// POST /imports/{run_id}/cancel
///
/// Cooperative cancel: the token is fired and the background task
/// finalizes the run between phases. In-flight submissions are never
/// aborted mid-call.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<CancelRunResponse>> {
    let run = load_run(&state, run_id).await?;
    if run.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Run {} already finished (phase {})",
            run_id, run.phase
        )));
    }

    let tokens = state.cancellation_tokens.read().await;
    let cancellation_requested = match tokens.get(&run_id) {
        Some(token) => {
            token.cancel();
            true
        }
        // The task finished between the status read and here
        None => false,
    };

    tracing::info!(run_id = %run_id, cancellation_requested, "Cancel requested");

    Ok(Json(CancelRunResponse {
        run_id,
        phase: run.phase,
        cancellation_requested,
    }))
}

/// Builds import rows from a CSV, failing fast on input errors.
///
/// Returns the rows plus warnings worth keeping on the run (vocabulary
/// fallback, ignored overrides).
async fn rows_from_csv(
    state: &AppState,
    csv_path: &std::path::Path,
    mapping_overrides: &HashMap<String, String>,
    type_overrides: &HashMap<String, String>,
) -> ApiResult<(Vec<ImportRow>, Vec<String>)> {
    let csv = ingest(csv_path, state.config.max_csv_bytes)?;
    let (vocabulary, mut warnings) = load_vocabulary(state).await;

    let mut mappings = field_mapper::suggest_mappings(&csv, &vocabulary);
    warnings.extend(field_mapper::apply_overrides(&mut mappings, mapping_overrides));

    let mapping_errors = field_mapper::validate_mappings(&mappings);
    if !mapping_errors.is_empty() {
        return Err(ApiError::BadRequest(mapping_errors.join("; ")));
    }
    let value_errors = field_mapper::validate_required_values(&csv, &mappings);
    if !value_errors.is_empty() {
        return Err(ApiError::BadRequest(value_errors.join("; ")));
    }

    let mut rows = field_mapper::extract_rows(&csv, &mappings);

    let raw_types: Vec<String> = rows.iter().filter_map(|r| r.file_type.clone()).collect();
    let mut conversions = type_reconciler::reconcile_types(&raw_types, &vocabulary);
    for (csv_value, selected_id) in type_overrides {
        if !type_reconciler::apply_manual_override(
            &mut conversions,
            csv_value,
            selected_id,
            &vocabulary,
        ) {
            warnings.push(format!(
                "Type override ignored: '{}' -> '{}' did not match a value and vocabulary entry",
                csv_value, selected_id
            ));
        }
    }
    let unresolved = type_reconciler::unresolved_values(&conversions);
    if !unresolved.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Unrecognized file type value(s): {}; map them via type_overrides",
            unresolved.join(", ")
        )));
    }
    type_reconciler::apply_conversions(&mut rows, &conversions);

    Ok((rows, warnings))
}

/// Builds import rows from manual entries, rejecting duplicates and
/// malformed URLs up front.
fn rows_from_entries(mut entries: Vec<EntryRow>) -> ApiResult<Vec<ImportRow>> {
    if entries.is_empty() {
        return Err(ApiError::BadRequest("No entries to import".to_string()));
    }

    row_state::detect_duplicates(&mut entries, &HashSet::new());
    if entries.iter().any(|e| e.state == EntryRowState::Duplicate) {
        return Err(ApiError::BadRequest(DUPLICATES_MESSAGE.to_string()));
    }

    if let Some(entry) = entries
        .iter()
        .find(|e| !e.remote_url.trim().is_empty() && !row_state::is_valid_url(&e.remote_url))
    {
        return Err(ApiError::BadRequest(format!(
            "{} ({})",
            URL_FORMAT_MESSAGE,
            entry.remote_url.trim()
        )));
    }

    Ok(entries.iter().map(EntryRow::to_import_row).collect())
}

fn ingest(path: &std::path::Path, max_bytes: u64) -> ApiResult<ParsedCsv> {
    csv_ingestor::ingest_file(path, max_bytes).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Remote vocabulary, or the built-in fallback plus a warning when the
/// fetch fails or comes back empty
async fn load_vocabulary(state: &AppState) -> (Vec<FileTypeOption>, Vec<String>) {
    match state.client.fetch_type_vocabulary().await {
        Ok(options) if !options.is_empty() => (options, Vec::new()),
        Ok(_) => (
            fallback_type_options(),
            vec!["Remote type vocabulary is empty; using the built-in fallback".to_string()],
        ),
        Err(e) => (
            fallback_type_options(),
            vec![format!(
                "Could not fetch the type vocabulary: {}; using the built-in fallback",
                e
            )],
        ),
    }
}

async fn load_run(state: &AppState, run_id: Uuid) -> ApiResult<ImportRun> {
    state
        .runs
        .read()
        .await
        .get(&run_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Import run not found: {}", run_id)))
}

fn csv_response(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

/// Build import pipeline routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/imports/preview", post(preview_import))
        .route("/imports/validate-rows", post(validate_rows))
        .route("/imports", post(start_import))
        .route("/imports/:run_id", get(get_run_status))
        .route("/imports/:run_id/report", get(get_run_report))
        .route("/imports/:run_id/export/mms-ids", get(export_mms_ids))
        .route("/imports/:run_id/export/entries", get(export_entries))
        .route(
            "/imports/:run_id/export/report",
            get(export_verification_report),
        )
        .route("/imports/:run_id/cancel", post(cancel_run))
}
