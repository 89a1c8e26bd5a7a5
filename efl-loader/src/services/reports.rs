//! CSV export rendering
//!
//! Renders the downloadable artifacts a run produces: the MMS-ID list
//! of successfully processed assets, the per-row entries export, and
//! the per-asset verification report. Every cell is quoted so the
//! files open cleanly in spreadsheet tools regardless of content.

use crate::models::{BatchVerificationSummary, ImportRow, RowStatus};
use efl_common::{Error, Result};
use std::collections::HashSet;

const ENTRY_HEADERS: [&str; 6] = [
    "Asset ID",
    "File URL",
    "File Title",
    "Description",
    "File Type",
    "Supplemental",
];

const REPORT_HEADERS: [&str; 7] = [
    "Asset ID",
    "Status",
    "Files Before",
    "Files After",
    "Files Added",
    "Files Expected",
    "Warnings",
];

fn quoted_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new())
}

fn write_error(e: csv::Error) -> Error {
    Error::Internal(format!("CSV export failed: {}", e))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV export failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Internal(format!("CSV export produced invalid UTF-8: {}", e)))
}

/// MMS-ID list: one row per successfully processed asset, in first
/// occurrence order
pub fn mms_ids_csv(rows: &[ImportRow]) -> Result<String> {
    let mut writer = quoted_writer();
    writer.write_record(["MMS ID"]).map_err(write_error)?;

    let mut seen = HashSet::new();
    for row in rows {
        if row.status == RowStatus::Success && seen.insert(row.asset_id.clone()) {
            writer.write_record([&row.asset_id]).map_err(write_error)?;
        }
    }

    finish(writer)
}

/// Entries export: one row per import row, whatever its status
pub fn entries_csv(rows: &[ImportRow]) -> Result<String> {
    let mut writer = quoted_writer();
    writer.write_record(ENTRY_HEADERS).map_err(write_error)?;

    for row in rows {
        let supplemental = if row.supplemental { "Yes" } else { "No" };
        writer
            .write_record([
                row.asset_id.as_str(),
                row.remote_url.as_str(),
                row.file_title.as_deref().unwrap_or(""),
                row.file_description.as_deref().unwrap_or(""),
                row.file_type.as_deref().unwrap_or(""),
                supplemental,
            ])
            .map_err(write_error)?;
    }

    finish(writer)
}

/// Verification report: one row per verified asset with its before and
/// after counts and any warnings
pub fn verification_report_csv(summary: &BatchVerificationSummary) -> Result<String> {
    let mut writer = quoted_writer();
    writer.write_record(REPORT_HEADERS).map_err(write_error)?;

    for result in &summary.results {
        let before = result.files_before_count.to_string();
        let after = result.files_after_count.to_string();
        let added = result.files_added.to_string();
        let expected = result.files_expected.to_string();
        let warnings = result.warnings.join("; ");
        writer
            .write_record([
                result.asset_id.as_str(),
                result.status.as_str(),
                before.as_str(),
                after.as_str(),
                added.as_str(),
                expected.as_str(),
                warnings.as_str(),
            ])
            .map_err(write_error)?;
    }

    finish(writer)
}
