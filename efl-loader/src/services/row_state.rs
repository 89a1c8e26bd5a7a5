//! Manual entry row state machine
//!
//! Pure state computation for the manual-entry path: base state from
//! the last known validation map, duplicate detection across rows, and
//! the post-validation sweep that flags bad ids and reorders them to
//! the front of the list.

use crate::models::{AssetLookup, EntryRow, EntryRowState};
use crate::services::asset_validator::failure_message;
use std::collections::{HashMap, HashSet};

pub const INVALID_IDS_MESSAGE: &str =
    "Some asset IDs could not be validated. They have been moved to the top for correction.";
pub const DUPLICATES_MESSAGE: &str =
    "Duplicate asset ID and URL combinations detected. Please ensure each entry is unique before continuing.";
pub const API_ERRORS_MESSAGE: &str =
    "One or more assets could not be validated due to API errors. Please try again.";
pub const URL_FORMAT_MESSAGE: &str = "File URL must start with http:// or https://";

/// Outcome of a validation sweep over the row list
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// User-facing messages, worst problems first
    pub messages: Vec<String>,
    pub invalid_count: usize,
    pub duplicate_count: usize,
    /// Lookups that failed for transport reasons rather than a 404
    pub lookup_failures: usize,
}

impl ValidationOutcome {
    pub fn is_clean(&self) -> bool {
        self.invalid_count == 0 && self.duplicate_count == 0 && self.lookup_failures == 0
    }
}

/// True when the URL uses an http or https scheme
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    url.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("http://"))
        || url.get(..8).is_some_and(|p| p.eq_ignore_ascii_case("https://"))
}

/// State of a row considering only its own fields and the set of ids
/// already known to exist
pub fn compute_base_state(row: &EntryRow, known_ids: &HashSet<String>) -> EntryRowState {
    let id = row.asset_id.trim();
    if id.is_empty() {
        EntryRowState::Pending
    } else if known_ids.contains(id) {
        EntryRowState::ValidatedExisting
    } else {
        EntryRowState::PendingNew
    }
}

/// Re-runs duplicate detection across the whole list.
///
/// Rows previously marked duplicate fall back to their base state
/// before groups are recomputed, so resolving one conflict clears the
/// flags on the surviving row. Rows missing an id or URL never take
/// part in detection.
pub fn detect_duplicates(rows: &mut [EntryRow], known_ids: &HashSet<String>) {
    for row in rows.iter_mut() {
        row.asset_id_duplicate = false;
        row.url_duplicate = false;
        if row.state == EntryRowState::Duplicate {
            let base = compute_base_state(row, known_ids);
            row.state = base;
        }
    }

    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        if row.asset_id.trim().is_empty() || row.remote_url.trim().is_empty() {
            continue;
        }
        groups.entry(row.duplicate_key()).or_default().push(index);
    }

    for indices in groups.values().filter(|indices| indices.len() >= 2) {
        for &index in indices {
            let row = &mut rows[index];
            row.state = EntryRowState::Duplicate;
            row.asset_id_duplicate = true;
            row.url_duplicate = true;
        }
    }
}

/// Applies the result of a batch id validation to the rows.
///
/// Rows whose id did not resolve are marked invalid and moved to the
/// front, followed by duplicate rows, then everything else in their
/// original order.
pub fn apply_validation(
    rows: &mut Vec<EntryRow>,
    lookups: &HashMap<String, AssetLookup>,
) -> ValidationOutcome {
    let known_ids: HashSet<String> = lookups
        .iter()
        .filter(|(_, lookup)| lookup.is_found())
        .map(|(id, _)| id.clone())
        .collect();
    let lookup_failures = lookups
        .values()
        .filter(|lookup| matches!(lookup, AssetLookup::Failed(_)))
        .count();

    detect_duplicates(rows, &known_ids);

    for row in rows.iter_mut() {
        row.error_message = None;

        let url = row.remote_url.trim();
        if !url.is_empty() && !is_valid_url(url) {
            row.error_message = Some(URL_FORMAT_MESSAGE.to_string());
        }

        let id = row.asset_id.trim().to_string();
        if id.is_empty() {
            if row.state != EntryRowState::Duplicate {
                row.state = EntryRowState::Pending;
            }
            continue;
        }

        match lookups.get(&id) {
            Some(AssetLookup::Found(_)) => {
                if row.state != EntryRowState::Duplicate
                    && row.state != EntryRowState::ValidatedExisting
                {
                    row.state = EntryRowState::Valid;
                }
            }
            Some(lookup) => {
                // a bad id outranks a duplicate conflict
                row.state = EntryRowState::Invalid;
                row.error_message = Some(failure_message(&id, lookup));
            }
            None => {
                row.state = EntryRowState::Invalid;
                row.error_message = Some(format!("Asset {} not found", id));
            }
        }
    }

    let invalid_count = rows
        .iter()
        .filter(|row| row.state == EntryRowState::Invalid)
        .count();
    let duplicate_count = rows
        .iter()
        .filter(|row| row.state == EntryRowState::Duplicate)
        .count();

    reorder_rows(rows);

    let mut messages = Vec::new();
    if invalid_count > 0 {
        messages.push(INVALID_IDS_MESSAGE.to_string());
    }
    if duplicate_count > 0 {
        messages.push(DUPLICATES_MESSAGE.to_string());
    }
    if lookup_failures > 0 {
        messages.push(API_ERRORS_MESSAGE.to_string());
    }

    ValidationOutcome {
        messages,
        invalid_count,
        duplicate_count,
        lookup_failures,
    }
}

/// Stable partition: invalid rows first, duplicate rows next, the rest
/// in their original order
pub fn reorder_rows(rows: &mut Vec<EntryRow>) {
    let mut invalid = Vec::new();
    let mut duplicates = Vec::new();
    let mut rest = Vec::new();

    for row in rows.drain(..) {
        match row.state {
            EntryRowState::Invalid => invalid.push(row),
            EntryRowState::Duplicate => duplicates.push(row),
            _ => rest.push(row),
        }
    }

    rows.extend(invalid);
    rows.extend(duplicates);
    rows.extend(rest);
}
