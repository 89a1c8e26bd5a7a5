//! Column-to-field mapping heuristics
//!
//! Guesses which semantic field each CSV column carries by testing the
//! normalized header text against ordered pattern sets, falling back
//! to sample values for URL and file type detection.

use crate::models::{ColumnMapping, FileTypeOption, ImportRow, MappedField};
use crate::services::csv_ingestor::ParsedCsv;
use std::collections::HashMap;

const ID_PATTERNS: [&str; 5] = ["mms", "mmsid", "id", "assetid", "recordid"];
const URL_PATTERNS: [&str; 5] = ["url", "link", "href", "uri", "remoteurl"];
const TITLE_PATTERNS: [&str; 4] = ["title", "name", "filename", "filetitle"];
const DESCRIPTION_PATTERNS: [&str; 4] = ["desc", "description", "summary", "abstract"];
const TYPE_PATTERNS: [&str; 5] = ["type", "format", "extension", "filetype", "mimetype"];

/// Maximum row numbers listed in a missing-value message
const MAX_LISTED_ROWS: usize = 10;

/// Suggests a field mapping for every CSV column.
///
/// The vocabulary is consulted so a column whose sample value matches
/// a known type code is recognized as a file type column even when the
/// header gives nothing away.
pub fn suggest_mappings(csv: &ParsedCsv, vocabulary: &[FileTypeOption]) -> Vec<ColumnMapping> {
    csv.headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let sample = csv.sample_value(index);
            let (mapped_field, confidence) = suggest_field(header, sample, vocabulary);
            ColumnMapping {
                csv_header: header.clone(),
                sample_value: sample.to_string(),
                mapped_field,
                confidence,
            }
        })
        .collect()
}

fn suggest_field(
    header: &str,
    sample: &str,
    vocabulary: &[FileTypeOption],
) -> (MappedField, f64) {
    let normalized = normalize_header(header);
    let lower_sample = sample.to_lowercase();

    if matches_pattern(&normalized, &ID_PATTERNS) {
        return (MappedField::AssetId, 0.9);
    }

    if matches_pattern(&normalized, &URL_PATTERNS) || lower_sample.contains("http") {
        return (MappedField::RemoteUrl, 0.8);
    }

    if matches_pattern(&normalized, &TITLE_PATTERNS) {
        return (MappedField::FileTitle, 0.8);
    }

    if matches_pattern(&normalized, &DESCRIPTION_PATTERNS) {
        return (MappedField::FileDescription, 0.7);
    }

    let sample_is_known_code = vocabulary.iter().any(|option| {
        let code = option.target_code.to_lowercase();
        !code.is_empty() && lower_sample.contains(&code)
    });
    if matches_pattern(&normalized, &TYPE_PATTERNS) || sample_is_known_code {
        return (MappedField::FileType, 0.8);
    }

    (MappedField::Ignore, 0.1)
}

fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn matches_pattern(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| text.contains(pattern))
}

/// Checks a mapping for missing required fields and duplicate
/// assignments. Returns the collected problems rather than failing on
/// the first, so re-running after a manual remap is side-effect-free.
pub fn validate_mappings(mappings: &[ColumnMapping]) -> Vec<String> {
    let mut errors = Vec::new();

    let fields: Vec<MappedField> = mappings.iter().map(|m| m.mapped_field).collect();

    if !fields.contains(&MappedField::AssetId) {
        errors.push(format!(
            "A column mapped to {} is required",
            MappedField::AssetId.display_name()
        ));
    }
    if !fields.contains(&MappedField::RemoteUrl) {
        errors.push(format!(
            "A column mapped to {} is required",
            MappedField::RemoteUrl.display_name()
        ));
    }

    let mut duplicated = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        if *field == MappedField::Ignore {
            continue;
        }
        let first = fields.iter().position(|f| f == field);
        if first != Some(index) && !duplicated.contains(field) {
            duplicated.push(*field);
        }
    }
    if !duplicated.is_empty() {
        let names: Vec<&str> = duplicated.iter().map(|f| f.display_name()).collect();
        errors.push(format!(
            "Multiple columns are mapped to the same field: {}",
            names.join(", ")
        ));
    }

    errors
}

/// Applies caller-supplied mapping overrides keyed by CSV header.
///
/// Returns a warning per override that named an unknown column or an
/// unrecognized field; valid overrides get confidence 1.0.
pub fn apply_overrides(
    mappings: &mut [ColumnMapping],
    overrides: &HashMap<String, String>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    for (header, field_name) in overrides {
        let Some(mapping) = mappings
            .iter_mut()
            .find(|m| m.csv_header.eq_ignore_ascii_case(header.trim()))
        else {
            warnings.push(format!(
                "Mapping override ignored: no column named '{}'",
                header
            ));
            continue;
        };

        match MappedField::parse(field_name) {
            Some(field) => {
                mapping.mapped_field = field;
                mapping.confidence = 1.0;
            }
            None => warnings.push(format!(
                "Mapping override ignored: unrecognized field '{}'",
                field_name
            )),
        }
    }

    warnings
}

/// Index of the first column mapped to the given field
pub fn find_column(mappings: &[ColumnMapping], field: MappedField) -> Option<usize> {
    mappings.iter().position(|m| m.mapped_field == field)
}

/// Converts parsed CSV rows into import rows using the mapping.
///
/// Cells are trimmed; blank optional fields become `None`.
pub fn extract_rows(csv: &ParsedCsv, mappings: &[ColumnMapping]) -> Vec<ImportRow> {
    let id_col = find_column(mappings, MappedField::AssetId);
    let url_col = find_column(mappings, MappedField::RemoteUrl);
    let title_col = find_column(mappings, MappedField::FileTitle);
    let description_col = find_column(mappings, MappedField::FileDescription);
    let type_col = find_column(mappings, MappedField::FileType);

    csv.rows
        .iter()
        .map(|row| {
            let cell = |col: Option<usize>| -> String {
                col.and_then(|c| row.get(c))
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default()
            };
            let optional = |col: Option<usize>| -> Option<String> {
                Some(cell(col)).filter(|v| !v.is_empty())
            };

            let mut import_row = ImportRow::new(cell(id_col), cell(url_col));
            import_row.file_title = optional(title_col);
            import_row.file_description = optional(description_col);
            import_row.file_type = optional(type_col);
            import_row
        })
        .collect()
}

/// Checks that every row carries a value for each required field.
///
/// Row numbers in the messages are 1-based and account for the header
/// row, so they match what the librarian sees in a spreadsheet.
pub fn validate_required_values(csv: &ParsedCsv, mappings: &[ColumnMapping]) -> Vec<String> {
    let mut messages = Vec::new();

    for field in [MappedField::AssetId, MappedField::RemoteUrl] {
        let label = field.display_name();
        let Some(col) = find_column(mappings, field) else {
            messages.push(format!("A column mapped to {} is required", label));
            continue;
        };

        let missing: Vec<usize> = csv
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(col).map(|c| c.trim().is_empty()).unwrap_or(true))
            .map(|(index, _)| index + 2)
            .collect();

        if missing.is_empty() {
            continue;
        }

        let listed: Vec<String> = missing
            .iter()
            .take(MAX_LISTED_ROWS)
            .map(usize::to_string)
            .collect();
        let mut message = format!(
            "{} is missing in {} row(s): {}",
            label,
            missing.len(),
            listed.join(", ")
        );
        if missing.len() > MAX_LISTED_ROWS {
            message.push_str(&format!(" and {} more", missing.len() - MAX_LISTED_ROWS));
        }
        messages.push(message);
    }

    messages
}
