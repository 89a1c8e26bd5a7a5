//! File type vocabulary and asset categories

use serde::{Deserialize, Serialize};

/// Where a vocabulary entry may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeApplicability {
    File,
    Link,
    Both,
}

impl TypeApplicability {
    /// Parse the remote applicability code; anything unrecognized (or
    /// absent) is treated as usable in both contexts.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "file" => TypeApplicability::File,
            "link" => TypeApplicability::Link,
            _ => TypeApplicability::Both,
        }
    }
}

/// One row of the remote file-and-link type vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeOption {
    /// Vocabulary identifier submitted back to the API
    pub id: String,
    /// Display/target code (e.g. "Accepted")
    pub target_code: String,
    /// Whether the type applies to files, links, or both
    pub applicability: TypeApplicability,
    /// Comma-separated asset category codes; empty means universal
    pub applicable_asset_types: String,
}

/// Reconciliation outcome for one distinct raw type value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeConversion {
    /// Raw value as it appeared in the CSV
    pub csv_value: String,
    /// Matched vocabulary id, when resolved
    pub matched_id: Option<String>,
    /// Matched target code, when resolved
    pub matched_target_code: Option<String>,
    /// Match confidence: 1.0 exact id, 0.95 exact code, 0.9 manual,
    /// 0.7 substring, 0.0 unmatched
    pub confidence: f64,
    /// True until a match is found or a manual override is applied
    pub requires_manual_mapping: bool,
}

/// Known asset category codes, used to interpret resource types
pub const ASSET_CATEGORIES: [&str; 12] = [
    "conference",
    "creativeWork",
    "dataset",
    "etd",
    "etdexternal",
    "interactiveResource",
    "other",
    "patent",
    "postedContent",
    "publication",
    "software",
    "teaching",
];

/// Derive the category code from a full resource type
/// (e.g. "publication.journalArticle" yields "publication").
///
/// Returns an empty string for unrecognized values, which callers treat
/// as "no category filter".
pub fn extract_category(resource_type: &str) -> String {
    let trimmed = resource_type.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some((prefix, _)) = trimmed.split_once('.') {
        if ASSET_CATEGORIES.iter().any(|c| c.eq_ignore_ascii_case(prefix)) {
            return prefix.to_string();
        }
    }
    if ASSET_CATEGORIES.iter().any(|c| c.eq_ignore_ascii_case(trimmed)) {
        return trimmed.to_string();
    }
    String::new()
}

/// Built-in vocabulary used when the remote fetch fails
pub fn fallback_type_options() -> Vec<FileTypeOption> {
    [
        ("accepted", "Accepted"),
        ("submitted", "Submitted"),
        ("supplementary", "Supplementary"),
        ("administrative", "Administrative"),
    ]
    .into_iter()
    .map(|(id, code)| FileTypeOption {
        id: id.to_string(),
        target_code: code.to_string(),
        applicability: TypeApplicability::Both,
        applicable_asset_types: String::new(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applicability_from_code() {
        assert_eq!(TypeApplicability::from_code("file"), TypeApplicability::File);
        assert_eq!(TypeApplicability::from_code(" LINK "), TypeApplicability::Link);
        assert_eq!(TypeApplicability::from_code("both"), TypeApplicability::Both);
        assert_eq!(TypeApplicability::from_code(""), TypeApplicability::Both);
        assert_eq!(TypeApplicability::from_code("weird"), TypeApplicability::Both);
    }

    #[test]
    fn test_extract_category_from_dotted_type() {
        assert_eq!(extract_category("publication.journalArticle"), "publication");
        assert_eq!(extract_category("etd.doctoral"), "etd");
    }

    #[test]
    fn test_extract_category_from_bare_code() {
        assert_eq!(extract_category("dataset"), "dataset");
        assert_eq!(extract_category("  software  "), "software");
    }

    #[test]
    fn test_extract_category_unknown_is_empty() {
        assert_eq!(extract_category("journalArticle.publication"), "");
        assert_eq!(extract_category("unknownThing"), "");
        assert_eq!(extract_category(""), "");
    }

    #[test]
    fn test_fallback_vocabulary_shape() {
        let options = fallback_type_options();
        assert_eq!(options.len(), 4);
        assert!(options.iter().all(|o| o.applicability == TypeApplicability::Both));
        assert!(options.iter().all(|o| o.applicable_asset_types.is_empty()));
        assert_eq!(options[0].id, "accepted");
        assert_eq!(options[0].target_code, "Accepted");
    }
}
