//! File type reconciliation
//!
//! Classifies the raw file type strings found in an upload against the
//! remote type vocabulary, so close-but-not-exact values ("Accepted
//! version" vs the id "accepted") can be converted automatically and
//! only genuinely unknown values need a manual decision.

use crate::models::{
    extract_category, FileTypeConversion, FileTypeOption, ImportRow, TypeApplicability,
};
use std::collections::HashMap;

/// Classifies each distinct raw value against the vocabulary and sorts
/// the results with resolved entries first, then alphabetically.
pub fn reconcile_types(
    raw_values: &[String],
    vocabulary: &[FileTypeOption],
) -> Vec<FileTypeConversion> {
    let mut seen = std::collections::HashSet::new();
    let mut conversions: Vec<FileTypeConversion> = raw_values
        .iter()
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty() && seen.insert(raw.to_string()))
        .map(|raw| classify_value(raw, vocabulary))
        .collect();

    conversions.sort_by(|a, b| {
        a.requires_manual_mapping
            .cmp(&b.requires_manual_mapping)
            .then_with(|| a.csv_value.cmp(&b.csv_value))
    });

    conversions
}

/// Classifies one raw value.
///
/// Exact id matches are case-sensitive; target code matches are not.
/// The partial match accepts a substring relation in either direction.
pub fn classify_value(raw: &str, vocabulary: &[FileTypeOption]) -> FileTypeConversion {
    let csv_value = raw.trim().to_string();

    if let Some(option) = vocabulary.iter().find(|o| o.id == csv_value) {
        return FileTypeConversion {
            csv_value,
            matched_id: Some(option.id.clone()),
            matched_target_code: Some(option.target_code.clone()),
            confidence: 1.0,
            requires_manual_mapping: false,
        };
    }

    let normalized = csv_value.to_lowercase();

    if let Some(option) = vocabulary
        .iter()
        .find(|o| o.target_code.to_lowercase() == normalized)
    {
        return FileTypeConversion {
            csv_value,
            matched_id: Some(option.id.clone()),
            matched_target_code: Some(option.target_code.clone()),
            confidence: 0.95,
            requires_manual_mapping: false,
        };
    }

    if let Some(option) = vocabulary.iter().find(|o| {
        let code = o.target_code.to_lowercase();
        !code.is_empty() && (code.contains(&normalized) || normalized.contains(&code))
    }) {
        return FileTypeConversion {
            csv_value,
            matched_id: Some(option.id.clone()),
            matched_target_code: Some(option.target_code.clone()),
            confidence: 0.7,
            requires_manual_mapping: false,
        };
    }

    FileTypeConversion {
        csv_value,
        matched_id: None,
        matched_target_code: None,
        confidence: 0.0,
        requires_manual_mapping: true,
    }
}

/// Applies a manual type selection to the matching conversion.
///
/// Returns false when the selected id is not in the vocabulary or no
/// conversion carries the given raw value.
pub fn apply_manual_override(
    conversions: &mut [FileTypeConversion],
    csv_value: &str,
    selected_id: &str,
    vocabulary: &[FileTypeOption],
) -> bool {
    let Some(option) = vocabulary.iter().find(|o| o.id == selected_id) else {
        return false;
    };
    let Some(conversion) = conversions.iter_mut().find(|c| c.csv_value == csv_value) else {
        return false;
    };

    conversion.matched_id = Some(option.id.clone());
    conversion.matched_target_code = Some(option.target_code.clone());
    conversion.confidence = 0.9;
    conversion.requires_manual_mapping = false;
    true
}

/// True when any value needs attention before processing, either
/// because it is unmatched or was matched below full confidence
pub fn has_invalid_types(conversions: &[FileTypeConversion]) -> bool {
    conversions
        .iter()
        .any(|c| c.requires_manual_mapping || c.confidence < 1.0)
}

/// True when every value resolved without a manual decision
pub fn auto_convertible(conversions: &[FileTypeConversion]) -> bool {
    conversions.iter().all(|c| !c.requires_manual_mapping)
}

/// Raw values still waiting on a manual mapping
pub fn unresolved_values(conversions: &[FileTypeConversion]) -> Vec<String> {
    conversions
        .iter()
        .filter(|c| c.requires_manual_mapping && c.matched_id.is_none())
        .map(|c| c.csv_value.clone())
        .collect()
}

/// Raw value to matched vocabulary id, for resolved conversions only
pub fn conversion_map(conversions: &[FileTypeConversion]) -> HashMap<String, String> {
    conversions
        .iter()
        .filter_map(|c| {
            c.matched_id
                .as_ref()
                .map(|id| (c.csv_value.clone(), id.clone()))
        })
        .collect()
}

/// Rewrites row file types through the conversion map, leaving values
/// without a resolved conversion untouched
pub fn apply_conversions(rows: &mut [ImportRow], conversions: &[FileTypeConversion]) {
    let map = conversion_map(conversions);
    for row in rows {
        if let Some(value) = &row.file_type {
            if let Some(id) = map.get(value.trim()) {
                row.file_type = Some(id.clone());
            }
        }
    }
}

/// Restricts the vocabulary to options usable for the given asset
/// category and applicability.
///
/// An option with an empty `applicable_asset_types` list applies to
/// every category; otherwise the category must appear in its
/// comma-separated list.
pub fn filter_options<'a>(
    vocabulary: &'a [FileTypeOption],
    asset_category: &str,
    wanted: TypeApplicability,
) -> Vec<&'a FileTypeOption> {
    vocabulary
        .iter()
        .filter(|option| {
            let applicability_ok = option.applicability == TypeApplicability::Both
                || option.applicability == wanted;
            if !applicability_ok {
                return false;
            }

            let list = option.applicable_asset_types.trim();
            if list.is_empty() {
                return true;
            }
            list.split(',')
                .map(str::trim)
                .any(|code| code.eq_ignore_ascii_case(asset_category))
        })
        .collect()
}

/// Picks the default file type for an asset: the first vocabulary
/// option applicable to both files and links for the asset's category.
pub fn default_type_for(vocabulary: &[FileTypeOption], asset_type: &str) -> Option<String> {
    let category = extract_category(asset_type);
    filter_options(vocabulary, &category, TypeApplicability::Both)
        .first()
        .map(|option| option.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(
        id: &str,
        target_code: &str,
        applicability: TypeApplicability,
        categories: &str,
    ) -> FileTypeOption {
        FileTypeOption {
            id: id.to_string(),
            target_code: target_code.to_string(),
            applicability,
            applicable_asset_types: categories.to_string(),
        }
    }

    fn vocabulary() -> Vec<FileTypeOption> {
        vec![
            option("accepted", "Accepted version", TypeApplicability::Both, ""),
            option("submitted", "Submitted version", TypeApplicability::File, ""),
            option(
                "readme",
                "README",
                TypeApplicability::File,
                "dataset, software",
            ),
        ]
    }

    #[test]
    fn test_exact_id_match() {
        let conversion = classify_value("accepted", &vocabulary());
        assert_eq!(conversion.matched_id.as_deref(), Some("accepted"));
        assert_eq!(conversion.confidence, 1.0);
        assert!(!conversion.requires_manual_mapping);
    }

    #[test]
    fn test_id_match_is_case_sensitive() {
        // "ACCEPTED" misses the id but hits the target code partial
        let conversion = classify_value("ACCEPTED", &vocabulary());
        assert_eq!(conversion.confidence, 0.7);
        assert_eq!(conversion.matched_id.as_deref(), Some("accepted"));
    }

    #[test]
    fn test_target_code_match_is_case_insensitive() {
        let conversion = classify_value("submitted VERSION", &vocabulary());
        assert_eq!(conversion.matched_id.as_deref(), Some("submitted"));
        assert_eq!(conversion.confidence, 0.95);
    }

    #[test]
    fn test_partial_match_either_direction() {
        let shorter = classify_value("readme file", &vocabulary());
        assert_eq!(shorter.matched_id.as_deref(), Some("readme"));
        assert_eq!(shorter.confidence, 0.7);

        let longer = classify_value("accepted ver", &vocabulary());
        assert_eq!(longer.matched_id.as_deref(), Some("accepted"));
        assert_eq!(longer.confidence, 0.7);
    }

    #[test]
    fn test_unmatched_requires_manual_mapping() {
        let conversion = classify_value("mystery", &vocabulary());
        assert!(conversion.requires_manual_mapping);
        assert_eq!(conversion.confidence, 0.0);
        assert_eq!(conversion.matched_id, None);
    }

    #[test]
    fn test_reconcile_sorts_resolved_first() {
        let values = vec![
            "zzz".to_string(),
            "submitted version".to_string(),
            "accepted".to_string(),
            "accepted".to_string(),
        ];
        let conversions = reconcile_types(&values, &vocabulary());

        let order: Vec<&str> = conversions.iter().map(|c| c.csv_value.as_str()).collect();
        assert_eq!(order, vec!["accepted", "submitted version", "zzz"]);
        assert!(conversions[2].requires_manual_mapping);
        assert!(has_invalid_types(&conversions));
        assert!(!auto_convertible(&conversions));
        assert_eq!(unresolved_values(&conversions), vec!["zzz"]);
    }

    #[test]
    fn test_manual_override() {
        let values = vec!["mystery".to_string()];
        let mut conversions = reconcile_types(&values, &vocabulary());

        assert!(!apply_manual_override(
            &mut conversions,
            "mystery",
            "no-such-id",
            &vocabulary()
        ));
        assert!(apply_manual_override(
            &mut conversions,
            "mystery",
            "accepted",
            &vocabulary()
        ));

        assert_eq!(conversions[0].matched_id.as_deref(), Some("accepted"));
        assert_eq!(conversions[0].confidence, 0.9);
        assert!(auto_convertible(&conversions));
    }

    #[test]
    fn test_apply_conversions_rewrites_rows() {
        let values = vec!["Accepted version".to_string()];
        let conversions = reconcile_types(&values, &vocabulary());

        let mut rows = vec![
            ImportRow::new("1".to_string(), "https://a.example".to_string()),
            ImportRow::new("2".to_string(), "https://b.example".to_string()),
        ];
        rows[0].file_type = Some("Accepted version".to_string());
        rows[1].file_type = Some("mystery".to_string());

        apply_conversions(&mut rows, &conversions);
        assert_eq!(rows[0].file_type.as_deref(), Some("accepted"));
        assert_eq!(rows[1].file_type.as_deref(), Some("mystery"));
    }

    #[test]
    fn test_filter_options_by_category_and_applicability() {
        let vocab = vocabulary();

        let for_dataset = filter_options(&vocab, "dataset", TypeApplicability::File);
        let ids: Vec<&str> = for_dataset.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["accepted", "submitted", "readme"]);

        let for_patent = filter_options(&vocab, "patent", TypeApplicability::File);
        let ids: Vec<&str> = for_patent.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["accepted", "submitted"]);

        let links_only = filter_options(&vocab, "dataset", TypeApplicability::Link);
        let ids: Vec<&str> = links_only.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["accepted"]);
    }

    #[test]
    fn test_default_type_for_asset() {
        let vocab = vocabulary();
        assert_eq!(
            default_type_for(&vocab, "publication.journalArticle").as_deref(),
            Some("accepted")
        );

        let narrow = vec![option("readme", "README", TypeApplicability::File, "dataset")];
        assert_eq!(default_type_for(&narrow, "dataset"), None);
    }
}
