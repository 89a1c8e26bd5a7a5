//! Before/after diff verification
//!
//! After the remote job finishes, each asset's file list is re-fetched
//! and compared with the snapshot taken before submission. A raw count
//! delta alone cannot tell whether the right file landed, so every
//! expected URL is matched against the post-job file list: verbatim,
//! by filename, or not at all.

use crate::models::{
    AssetFile, AssetVerificationResult, BatchVerificationSummary, CachedAssetState, FileMatch,
    FileVerification, VerificationStatus,
};

/// Final path segment of a URL, with any query or fragment stripped
pub fn final_path_segment(url: &str) -> &str {
    let trimmed = url.trim();
    let without_suffix = trimmed
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(trimmed);
    without_suffix.rsplit('/').next().unwrap_or(without_suffix)
}

/// Matches one expected URL against the post-job file list.
///
/// Returns the match kind plus whether the URL was already attached
/// before the run (only meaningful for exact matches).
pub fn classify_url_match(
    expected_url: &str,
    files_before: &[AssetFile],
    files_after: &[AssetFile],
) -> (FileMatch, bool) {
    let expected = expected_url.trim();

    let exact = files_after.iter().any(|f| f.url.trim() == expected);
    if exact {
        let pre_existing = files_before.iter().any(|f| f.url.trim() == expected);
        return (FileMatch::Exact, pre_existing);
    }

    let expected_name = final_path_segment(expected);
    if !expected_name.is_empty() {
        let partial = files_after
            .iter()
            .any(|f| final_path_segment(&f.url) == expected_name);
        if partial {
            return (FileMatch::Partial, false);
        }
    }

    (FileMatch::None, false)
}

/// Verifies one asset against its cached pre-run state.
///
/// `expected_urls` are the URLs submitted for this asset in the run;
/// the asset's verification status combines their match outcomes with
/// the raw file count delta.
pub fn verify_asset(state: &CachedAssetState, expected_urls: &[String]) -> AssetVerificationResult {
    let files_before_count = state.files_before.len();
    let files_after_count = state.files_after.len();
    let files_added = files_after_count as i64 - files_before_count as i64;
    let files_expected = expected_urls.len();

    let file_verifications: Vec<FileVerification> = expected_urls
        .iter()
        .map(|url| {
            let (match_type, pre_existing) =
                classify_url_match(url, &state.files_before, &state.files_after);
            let detail = match match_type {
                FileMatch::Exact if pre_existing => {
                    "URL was already attached before the run".to_string()
                }
                FileMatch::Exact => "URL found on the asset".to_string(),
                FileMatch::Partial => {
                    "a file with the same filename is attached, but the URL differs".to_string()
                }
                FileMatch::None => "URL not found on the asset".to_string(),
            };
            FileVerification {
                url: url.clone(),
                match_type,
                pre_existing,
                detail,
            }
        })
        .collect();

    let all_exact = !file_verifications.is_empty()
        && file_verifications
            .iter()
            .all(|v| v.match_type == FileMatch::Exact);
    let any_matched = file_verifications
        .iter()
        .any(|v| v.match_type != FileMatch::None);

    let status = if all_exact {
        VerificationStatus::VerifiedSuccess
    } else if any_matched {
        VerificationStatus::VerifiedPartial
    } else if files_added > 0 {
        VerificationStatus::VerifiedFailed
    } else {
        VerificationStatus::Unchanged
    };

    let mut warnings = Vec::new();
    for verification in &file_verifications {
        match verification.match_type {
            FileMatch::Partial => warnings.push(format!(
                "Asset {}: only a filename match was found for {}; verify the correct file was attached",
                state.asset_id, verification.url
            )),
            FileMatch::None if files_added > 0 => warnings.push(format!(
                "Asset {}: {} was not found despite a file count increase; the job may still be processing",
                state.asset_id, verification.url
            )),
            _ => {}
        }
    }
    if files_added > files_expected as i64 {
        warnings.push(format!(
            "Asset {}: file count increased by {}, more than the {} expected",
            state.asset_id, files_added, files_expected
        ));
    } else if files_added > 0 && files_added < files_expected as i64 {
        warnings.push(format!(
            "Asset {}: file count increased by {}, fewer than the {} expected",
            state.asset_id, files_added, files_expected
        ));
    }

    let verification_summary = match status {
        VerificationStatus::VerifiedSuccess => format!(
            "{} of {} expected file(s) attached ({} -> {} files)",
            file_verifications.len(),
            files_expected,
            files_before_count,
            files_after_count
        ),
        VerificationStatus::VerifiedPartial => format!(
            "only some expected files were confirmed ({} -> {} files)",
            files_before_count, files_after_count
        ),
        VerificationStatus::VerifiedFailed => format!(
            "expected file(s) missing although the file count changed ({} -> {})",
            files_before_count, files_after_count
        ),
        VerificationStatus::Unchanged => "no file change detected".to_string(),
        VerificationStatus::Error => String::new(),
    };

    AssetVerificationResult {
        asset_id: state.asset_id.clone(),
        status,
        files_before_count,
        files_after_count,
        files_added,
        files_expected,
        file_verifications,
        verification_summary,
        warnings,
    }
}

/// Result for an asset whose post-job state could not be fetched
pub fn error_result(
    asset_id: &str,
    files_before_count: usize,
    files_expected: usize,
    message: &str,
) -> AssetVerificationResult {
    AssetVerificationResult {
        asset_id: asset_id.to_string(),
        status: VerificationStatus::Error,
        files_before_count,
        files_after_count: files_before_count,
        files_added: 0,
        files_expected,
        file_verifications: Vec::new(),
        verification_summary: format!("verification failed: {}", message),
        warnings: vec![format!(
            "Asset {}: could not re-fetch state for verification: {}",
            asset_id, message
        )],
    }
}

/// Rolls per-asset results up into the batch summary.
///
/// The success rate counts only assets that could actually be checked;
/// fetch errors are excluded from the denominator.
pub fn summarize(results: Vec<AssetVerificationResult>) -> BatchVerificationSummary {
    let mut summary = BatchVerificationSummary {
        total_assets: results.len(),
        ..Default::default()
    };

    for result in &results {
        match result.status {
            VerificationStatus::VerifiedSuccess => summary.verified_success += 1,
            VerificationStatus::VerifiedPartial => summary.verified_partial += 1,
            VerificationStatus::VerifiedFailed => summary.verified_failed += 1,
            VerificationStatus::Unchanged => summary.unchanged += 1,
            VerificationStatus::Error => summary.errors += 1,
        }
        summary.total_files_expected += result.files_expected;
        summary.total_files_added += result.files_added.max(0);
        summary.warnings.extend(result.warnings.iter().cloned());
    }

    let verifiable = summary.total_assets.saturating_sub(summary.errors);
    summary.success_rate = if verifiable > 0 {
        summary.verified_success as f64 / verifiable as f64 * 100.0
    } else {
        0.0
    };

    if summary.verified_failed > 0 {
        summary
            .recommendations
            .push("Re-run the import for assets whose files did not appear".to_string());
    }
    if summary.verified_partial > 0 {
        summary
            .recommendations
            .push("Manually review assets where only a filename match was found".to_string());
    }
    if summary.errors > 0 {
        summary
            .recommendations
            .push("Retry verification for assets that could not be re-checked".to_string());
    }

    summary.results = results;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(url: &str) -> AssetFile {
        AssetFile {
            url: url.to_string(),
            title: None,
            file_type: None,
        }
    }

    fn state(asset_id: &str, before: &[&str], after: &[&str]) -> CachedAssetState {
        CachedAssetState {
            asset_id: asset_id.to_string(),
            asset_type: "publication".to_string(),
            files_before: before.iter().map(|u| file(u)).collect(),
            files_after: after.iter().map(|u| file(u)).collect(),
            remote_url_from_csv: String::new(),
        }
    }

    #[test]
    fn test_final_path_segment() {
        assert_eq!(
            final_path_segment("https://files.example.edu/a/b/paper.pdf"),
            "paper.pdf"
        );
        assert_eq!(
            final_path_segment("https://files.example.edu/paper.pdf?version=2#p3"),
            "paper.pdf"
        );
        assert_eq!(final_path_segment("https://files.example.edu/dir/"), "");
        assert_eq!(final_path_segment("paper.pdf"), "paper.pdf");
    }

    #[test]
    fn test_classify_exact_and_pre_existing() {
        let before = [file("https://a.example/x.pdf")];
        let after = [file("https://a.example/x.pdf"), file("https://a.example/y.pdf")];

        let (matched, pre_existing) =
            classify_url_match("https://a.example/x.pdf", &before, &after);
        assert_eq!(matched, FileMatch::Exact);
        assert!(pre_existing);

        let (matched, pre_existing) =
            classify_url_match("https://a.example/y.pdf", &before, &after);
        assert_eq!(matched, FileMatch::Exact);
        assert!(!pre_existing);
    }

    #[test]
    fn test_classify_partial_by_filename() {
        let after = [file("https://cdn.example.net/mirror/x.pdf")];
        let (matched, _) = classify_url_match("https://a.example/sub/x.pdf", &[], &after);
        assert_eq!(matched, FileMatch::Partial);
    }

    #[test]
    fn test_classify_none() {
        let after = [file("https://a.example/other.bin")];
        let (matched, _) = classify_url_match("https://a.example/x.pdf", &[], &after);
        assert_eq!(matched, FileMatch::None);
    }

    #[test]
    fn test_verify_success() {
        let state = state(
            "991",
            &["https://a.example/old.pdf"],
            &["https://a.example/old.pdf", "https://a.example/new.pdf"],
        );
        let result = verify_asset(&state, &["https://a.example/new.pdf".to_string()]);

        assert_eq!(result.status, VerificationStatus::VerifiedSuccess);
        assert_eq!(result.files_added, 1);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_verify_pre_existing_counts_as_success() {
        let state = state(
            "991",
            &["https://a.example/x.pdf"],
            &["https://a.example/x.pdf"],
        );
        let result = verify_asset(&state, &["https://a.example/x.pdf".to_string()]);

        assert_eq!(result.status, VerificationStatus::VerifiedSuccess);
        assert!(result.file_verifications[0].pre_existing);
        assert_eq!(result.files_added, 0);
    }

    #[test]
    fn test_verify_partial_warns() {
        let state = state("991", &[], &["https://cdn.example.net/x.pdf"]);
        let result = verify_asset(&state, &["https://a.example/x.pdf".to_string()]);

        assert_eq!(result.status, VerificationStatus::VerifiedPartial);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("filename match"));
    }

    #[test]
    fn test_verify_failed_when_something_else_was_added() {
        let state = state("991", &[], &["https://a.example/unrelated.bin"]);
        let result = verify_asset(&state, &["https://a.example/x.pdf".to_string()]);

        assert_eq!(result.status, VerificationStatus::VerifiedFailed);
        assert!(result.warnings[0].contains("may still be processing"));
    }

    #[test]
    fn test_verify_unchanged() {
        let state = state(
            "991",
            &["https://a.example/old.pdf"],
            &["https://a.example/old.pdf"],
        );
        let result = verify_asset(&state, &["https://a.example/x.pdf".to_string()]);

        assert_eq!(result.status, VerificationStatus::Unchanged);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_verify_count_above_expectation_warns() {
        let state = state(
            "991",
            &[],
            &["https://a.example/x.pdf", "https://a.example/extra.pdf"],
        );
        let result = verify_asset(&state, &["https://a.example/x.pdf".to_string()]);

        assert_eq!(result.status, VerificationStatus::VerifiedSuccess);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("more than"));
    }

    #[test]
    fn test_summarize() {
        let success = verify_asset(
            &state("1", &[], &["https://a.example/x.pdf"]),
            &["https://a.example/x.pdf".to_string()],
        );
        let unchanged = verify_asset(
            &state("2", &["https://a.example/y.pdf"], &["https://a.example/y.pdf"]),
            &["https://a.example/z.pdf".to_string()],
        );
        let error = error_result("3", 2, 1, "API error 500: boom");

        let summary = summarize(vec![success, unchanged, error]);

        assert_eq!(summary.total_assets, 3);
        assert_eq!(summary.verified_success, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.total_files_expected, 3);
        assert_eq!(summary.total_files_added, 1);
        assert_eq!(summary.success_rate, 50.0);
        assert_eq!(summary.recommendations.len(), 1);
        assert!(summary.recommendations[0].contains("could not be re-checked"));
        assert_eq!(summary.results.len(), 3);
    }
}
