//! Per-asset verification outcomes and run-level summary

use serde::{Deserialize, Serialize};

/// How an expected URL matched against the post-job file list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMatch {
    /// URL found verbatim
    Exact,
    /// A file shares the expected URL's final path segment
    Partial,
    /// No file resembles the expected URL
    None,
}

/// Outcome classification for one asset after the remote job ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    VerifiedSuccess,
    VerifiedPartial,
    VerifiedFailed,
    Unchanged,
    Error,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::VerifiedSuccess => "verified_success",
            VerificationStatus::VerifiedPartial => "verified_partial",
            VerificationStatus::VerifiedFailed => "verified_failed",
            VerificationStatus::Unchanged => "unchanged",
            VerificationStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Match detail for one expected file URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVerification {
    pub url: String,
    pub match_type: FileMatch,
    /// True when the URL was already attached before the run
    pub pre_existing: bool,
    pub detail: String,
}

/// Before/after comparison result for a single asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetVerificationResult {
    pub asset_id: String,
    pub status: VerificationStatus,
    pub files_before_count: usize,
    pub files_after_count: usize,
    /// Net file-count delta; negative when files disappeared
    pub files_added: i64,
    /// How many files this run submitted for the asset
    pub files_expected: usize,
    #[serde(default)]
    pub file_verifications: Vec<FileVerification>,
    pub verification_summary: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Aggregate totals across all verified assets in a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchVerificationSummary {
    pub total_assets: usize,
    pub verified_success: usize,
    pub verified_partial: usize,
    pub verified_failed: usize,
    pub unchanged: usize,
    pub errors: usize,
    pub total_files_expected: usize,
    pub total_files_added: i64,
    /// Share of verifiable assets (errors excluded) that verified fully
    pub success_rate: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub results: Vec<AssetVerificationResult>,
}
