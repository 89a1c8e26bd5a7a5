//! Remote asset snapshots and per-asset submission batches

use serde::{Deserialize, Serialize};

/// One file already attached to a remote asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetFile {
    pub url: String,
    pub title: Option<String>,
    pub file_type: Option<String>,
}

/// Metadata fetched for one asset during validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Asset identifier (MMS ID)
    pub asset_id: String,
    /// Asset title, when the record carries one
    pub title: Option<String>,
    /// Full resource type, e.g. "publication.journalArticle"
    pub asset_type: String,
    /// Files currently attached to the asset
    pub files: Vec<AssetFile>,
}

/// Result of an existence check for one asset id
///
/// Failures are data here, not errors: a batch of lookups settles
/// completely and the caller inspects each outcome.
#[derive(Debug, Clone)]
pub enum AssetLookup {
    Found(AssetMetadata),
    NotFound,
    Failed(String),
}

impl AssetLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, AssetLookup::Found(_))
    }
}

/// Pre/post file-list snapshot captured around the remote import job
///
/// `files_after` stays empty until verification re-fetches the asset.
#[derive(Debug, Clone)]
pub struct CachedAssetState {
    pub asset_id: String,
    pub asset_type: String,
    pub files_before: Vec<AssetFile>,
    pub files_after: Vec<AssetFile>,
    /// Primary expected URL for this asset (first contributing row)
    pub remote_url_from_csv: String,
}

/// Payload for one file link submitted to the remote API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLink {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub link_type: String,
    pub supplemental: bool,
}

/// All files destined for a single asset within one run
///
/// Many import rows fan into one batch; the batch is submitted in a
/// single remote call.
#[derive(Debug, Clone)]
pub struct AssetBatch {
    pub asset_id: String,
    /// File links to submit for this asset
    pub files: Vec<FileLink>,
    /// Indices into the run's row list for every contributing row
    pub row_indices: Vec<usize>,
    /// File count captured before submission
    pub file_count_before: usize,
    /// File count captured after the job ran, when verification got one
    pub file_count_after: Option<usize>,
}

impl AssetBatch {
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            files: Vec::new(),
            row_indices: Vec::new(),
            file_count_before: 0,
            file_count_after: None,
        }
    }
}
