//! Import row lifecycle

use serde::{Deserialize, Serialize};

/// Processing status of a single import row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Not yet processed
    Pending,
    /// Files submitted (and, after verification, confirmed attached)
    Success,
    /// Row failed; `error_message` explains why
    Error,
    /// Remote asset showed no file change after the job ran
    Unchanged,
}

/// One file-attachment request: a single row of the CSV or manual table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRow {
    /// Target asset identifier (MMS ID)
    pub asset_id: String,
    /// Remote URL of the file to attach
    pub remote_url: String,
    /// Display title for the attached file
    pub file_title: Option<String>,
    /// File description
    pub file_description: Option<String>,
    /// File type id from the remote vocabulary
    pub file_type: Option<String>,
    /// Whether the file is supplemental material
    #[serde(default)]
    pub supplemental: bool,
    /// Current processing status
    pub status: RowStatus,
    /// Failure detail when `status` is `error`
    pub error_message: Option<String>,
}

impl ImportRow {
    pub fn new(asset_id: impl Into<String>, remote_url: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            remote_url: remote_url.into(),
            file_title: None,
            file_description: None,
            file_type: None,
            supplemental: false,
            status: RowStatus::Pending,
            error_message: None,
        }
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = RowStatus::Error;
        self.error_message = Some(message.into());
    }

    pub fn mark_success(&mut self) {
        self.status = RowStatus::Success;
        self.error_message = None;
    }

    pub fn mark_unchanged(&mut self) {
        self.status = RowStatus::Unchanged;
    }
}
