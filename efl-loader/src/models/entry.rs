//! Manual-entry rows and their validation states
//!
//! Manual entry tracks each row through an explicit state enum rather
//! than a pile of booleans, so a row is always in exactly one state.

use crate::models::import_row::ImportRow;
use serde::{Deserialize, Serialize};

/// Validation state of a manually entered row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryRowState {
    /// No asset id entered yet
    Pending,
    /// Asset id entered but not covered by the last validation pass
    PendingNew,
    /// Asset id known good from an earlier validation pass
    ValidatedExisting,
    /// Asset id validated and the row is complete
    Valid,
    /// Asset id failed validation
    Invalid,
    /// Shares an (asset id, URL) pair with another row
    Duplicate,
}

/// One row of the manual-entry table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRow {
    pub asset_id: String,
    pub remote_url: String,
    #[serde(default)]
    pub file_title: String,
    #[serde(default)]
    pub file_description: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub supplemental: bool,
    #[serde(default = "EntryRow::default_state")]
    pub state: EntryRowState,
    /// Field-level duplicate flags, kept until the conflict is resolved
    #[serde(default)]
    pub asset_id_duplicate: bool,
    #[serde(default)]
    pub url_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EntryRow {
    fn default_state() -> EntryRowState {
        EntryRowState::Pending
    }

    pub fn new() -> Self {
        Self {
            asset_id: String::new(),
            remote_url: String::new(),
            file_title: String::new(),
            file_description: String::new(),
            file_type: String::new(),
            supplemental: false,
            state: EntryRowState::Pending,
            asset_id_duplicate: false,
            url_duplicate: false,
            error_message: None,
        }
    }

    /// Key used for duplicate detection across the table
    pub fn duplicate_key(&self) -> String {
        format!("{}||{}", self.asset_id.trim(), self.remote_url.trim().to_lowercase())
    }

    /// Convert a completed entry row into a pipeline import row
    pub fn to_import_row(&self) -> ImportRow {
        let mut row = ImportRow::new(self.asset_id.trim(), self.remote_url.trim());
        if !self.file_title.trim().is_empty() {
            row.file_title = Some(self.file_title.trim().to_string());
        }
        if !self.file_description.trim().is_empty() {
            row.file_description = Some(self.file_description.trim().to_string());
        }
        if !self.file_type.trim().is_empty() {
            row.file_type = Some(self.file_type.trim().to_string());
        }
        row.supplemental = self.supplemental;
        row
    }
}

impl Default for EntryRow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_lowercases_url_only() {
        let mut row = EntryRow::new();
        row.asset_id = "991234".to_string();
        row.remote_url = "HTTPS://Example.org/Paper.PDF".to_string();
        assert_eq!(row.duplicate_key(), "991234||https://example.org/paper.pdf");
    }

    #[test]
    fn test_to_import_row_drops_blank_optionals() {
        let mut row = EntryRow::new();
        row.asset_id = " 991234 ".to_string();
        row.remote_url = "https://example.org/paper.pdf".to_string();
        row.file_title = "  ".to_string();
        row.file_type = "accepted".to_string();
        let import = row.to_import_row();
        assert_eq!(import.asset_id, "991234");
        assert!(import.file_title.is_none());
        assert_eq!(import.file_type.as_deref(), Some("accepted"));
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_string(&EntryRowState::ValidatedExisting).unwrap();
        assert_eq!(json, "\"validatedExisting\"");
        let json = serde_json::to_string(&EntryRowState::PendingNew).unwrap();
        assert_eq!(json, "\"pendingNew\"");
    }
}
