//! CSV column mapping

use serde::{Deserialize, Serialize};

/// Semantic field a CSV column can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappedField {
    /// Target asset identifier (MMS ID)
    AssetId,
    /// Remote file URL
    RemoteUrl,
    /// File title
    FileTitle,
    /// File description
    FileDescription,
    /// File type code
    FileType,
    /// Column carries no pipeline data
    Ignore,
}

impl MappedField {
    /// Human-readable field name used in validation messages
    pub fn display_name(&self) -> &'static str {
        match self {
            MappedField::AssetId => "MMS ID",
            MappedField::RemoteUrl => "File URL",
            MappedField::FileTitle => "File Title",
            MappedField::FileDescription => "Description",
            MappedField::FileType => "File Type",
            MappedField::Ignore => "Ignored",
        }
    }

    /// Parses a field name as supplied in a mapping override.
    ///
    /// Accepts a few aliases so callers are not forced to use the
    /// exact serialized names.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "assetid" | "mmsid" | "mms" | "id" => Some(MappedField::AssetId),
            "remoteurl" | "url" | "fileurl" | "link" => Some(MappedField::RemoteUrl),
            "filetitle" | "title" => Some(MappedField::FileTitle),
            "filedescription" | "description" | "desc" => Some(MappedField::FileDescription),
            "filetype" | "type" => Some(MappedField::FileType),
            "ignore" | "ignored" => Some(MappedField::Ignore),
            _ => None,
        }
    }
}

/// Suggested (or user-adjusted) mapping for one CSV column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Header text as it appeared in the CSV
    pub csv_header: String,
    /// First data row's value for this column, for display
    pub sample_value: String,
    /// Field the column is mapped to
    pub mapped_field: MappedField,
    /// Heuristic confidence in [0, 1]
    pub confidence: f64,
}
