//! Remote job instance status and counters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counter type id for total files uploaded by the job
pub const COUNTER_FILES_UPLOADED: &str = "file_uploaded";
/// Counter type id for assets the job processed successfully
pub const COUNTER_ASSETS_SUCCEEDED: &str = "asset_succeeded";
/// Counter type id for assets the job failed to process
pub const COUNTER_ASSETS_FAILED: &str = "asset_failed";

/// Lifecycle state of a remote job instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    CompletedSuccess,
    CompletedFailed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Parse a raw status string from the jobs API
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "QUEUED" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "COMPLETED_SUCCESS" => JobStatus::CompletedSuccess,
            "COMPLETED_FAILED" => JobStatus::CompletedFailed,
            "CANCELLED" => JobStatus::Cancelled,
            _ => JobStatus::Unknown,
        }
    }

    /// Any status other than queued or running ends polling
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::CompletedSuccess => "COMPLETED_SUCCESS",
            JobStatus::CompletedFailed => "COMPLETED_FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One counter reported by a job instance
///
/// The jobs API is loose about shapes here: `type` may be a bare string
/// or an object with a `value` field, and `value` may be a number or a
/// numeric string. Both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCounter {
    #[serde(rename = "type", default)]
    pub counter_type: serde_json::Value,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl JobCounter {
    /// Counter type id, from either wire shape
    pub fn type_id(&self) -> Option<&str> {
        match &self.counter_type {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(map) => map.get("value").and_then(|v| v.as_str()),
            _ => None,
        }
    }

    /// Counter value, from either wire shape
    pub fn count(&self) -> i64 {
        match &self.value {
            serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Snapshot of a running or finished job instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstanceStatus {
    pub instance_id: String,
    /// Percent complete, when the API reports one
    pub progress: Option<u8>,
    pub status: JobStatus,
    #[serde(default)]
    pub counters: Vec<JobCounter>,
}

impl JobInstanceStatus {
    /// Collapse counters into a type-id to value map
    pub fn counter_map(&self) -> HashMap<String, i64> {
        self.counters
            .iter()
            .filter_map(|c| c.type_id().map(|id| (id.to_string(), c.count())))
            .collect()
    }
}
