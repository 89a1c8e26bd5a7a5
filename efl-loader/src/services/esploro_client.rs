//! Esploro REST API client
//!
//! Thin async wrapper over the gateway endpoints the import pipeline
//! touches: asset records, file submission, the file/link type mapping
//! table, itemized sets, and job execution. All requests authenticate
//! with an API key and time out after 30 seconds.

use crate::models::{
    AssetFile, AssetMetadata, FileLink, FileTypeOption, JobCounter, JobInstanceStatus, JobStatus,
    TypeApplicability,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// User agent string sent with all requests
const USER_AGENT: &str = "efl-loader/0.1.0";

/// Known id of the asset file import job, used when discovery by name fails
pub const FALLBACK_IMPORT_JOB_ID: &str = "M50762";

/// Names the import job is published under across environments
pub const IMPORT_JOB_NAMES: [&str; 3] = [
    "Import Research Assets Files",
    "Import Asset Files",
    "Import Research Assets Files - via API - forFileUploadJobViaUpdate",
];

/// Pause between consecutive file submissions
pub const DEFAULT_SUBMIT_DELAY_MS: u64 = 100;

/// Page size when listing jobs during discovery
const JOBS_PAGE_LIMIT: usize = 100;

/// Errors that can occur when talking to the Esploro gateway
#[derive(Error, Debug)]
pub enum EsploroError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Asset {0} not found")]
    AssetNotFound(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Spaces out successive write requests so the gateway is not hammered
/// when a run submits files for many assets back to back.
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Waits if necessary to maintain the minimum interval between requests
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Client for the Esploro gateway API
pub struct EsploroClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: Arc<RateLimiter>,
}

impl EsploroClient {
    /// Creates a new client against the given gateway base URL.
    ///
    /// `submit_delay_ms` is the minimum pause enforced between
    /// consecutive [`submit_files`](Self::submit_files) calls.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        submit_delay_ms: u64,
    ) -> Result<Self, EsploroError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::new(submit_delay_ms)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http_client
            .request(method, url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("apikey {}", self.api_key),
            )
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Fetches an asset record along with its current file list.
    ///
    /// A 404 from the gateway, or a response carrying no records, maps
    /// to [`EsploroError::AssetNotFound`].
    pub async fn fetch_asset(&self, asset_id: &str) -> Result<AssetMetadata, EsploroError> {
        debug!("Fetching asset {}", asset_id);

        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/esploro/v1/assets/{}", asset_id),
            )
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(EsploroError::AssetNotFound(asset_id.to_string()));
        }
        let response = Self::check_status(response).await?;

        let body: AssetRecordsResponse = response
            .json()
            .await
            .map_err(|e| EsploroError::ParseError(e.to_string()))?;

        let record = body
            .records
            .into_iter()
            .next()
            .ok_or_else(|| EsploroError::AssetNotFound(asset_id.to_string()))?;

        let files = record
            .files
            .into_iter()
            .map(|f| AssetFile {
                url: f.url.unwrap_or_default(),
                title: f.title,
                file_type: f.file_type,
            })
            .collect();

        Ok(AssetMetadata {
            asset_id: asset_id.to_string(),
            title: record.title,
            asset_type: record.resource_type.unwrap_or_default(),
            files,
        })
    }

    /// Attaches remote file links to an asset.
    ///
    /// Write requests are spaced out by the configured submit delay so
    /// a large run does not flood the gateway.
    pub async fn submit_files(
        &self,
        asset_id: &str,
        files: &[FileLink],
    ) -> Result<(), EsploroError> {
        self.rate_limiter.wait().await;

        debug!("Submitting {} file(s) to asset {}", files.len(), asset_id);

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/esploro/v1/assets/{}/files", asset_id),
            )
            .json(&AddFilesRequest { links: files })
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;

        Self::check_status(response).await?;
        info!("Queued {} file(s) for asset {}", files.len(), asset_id);
        Ok(())
    }

    /// Fetches the file/link type vocabulary from the mapping table.
    ///
    /// Rows missing an id or target code are dropped.
    pub async fn fetch_type_vocabulary(&self) -> Result<Vec<FileTypeOption>, EsploroError> {
        debug!("Fetching file and link type mapping table");

        let response = self
            .request(
                reqwest::Method::GET,
                "/conf/mapping-tables/AssetFileAndLinkTypes",
            )
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: MappingTableResponse = response
            .json()
            .await
            .map_err(|e| EsploroError::ParseError(e.to_string()))?;

        let options: Vec<FileTypeOption> = body
            .row
            .into_iter()
            .filter_map(|row| {
                let id = row.id.filter(|v| !v.trim().is_empty())?;
                let target_code = row.target_code.filter(|v| !v.trim().is_empty())?;
                Some(FileTypeOption {
                    id,
                    target_code,
                    applicability: TypeApplicability::from_code(
                        row.source_code1.as_deref().unwrap_or(""),
                    ),
                    applicable_asset_types: row.source_code2.unwrap_or_default(),
                })
            })
            .collect();

        info!("Loaded {} file type option(s)", options.len());
        Ok(options)
    }

    /// Creates an empty itemized asset set and returns its id
    pub async fn create_set(
        &self,
        name: &str,
        description: &str,
    ) -> Result<String, EsploroError> {
        debug!("Creating itemized set '{}'", name);

        let request = CreateSetRequest {
            name,
            description,
            set_type: CodeValue {
                value: "ITEMIZED".to_string(),
            },
            content_type: CodeValue {
                value: "ASSET".to_string(),
            },
            private: false,
        };

        let response = self
            .request(reqwest::Method::POST, "/conf/sets")
            .json(&request)
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: SetResponse = response
            .json()
            .await
            .map_err(|e| EsploroError::ParseError(e.to_string()))?;

        let set_id = body
            .id
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| EsploroError::ParseError("set id missing in response".to_string()))?;

        info!("Created set {} ('{}')", set_id, name);
        Ok(set_id)
    }

    /// Adds assets to an existing set and returns the resulting member count
    pub async fn add_set_members(
        &self,
        set_id: &str,
        asset_ids: &[String],
    ) -> Result<usize, EsploroError> {
        debug!("Adding {} member(s) to set {}", asset_ids.len(), set_id);

        let request = MemberListRequest {
            members: MembersDto {
                member: asset_ids
                    .iter()
                    .map(|id| MemberId { id: id.clone() })
                    .collect(),
            },
        };

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/conf/sets/{}?op=add_members", set_id),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: SetMembersResponse = response
            .json()
            .await
            .map_err(|e| EsploroError::ParseError(e.to_string()))?;

        let count = body
            .members
            .map(|m| m.member.len())
            .filter(|&n| n > 0)
            .or_else(|| {
                body.number_of_members
                    .and_then(|c| usize::try_from(c.value).ok())
            })
            .unwrap_or(0);

        info!("Set {} now reports {} member(s)", set_id, count);
        Ok(count)
    }

    /// Finds the asset file import job by listing jobs and matching
    /// names against the known list. Returns `None` when no page
    /// contains a match; callers fall back to the configured job id.
    pub async fn find_import_job(&self) -> Result<Option<String>, EsploroError> {
        let mut offset = 0usize;

        loop {
            let page = self.fetch_jobs_page(offset, JOBS_PAGE_LIMIT).await?;
            let total = usize::try_from(page.total_record_count.unwrap_or(0)).unwrap_or(0);

            for job in &page.job {
                let name = job.name.as_deref().unwrap_or("");
                let matched = IMPORT_JOB_NAMES
                    .iter()
                    .any(|known| name == *known || name.contains(known));
                if matched {
                    if let Some(id) = job.id.as_ref().filter(|v| !v.trim().is_empty()) {
                        info!("Found import job {} ('{}')", id, name);
                        return Ok(Some(id.clone()));
                    }
                }
            }

            offset += page.job.len();
            if page.job.is_empty() || offset >= total {
                warn!("No import job matched by name after scanning {} job(s)", offset);
                return Ok(None);
            }
        }
    }

    async fn fetch_jobs_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<JobListResponse, EsploroError> {
        debug!("Listing jobs (offset {}, limit {})", offset, limit);

        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/conf/jobs?offset={}&limit={}", offset, limit),
            )
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| EsploroError::ParseError(e.to_string()))
    }

    /// Runs a job against a set and returns the new instance id
    pub async fn run_job(&self, job_id: &str, set_id: &str) -> Result<String, EsploroError> {
        debug!("Running job {} against set {}", job_id, set_id);

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/conf/jobs/{}/instances", job_id),
            )
            .json(&RunJobRequest { set_id })
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: JobInstanceDto = response
            .json()
            .await
            .map_err(|e| EsploroError::ParseError(e.to_string()))?;

        let instance_id = body.id.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
            EsploroError::ParseError("job instance id missing in response".to_string())
        })?;

        info!("Started job {} instance {}", job_id, instance_id);
        Ok(instance_id)
    }

    /// Fetches the current status of a job instance
    pub async fn fetch_job_instance(
        &self,
        job_id: &str,
        instance_id: &str,
    ) -> Result<JobInstanceStatus, EsploroError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/conf/jobs/{}/instances/{}", job_id, instance_id),
            )
            .send()
            .await
            .map_err(|e| EsploroError::NetworkError(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: JobInstanceDto = response
            .json()
            .await
            .map_err(|e| EsploroError::ParseError(e.to_string()))?;

        let status = JobStatus::parse(
            body.status
                .and_then(|s| s.value)
                .as_deref()
                .unwrap_or(""),
        );

        Ok(JobInstanceStatus {
            instance_id: body.id.unwrap_or_else(|| instance_id.to_string()),
            progress: body.progress.map(|p| p.clamp(0.0, 100.0) as u8),
            status,
            counters: body.counter,
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EsploroError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body).unwrap_or(body);
        Err(EsploroError::ApiError(code, message))
    }
}

/// Pulls a human-readable message out of a gateway error body.
///
/// The gateway uses two envelope shapes depending on the endpoint;
/// both are tried before giving up and surfacing the raw body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    let candidates = [
        "/errorList/error/0/errorMessage",
        "/web_service_result/errorList/error/errorMessage",
    ];
    for pointer in candidates {
        if let Some(message) = value.pointer(pointer).and_then(Value::as_str) {
            let message = message.trim();
            if !message.is_empty() {
                return Some(message.to_string());
            }
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct AssetRecordsResponse {
    #[serde(default)]
    records: Vec<AssetRecord>,
}

#[derive(Debug, Deserialize)]
struct AssetRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "resourcetype.esploro", default)]
    resource_type: Option<String>,
    #[serde(default)]
    files: Vec<AssetFileDto>,
}

#[derive(Debug, Deserialize)]
struct AssetFileDto {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "type", default)]
    file_type: Option<String>,
}

#[derive(Serialize)]
struct AddFilesRequest<'a> {
    links: &'a [FileLink],
}

#[derive(Debug, Deserialize)]
struct MappingTableResponse {
    #[serde(default)]
    row: Vec<MappingTableRow>,
}

#[derive(Debug, Deserialize)]
struct MappingTableRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "targetCode", default)]
    target_code: Option<String>,
    #[serde(rename = "sourceCode1", default)]
    source_code1: Option<String>,
    #[serde(rename = "sourceCode2", default)]
    source_code2: Option<String>,
}

#[derive(Serialize)]
struct CreateSetRequest<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(rename = "type")]
    set_type: CodeValue,
    content_type: CodeValue,
    private: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CodeValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct SetResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Serialize)]
struct MemberListRequest {
    members: MembersDto,
}

#[derive(Debug, Serialize, Deserialize)]
struct MembersDto {
    #[serde(default)]
    member: Vec<MemberId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MemberId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SetMembersResponse {
    #[serde(default)]
    members: Option<MembersDto>,
    #[serde(default)]
    number_of_members: Option<MemberCount>,
}

#[derive(Debug, Deserialize)]
struct MemberCount {
    #[serde(default)]
    value: i64,
}

#[derive(Debug, Deserialize)]
struct JobListResponse {
    #[serde(default)]
    job: Vec<JobSummary>,
    #[serde(default)]
    total_record_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct JobSummary {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct RunJobRequest<'a> {
    set_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobInstanceDto {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    status: Option<StatusDto>,
    #[serde(default)]
    counter: Vec<JobCounter>,
}

#[derive(Debug, Deserialize)]
struct StatusDto {
    #[serde(default)]
    value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = EsploroClient::new(
            "https://gateway.example.com/almaws/v1/",
            "secret",
            DEFAULT_SUBMIT_DELAY_MS,
        );
        assert!(client.is_ok());
        let client = client.unwrap();
        assert_eq!(client.base_url(), "https://gateway.example.com/almaws/v1");
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(100);
        assert_eq!(limiter.min_interval, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(50);

        let start = Instant::now();
        limiter.wait().await;
        let first = start.elapsed();

        let start = Instant::now();
        limiter.wait().await;
        let second = start.elapsed();

        // First call should be immediate, second should wait
        assert!(first < Duration::from_millis(10));
        assert!(second >= Duration::from_millis(45));
    }

    #[test]
    fn test_extract_error_message_error_list() {
        let body = r#"{"errorList":{"error":[{"errorCode":"402203","errorMessage":"Input parameters mmsId is not valid."}]}}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Input parameters mmsId is not valid.")
        );
    }

    #[test]
    fn test_extract_error_message_web_service_result() {
        let body = r#"{"web_service_result":{"errorList":{"error":{"errorMessage":"Invalid API key"}}}}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Invalid API key")
        );
    }

    #[test]
    fn test_extract_error_message_unrecognized_body() {
        assert_eq!(extract_error_message("halt and catch fire"), None);
        assert_eq!(extract_error_message(r#"{"message":"nope"}"#), None);
    }

    #[test]
    fn test_parse_asset_record() {
        let body = r#"{
            "records": [{
                "title": "Deep Work",
                "resourcetype.esploro": "publication.journalArticle",
                "files": [
                    {"title": "Preprint", "url": "https://files.example.edu/a.pdf", "type": "accepted"},
                    {"url": "https://files.example.edu/b.pdf"}
                ]
            }]
        }"#;
        let parsed: AssetRecordsResponse = serde_json::from_str(body).unwrap();
        let record = &parsed.records[0];
        assert_eq!(record.resource_type.as_deref(), Some("publication.journalArticle"));
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[1].title, None);
    }

    #[test]
    fn test_create_set_request_shape() {
        let request = CreateSetRequest {
            name: "Asset File Load - 2025-03-01 12:00:00",
            description: "Auto-generated set for file ingestion. Contains 3 asset(s).",
            set_type: CodeValue {
                value: "ITEMIZED".to_string(),
            },
            content_type: CodeValue {
                value: "ASSET".to_string(),
            },
            private: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"]["value"], "ITEMIZED");
        assert_eq!(json["content_type"]["value"], "ASSET");
        assert_eq!(json["private"], false);
    }
}
