//! Configuration resolution for efl-loader
//!
//! Settings resolve per field with CLI → ENV → TOML → default priority.
//! CLI and ENV are handled together by clap (`env` attributes), so the
//! remaining tiering here is flag-or-env, then the TOML file, then the
//! built-in default. The API key has no default and must be configured.

use clap::Parser;
use efl_common::config::TomlConfig;
use efl_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::services::csv_ingestor::DEFAULT_MAX_CSV_BYTES;
use crate::services::esploro_client::{DEFAULT_SUBMIT_DELAY_MS, FALLBACK_IMPORT_JOB_ID};
use crate::services::job_monitor::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};

/// North-America hosted gateway; institutions in other regions override this
pub const DEFAULT_GATEWAY_URL: &str = "https://api-na.hosted.exlibrisgroup.com";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8470;

/// Command-line arguments for efl-loader
#[derive(Parser, Debug, Default)]
#[command(name = "efl-loader")]
#[command(about = "Esploro asset file import service")]
#[command(version)]
pub struct Args {
    /// Host to listen on
    #[arg(long, env = "EFL_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "EFL_PORT")]
    pub port: Option<u16>,

    /// Base URL of the Esploro API gateway
    #[arg(long, env = "EFL_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// API key for the Esploro REST API
    #[arg(long, env = "EFL_API_KEY")]
    pub api_key: Option<String>,

    /// Job id used when import-job discovery by name fails
    #[arg(long, env = "EFL_IMPORT_JOB_ID")]
    pub import_job_id: Option<String>,

    /// Delay between per-asset file submissions, in milliseconds
    #[arg(long, env = "EFL_INTER_ASSET_DELAY_MS")]
    pub inter_asset_delay_ms: Option<u64>,

    /// Job poll interval, in seconds
    #[arg(long, env = "EFL_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<u64>,

    /// Hard cap on job monitoring, in seconds
    #[arg(long, env = "EFL_POLL_TIMEOUT_SECS")]
    pub poll_timeout_secs: Option<u64>,

    /// Maximum accepted CSV file size, in bytes
    #[arg(long, env = "EFL_MAX_CSV_BYTES")]
    pub max_csv_bytes: Option<u64>,

    /// Explicit config file path (defaults to the platform location)
    #[arg(short, long, env = "EFL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Fully-resolved service configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub host: String,
    pub port: u16,
    pub gateway_url: String,
    pub api_key: String,
    /// Fallback job id for when discovery by name finds nothing
    pub import_job_id: String,
    pub inter_asset_delay_ms: u64,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub max_csv_bytes: u64,
}

impl LoaderConfig {
    /// Resolve the effective configuration from parsed flags and the
    /// TOML file contents.
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let api_key = args
            .api_key
            .clone()
            .or_else(|| toml.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "Esploro API key not configured. Please configure using one of:\n\
                     1. Command line: --api-key your-key\n\
                     2. Environment: EFL_API_KEY=your-key\n\
                     3. TOML config: ~/.config/efl/efl-loader.toml (api_key = \"your-key\")"
                        .to_string(),
                )
            })?;

        let (gateway_url, gateway_source) = pick(
            args.gateway_url.clone(),
            toml.gateway_url.clone(),
            DEFAULT_GATEWAY_URL.to_string(),
        );
        info!("Gateway URL from {}: {}", gateway_source, gateway_url);

        let (host, _) = pick(args.host.clone(), toml.host.clone(), DEFAULT_HOST.to_string());
        let (port, _) = pick(args.port, toml.port, DEFAULT_PORT);
        let (import_job_id, _) = pick(
            args.import_job_id.clone(),
            toml.import_job_id.clone(),
            FALLBACK_IMPORT_JOB_ID.to_string(),
        );
        let (inter_asset_delay_ms, _) = pick(
            args.inter_asset_delay_ms,
            toml.inter_asset_delay_ms,
            DEFAULT_SUBMIT_DELAY_MS,
        );
        let (poll_interval_secs, _) = pick(
            args.poll_interval_secs,
            toml.poll_interval_secs,
            DEFAULT_POLL_INTERVAL.as_secs(),
        );
        let (poll_timeout_secs, _) = pick(
            args.poll_timeout_secs,
            toml.poll_timeout_secs,
            DEFAULT_POLL_TIMEOUT.as_secs(),
        );
        let (max_csv_bytes, _) = pick(
            args.max_csv_bytes,
            toml.max_csv_bytes,
            DEFAULT_MAX_CSV_BYTES,
        );

        Ok(Self {
            host,
            port,
            gateway_url,
            api_key,
            import_job_id,
            inter_asset_delay_ms,
            poll_interval_secs,
            poll_timeout_secs,
            max_csv_bytes,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// One field's flag-or-env → TOML → default resolution, with the
/// winning source named for logging.
fn pick<T>(cli: Option<T>, toml: Option<T>, default: T) -> (T, &'static str) {
    if let Some(value) = cli {
        (value, "flags/environment")
    } else if let Some(value) = toml {
        (value, "TOML config")
    } else {
        (default, "defaults")
    }
}
