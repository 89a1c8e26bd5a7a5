//! efl-loader - Esploro asset file import service
//!
//! Headless HTTP service that bulk-attaches remote files to research
//! asset records: CSV ingestion and field mapping, file type
//! reconciliation, the three-phase batch orchestrator, remote job
//! monitoring, and before/after verification.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use efl_common::events::EventBus;
use efl_loader::config::{Args, LoaderConfig};
use efl_loader::services::esploro_client::EsploroClient;
use efl_loader::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting efl-loader (Esploro asset file import)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let toml = match &args.config {
        Some(path) => efl_common::config::load_toml_config(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config file: {}", e))?,
        None => efl_common::config::load_default_config(),
    };
    let config = LoaderConfig::resolve(&args, &toml)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let client = Arc::new(
        EsploroClient::new(
            &config.gateway_url,
            &config.api_key,
            config.inter_asset_delay_ms,
        )
        .map_err(|e| anyhow::anyhow!("Failed to build API client: {}", e))?,
    );
    info!("Gateway: {}", client.base_url());

    let event_bus = EventBus::new(100);

    let listen = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, client, event_bus);
    let app = efl_loader::build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("Listening on http://{}", listen);
    info!("Health check: http://{}/health", listen);

    axum::serve(listener, app).await?;

    Ok(())
}
