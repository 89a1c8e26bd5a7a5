//! efl-loader library interface
//!
//! Exposes the service building blocks for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::LoaderConfig;
use crate::services::esploro_client::EsploroClient;
use crate::services::orchestrator::RunStore;
use efl_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: Arc<LoaderConfig>,
    /// Shared Esploro REST client
    pub client: Arc<EsploroClient>,
    /// Event bus broadcasting run progress
    pub event_bus: EventBus,
    /// In-memory run records, written by the background run tasks
    pub runs: RunStore,
    /// Cancellation tokens for active runs
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: LoaderConfig, client: Arc<EsploroClient>, event_bus: EventBus) -> Self {
        Self {
            config: Arc::new(config),
            client,
            event_bus,
            runs: Arc::new(RwLock::new(HashMap::new())),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
