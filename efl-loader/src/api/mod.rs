//! HTTP API handlers for efl-loader
//!
//! Import pipeline endpoints plus the health check. Route builders are
//! merged into the application router in `lib.rs`.

pub mod health;
pub mod imports;

pub use health::health_routes;
pub use imports::import_routes;
