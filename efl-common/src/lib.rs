//! # Esploro File Loader Common Library
//!
//! Shared code for the file loader service including:
//! - Error types (Error / Result)
//! - Event types (LoaderEvent enum) and the broadcast EventBus
//! - Configuration file loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
