//! Service modules for the asset file import pipeline
//!
//! Pure row/field logic (mapper, reconciler, row state, verification,
//! reports) lives beside the remote-facing pieces (client, validator,
//! monitor) and the orchestrator that composes them into runs.

pub mod asset_validator;
pub mod csv_ingestor;
pub mod esploro_client;
pub mod field_mapper;
pub mod job_monitor;
pub mod orchestrator;
pub mod reports;
pub mod row_state;
pub mod type_reconciler;
pub mod verification;

pub use csv_ingestor::{CsvIngestError, ParsedCsv};
pub use esploro_client::{EsploroClient, EsploroError};
pub use job_monitor::{JobMonitor, MonitorOutcome};
pub use orchestrator::{BatchOrchestrator, RunStore};
pub use row_state::ValidationOutcome;
