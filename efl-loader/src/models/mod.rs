//! Data models for the file loader service

pub mod asset;
pub mod entry;
pub mod file_types;
pub mod import_row;
pub mod import_run;
pub mod job;
pub mod mapping;
pub mod verification;

pub use asset::{AssetBatch, AssetFile, AssetLookup, AssetMetadata, CachedAssetState, FileLink};
pub use entry::{EntryRow, EntryRowState};
pub use file_types::{
    extract_category, fallback_type_options, FileTypeConversion, FileTypeOption, TypeApplicability,
};
pub use import_row::{ImportRow, RowStatus};
pub use import_run::{ImportRun, PhaseTransition, RowCounts, RunPhase, RunProgress};
pub use job::{
    JobCounter, JobInstanceStatus, JobStatus, COUNTER_ASSETS_FAILED, COUNTER_ASSETS_SUCCEEDED,
    COUNTER_FILES_UPLOADED,
};
pub use mapping::{ColumnMapping, MappedField};
pub use verification::{
    AssetVerificationResult, BatchVerificationSummary, FileMatch, FileVerification,
    VerificationStatus,
};
