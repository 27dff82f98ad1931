pub mod pipeline;
pub mod report;
pub mod result;
pub mod store;

pub use pipeline::{CancelFlag, PipelineSettings, RunState, ValidationPipeline};
pub use report::{ReportFormat, preview, render};
pub use result::{ChunkVerdict, OverallStatus, RunInfo, Summary, ValidationResult, aggregate};
pub use store::{PersistenceError, default_result_path, load_result, save_report, save_result};

use ingest::IngestError;
use thiserror::Error;

/// Structural failures: the run stops before any chunk is analyzed.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("document {0} is empty")]
    EmptyDocument(String),
}
