//! Typed error hierarchy for the warehouse-process engine.
//!
//! Three top-level enums cover the three subsystems:
//! - `KernelError` — remote action/datasource call failures
//! - `LoaderError` — plugin evaluation failures during schema loading
//! - `EngineError` — scan, process and controller failures

use thiserror::Error;

/// Errors from the ERP kernel client (capability proxy).
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("Action call failed with HTTP status {status}")]
    ActionCallFailed { status: u16 },

    #[error("Datasource call failed with HTTP status {status}")]
    DatasourceFailed { status: u16 },

    #[error("Request transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to decode kernel response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Errors from evaluating an `on_load` plugin.
///
/// A missing registration or a value without the warehouse-process
/// discriminant is *not* an error — the loader returns `None` quietly and
/// the host falls through to its normal rendering.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("onLoad evaluation failed: {0}")]
    Evaluation(String),

    #[error("onLoad returned a warehouse schema that failed validation: {0}")]
    InvalidSchema(String),

    #[error("onLoad evaluation timed out after {secs} seconds")]
    Timeout { secs: u64 },
}

/// Errors from scan validation, process execution and the controller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No onScan handler registered for this process")]
    NoScanHandler,

    #[error("No onProcess handler registered for this process")]
    NoProcessHandler,

    #[error("{0}")]
    ScanValidationFailed(String),

    #[error("{0}")]
    ProcessExecutionFailed(String),

    #[error("Another scan or process operation is already in flight")]
    OperationInFlight,

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
