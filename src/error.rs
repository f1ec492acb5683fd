use std::path::PathBuf;
use thiserror::Error;

/// Every failure is fatal to the run, callers propagate with `?`.
///
/// Numeric blow up from a `dt` that is too large compared to `dx^2`
/// is not detected; keeping the explicit update stable is the caller's job.
#[derive(Error, Debug)]
pub enum HeatError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Out of memory allocating {bytes} bytes of field storage")]
    OutOfMemory { bytes: usize },

    #[error("Checkpoint not found: {}", path.display())]
    CheckpointNotFound { path: PathBuf },

    #[error("Checkpoint corrupt at {}: {reason}", path.display())]
    CheckpointCorrupt { path: PathBuf, reason: String },

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Plot output error: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type HeatResult<T> = Result<T, HeatError>;

impl HeatError {
    pub fn corrupt<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        HeatError::CheckpointCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
