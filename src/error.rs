use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the experiment harness
#[derive(Error, Debug)]
pub enum HighwayError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Missing artifacts (checkpoints, evaluation records, media files)
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    // Snapshot deserialization failures and space-signature mismatches
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    // Environment construction/step failures
    #[error("Resource error: {0}")]
    Resource(String),

    // Chart or frame rendering failures
    #[error("Render error: {0}")]
    Render(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HighwayError {
    /// NotFound for a given artifact path.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        HighwayError::NotFound { path: path.into() }
    }
}

pub type Result<T> = std::result::Result<T, HighwayError>;
