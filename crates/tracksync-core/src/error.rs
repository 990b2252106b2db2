use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed source response: {0}")]
    SourceResponseMalformed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store rejected write for {target}: {details}")]
    StoreWriteRejected { target: String, details: String },

    #[error("duplicate key in source snapshot: {0}")]
    DuplicateKey(String),

    #[error("notification failed: {0}")]
    NotifyFailed(String),

    #[error("config not found at {0}: create it or pass --config")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// True for failures that abort a whole pass rather than a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable(_)
                | SyncError::StoreUnavailable(_)
                | SyncError::ConfigNotFound(_)
                | SyncError::InvalidConfig(_)
        )
    }

    pub(crate) fn write_rejected(target: impl Into<String>, details: impl Into<String>) -> Self {
        SyncError::StoreWriteRejected {
            target: target.into(),
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
