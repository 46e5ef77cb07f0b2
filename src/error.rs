//! Error types for saccobook operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SaccoError>;

#[derive(Error, Debug)]
pub enum SaccoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage write rejected for key '{key}': {message}")]
    StorageWrite { key: String, message: String },

    #[error("Invalid import format: {message}")]
    InvalidFormat { message: String },

    #[error("Backup not found: index {index} out of range (history holds {len})")]
    NotFound { index: usize, len: usize },

    #[error("Read failure: {message}")]
    ReadFailure { message: String },

    #[error("String conversion error: {0}")]
    StringConversion(#[from] std::string::FromUtf8Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl SaccoError {
    pub fn storage_write(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StorageWrite {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: msg.into(),
        }
    }

    pub fn not_found(index: usize, len: usize) -> Self {
        Self::NotFound { index, len }
    }

    pub fn read_failure(msg: impl Into<String>) -> Self {
        Self::ReadFailure {
            message: msg.into(),
        }
    }
}
