//! Error types for Payflow

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Payflow file operations
pub type Result<T> = std::result::Result<T, PayflowError>;

/// Main error type for the shared Payflow primitives
#[derive(Error, Debug)]
pub enum PayflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Target already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
}

impl PayflowError {
    /// Whether the error means the destination name is taken
    pub fn is_already_exists(&self) -> bool {
        matches!(self, PayflowError::AlreadyExists(_))
    }
}
