//! Error types for the ingest pipeline

use crate::catalog::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised by the ingest pipeline
///
/// Per-line and per-file failures are contained by the lifecycle manager;
/// only errors that make the output root unusable stop the orchestrator.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] payflow_common::PayflowError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("No free output name in {} after {attempts} attempts", dir.display())]
    OutputNamesExhausted { dir: PathBuf, attempts: u32 },

    #[error("Output root unavailable at {}: {source}", path.display())]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the orchestrator must stop on this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::OutputUnavailable { .. })
    }
}

/// Failure to turn an already-validated line into a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no {stage} found in remaining text '{remaining}'")]
    NoMatch { stage: Stage, remaining: String },

    #[error("invalid {stage} value '{value}': {reason}")]
    InvalidValue {
        stage: Stage,
        value: String,
        reason: String,
    },

    #[error("record is missing required field '{field}'")]
    MissingField { field: &'static str },
}

impl ExtractionError {
    /// Pipeline stage that failed, if the failure came from a stage
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ExtractionError::NoMatch { stage, .. } | ExtractionError::InvalidValue { stage, .. } => {
                Some(*stage)
            },
            ExtractionError::MissingField { .. } => None,
        }
    }
}
