//! Ingest daemon configuration
//!
//! Values come from the environment (a `.env` file is loaded first when
//! present) and may be overridden on the command line.
//!
//! | Variable                   | Default    |
//! |----------------------------|------------|
//! | `PAYFLOW_INBOUND_DIR`      | required   |
//! | `PAYFLOW_OUTPUT_DIR`       | required   |
//! | `PAYFLOW_EXTENSIONS`       | `txt,csv`  |
//! | `PAYFLOW_RETIRED_MARKER`   | `Source`   |
//! | `PAYFLOW_RETIRE_MODE`      | `rename`   |
//! | `PAYFLOW_OUTPUT_FORMAT`    | `pretty`   |
//! | `PAYFLOW_SCAN_INTERVAL_MS` | `1000`     |
//! | `PAYFLOW_ROTATION_POLL_MS` | `1000`     |
//! | `PAYFLOW_ROTATE_AT`        | `00:00`    |

use crate::error::{IngestError, Result};
use crate::lifecycle::RetireMode;
use crate::serializer::OutputFormat;
use chrono::NaiveTime;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_INBOUND_DIR: &str = "PAYFLOW_INBOUND_DIR";
pub const ENV_OUTPUT_DIR: &str = "PAYFLOW_OUTPUT_DIR";
pub const ENV_EXTENSIONS: &str = "PAYFLOW_EXTENSIONS";
pub const ENV_RETIRED_MARKER: &str = "PAYFLOW_RETIRED_MARKER";
pub const ENV_RETIRE_MODE: &str = "PAYFLOW_RETIRE_MODE";
pub const ENV_OUTPUT_FORMAT: &str = "PAYFLOW_OUTPUT_FORMAT";
pub const ENV_SCAN_INTERVAL_MS: &str = "PAYFLOW_SCAN_INTERVAL_MS";
pub const ENV_ROTATION_POLL_MS: &str = "PAYFLOW_ROTATION_POLL_MS";
pub const ENV_ROTATE_AT: &str = "PAYFLOW_ROTATE_AT";

pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "csv"];
pub const DEFAULT_RETIRED_MARKER: &str = "Source";
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_ROTATION_POLL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Watched folder
    pub inbound_dir: PathBuf,
    /// Root under which one directory per day is created
    pub output_dir: PathBuf,
    /// Allowed extensions, lowercase, no dot
    pub extensions: Vec<String>,
    /// File-name marker of retired sources
    pub retired_marker: String,
    pub retire_mode: RetireMode,
    pub output_format: OutputFormat,
    pub scan_interval_ms: u64,
    pub rotation_poll_ms: u64,
    /// Local time of day at which output rotates
    pub rotate_at: NaiveTime,
}

impl IngestConfig {
    /// Config with defaults for everything but the two directories
    pub fn new(inbound_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            inbound_dir: inbound_dir.into(),
            output_dir: output_dir.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            retired_marker: DEFAULT_RETIRED_MARKER.to_string(),
            retire_mode: RetireMode::default(),
            output_format: OutputFormat::default(),
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            rotation_poll_ms: DEFAULT_ROTATION_POLL_MS,
            rotate_at: NaiveTime::MIN,
        }
    }

    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| IngestError::config(format!("{} must be set", key)))
        };

        let mut config = Self::new(require(ENV_INBOUND_DIR)?, require(ENV_OUTPUT_DIR)?);

        if let Some(list) = lookup(ENV_EXTENSIONS) {
            config.extensions = parse_extensions(&list);
        }
        if let Some(marker) = lookup(ENV_RETIRED_MARKER) {
            config.retired_marker = marker.trim().to_string();
        }
        if let Some(mode) = lookup(ENV_RETIRE_MODE) {
            config.retire_mode = mode.parse()?;
        }
        if let Some(format) = lookup(ENV_OUTPUT_FORMAT) {
            config.output_format = format.parse()?;
        }
        if let Some(ms) = lookup(ENV_SCAN_INTERVAL_MS) {
            config.scan_interval_ms = parse_number(ENV_SCAN_INTERVAL_MS, &ms)?;
        }
        if let Some(ms) = lookup(ENV_ROTATION_POLL_MS) {
            config.rotation_poll_ms = parse_number(ENV_ROTATION_POLL_MS, &ms)?;
        }
        if let Some(at) = lookup(ENV_ROTATE_AT) {
            config.rotate_at = parse_time_of_day(&at)?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.inbound_dir.as_os_str().is_empty() {
            return Err(IngestError::config("inbound directory must not be empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(IngestError::config("output directory must not be empty"));
        }
        if self.inbound_dir == self.output_dir {
            return Err(IngestError::config(
                "inbound and output directories must differ",
            ));
        }
        if self.extensions.is_empty() {
            return Err(IngestError::config("at least one extension must be allowed"));
        }
        if self.retired_marker.is_empty() {
            return Err(IngestError::config("retired marker must not be empty"));
        }
        if self.scan_interval_ms == 0 {
            return Err(IngestError::config(format!(
                "{} must be greater than 0",
                ENV_SCAN_INTERVAL_MS
            )));
        }
        if self.rotation_poll_ms == 0 {
            return Err(IngestError::config(format!(
                "{} must be greater than 0",
                ENV_ROTATION_POLL_MS
            )));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn rotation_poll(&self) -> Duration {
        Duration::from_millis(self.rotation_poll_ms)
    }
}

/// Load a `.env` file from the working directory into the environment
///
/// Variables already set in the process take precedence.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "Failed to load .env file");
        }
    }
}

/// Split a comma-separated extension list, normalizing each entry
pub fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| {
            IngestError::config(format!(
                "Invalid time of day '{}': expected HH:MM or HH:MM:SS",
                value
            ))
        })
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IngestError::config(format!("{} must be a number, got '{}'", key, value)))
}
