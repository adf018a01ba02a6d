//! Shared ingest state
//!
//! The error counter, invalid-file list, output counter and current daily
//! directory are mutated by the ingest loop and reset by the rotation
//! worker. They live in one [`IngestState`] behind a single async mutex so
//! that name reservation, file creation and rotation never interleave.

use crate::error::{IngestError, Result};
use chrono::NaiveDate;
use payflow_common::fsio;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const META_LOG_NAME: &str = "meta.log";
pub const OUTPUT_PREFIX: &str = "Output";
pub const OUTPUT_EXTENSION: &str = "txt";

/// Names tried per write before giving up on a daily directory
pub const MAX_NAME_ATTEMPTS: u32 = 1024;

const LABEL_FORMAT: &str = "%Y-%m-%d";

/// State handle shared by every worker
pub type SharedState = Arc<Mutex<IngestState>>;

/// Run file work against the state on the blocking pool
///
/// The lock is held until `work` returns, so writes still never interleave
/// with a rotation, but async workers are not stalled on disk I/O.
pub async fn with_state_blocking<T, F>(state: &SharedState, work: F) -> Result<T>
where
    F: FnOnce(&mut IngestState) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let mut guard = state.clone().lock_owned().await;
    tokio::task::spawn_blocking(move || work(&mut guard)).await?
}

/// One calendar day's output directory under the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyDirectory {
    date: NaiveDate,
    path: PathBuf,
}

impl DailyDirectory {
    pub fn new(root: &Path, date: NaiveDate) -> Self {
        Self {
            date,
            path: root.join(date.format(LABEL_FORMAT).to_string()),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> String {
        self.date.format(LABEL_FORMAT).to_string()
    }

    pub fn meta_log_path(&self) -> PathBuf {
        self.path.join(META_LOG_NAME)
    }

    fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path).map_err(|source| IngestError::OutputUnavailable {
            path: self.path.clone(),
            source,
        })
    }
}

/// Counters and output location shared across workers
#[derive(Debug)]
pub struct IngestState {
    output_root: PathBuf,
    daily: DailyDirectory,
    found_errors: u64,
    invalid_files: Vec<PathBuf>,
    seen_invalid: HashSet<PathBuf>,
    output_counter: u64,
}

impl IngestState {
    /// Create the daily directory for `today` and start with empty counters
    pub fn open(output_root: impl Into<PathBuf>, today: NaiveDate) -> Result<Self> {
        let output_root = output_root.into();
        let daily = DailyDirectory::new(&output_root, today);
        daily.ensure()?;

        tracing::info!(dir = %daily.path().display(), "Daily output directory ready");

        Ok(Self {
            output_root,
            daily,
            found_errors: 0,
            invalid_files: Vec::new(),
            seen_invalid: HashSet::new(),
            output_counter: 0,
        })
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn daily(&self) -> &DailyDirectory {
        &self.daily
    }

    pub fn found_errors(&self) -> u64 {
        self.found_errors
    }

    pub fn invalid_files(&self) -> &[PathBuf] {
        &self.invalid_files
    }

    pub fn output_counter(&self) -> u64 {
        self.output_counter
    }

    pub fn record_errors(&mut self, count: usize) {
        self.found_errors += count as u64;
    }

    /// Add a path to the invalid-file list; returns false if already listed
    pub fn record_invalid_file(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if !self.seen_invalid.insert(path.clone()) {
            return false;
        }
        self.invalid_files.push(path);
        true
    }

    /// Write `text` as the next free `Output<N>.txt` of the daily directory
    ///
    /// Taken names are skipped, never overwritten. Fails with
    /// [`IngestError::OutputUnavailable`] if the directory cannot be created.
    pub fn write_output(&mut self, text: &str) -> Result<PathBuf> {
        self.daily.ensure()?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            self.output_counter += 1;
            let target = self.daily.path().join(format!(
                "{}{}.{}",
                OUTPUT_PREFIX, self.output_counter, OUTPUT_EXTENSION
            ));

            match fsio::write_new(&target, text) {
                Ok(()) => return Ok(target),
                Err(e) if e.is_already_exists() => {
                    tracing::debug!(path = %target.display(), "Output name taken, advancing");
                },
                Err(e) => return Err(e.into()),
            }
        }

        Err(IngestError::OutputNamesExhausted {
            dir: self.daily.path().to_path_buf(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    /// Render the meta log block for the current counters
    pub fn meta_log_entry(&self) -> String {
        let mut entry = format!("found_errors: {}\ninvalid files:\n", self.found_errors);
        for path in &self.invalid_files {
            entry.push_str(&path.display().to_string());
            entry.push('\n');
        }
        entry
    }

    /// Append the current counters to the daily directory's meta log
    pub fn flush_meta_log(&self) -> Result<PathBuf> {
        self.daily.ensure()?;
        let path = self.daily.meta_log_path();
        fsio::append_text(&path, &self.meta_log_entry())?;

        tracing::info!(
            path = %path.display(),
            found_errors = self.found_errors,
            invalid_files = self.invalid_files.len(),
            "Flushed meta log"
        );
        Ok(path)
    }

    /// Date the next daily directory is labelled with
    pub fn next_label_date(&self, today: NaiveDate) -> NaiveDate {
        if today > self.daily.date() {
            today
        } else {
            self.daily.date().succ_opt().unwrap_or(today)
        }
    }

    /// Flush, reset and switch to a new daily directory
    ///
    /// The new directory is created before anything is flushed or reset. On
    /// error the state is left exactly as it was.
    pub fn rotate(&mut self, today: NaiveDate) -> Result<&DailyDirectory> {
        let next = DailyDirectory::new(&self.output_root, self.next_label_date(today));
        next.ensure()?;

        self.flush_meta_log()?;

        self.found_errors = 0;
        self.invalid_files.clear();
        self.seen_invalid.clear();
        self.output_counter = 0;
        self.daily = next;

        tracing::info!(dir = %self.daily.path().display(), "Rotated daily output directory");
        Ok(&self.daily)
    }
}
