//! Per-file processing state machine
//!
//! ```text
//! Discovered -> Read -> LineValidated -> Serialized -> Written -> Retired
//! ```
//!
//! Any stage may end the walk early. The source is retired only after its
//! output file exists in full, so a failed write always leaves the source in
//! place for the next scan. A file with no valid records is never retired:
//! it is listed as invalid and left where it is until its contents change.
//!
//! A file's rejected lines are counted once per version of the file, no
//! matter how often a failed write or retirement makes it come round again.

use crate::error::{IngestError, Result};
use crate::scanner::FileEntry;
use crate::serializer::BatchSerializer;
use crate::state::SharedState;
use crate::state::with_state_blocking;
use payflow_common::fsio;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// Rename attempts per retirement before giving up
const MAX_RETIRE_ATTEMPTS: u32 = 1024;

/// Last stage a file reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileStage {
    Discovered,
    Read,
    LineValidated,
    Serialized,
    Written,
    Retired,
}

/// Why a file left the state machine before `Retired`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable(String),
    NoValidRecords,
    /// Already found without valid records and not modified since
    Unchanged,
    WriteFailed(String),
    RetireFailed(String),
}

/// What became of the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retirement {
    Deleted,
    Renamed(PathBuf),
}

/// How processed sources are taken out of the inbound directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetireMode {
    Delete,
    /// Rename in place to `<marker><N><ext>`
    #[default]
    Rename,
}

impl FromStr for RetireMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "delete" => Ok(RetireMode::Delete),
            "rename" => Ok(RetireMode::Rename),
            other => Err(IngestError::config(format!(
                "Invalid retire mode '{}': expected rename or delete",
                other
            ))),
        }
    }
}

/// Report for one processed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub reached: FileStage,
    pub skip: Option<SkipReason>,
    pub output: Option<PathBuf>,
    pub retirement: Option<Retirement>,
    /// Records written to the output file
    pub accepted: usize,
    /// Lines failing the record grammar
    pub rejected: usize,
    /// Valid lines whose extraction failed
    pub dropped: usize,
}

impl FileOutcome {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            reached: FileStage::Discovered,
            skip: None,
            output: None,
            retirement: None,
            accepted: 0,
            rejected: 0,
            dropped: 0,
        }
    }

    fn skipped(mut self, reason: SkipReason) -> Self {
        self.skip = Some(reason);
        self
    }

    pub fn is_retired(&self) -> bool {
        self.retirement.is_some()
    }
}

/// Deletes or renames processed sources
#[derive(Debug)]
pub struct Retirer {
    mode: RetireMode,
    marker: String,
    counter: u64,
}

impl Retirer {
    pub fn new(mode: RetireMode, marker: impl Into<String>) -> Self {
        Self {
            mode,
            marker: marker.into(),
            counter: 0,
        }
    }

    pub fn mode(&self) -> RetireMode {
        self.mode
    }

    pub fn retire(&mut self, path: &Path) -> Result<Retirement> {
        match self.mode {
            RetireMode::Delete => {
                std::fs::remove_file(path)?;
                Ok(Retirement::Deleted)
            },
            RetireMode::Rename => self.rename(path).map(Retirement::Renamed),
        }
    }

    /// Link under the next free marker name, then drop the old name
    fn rename(&mut self, path: &Path) -> Result<PathBuf> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        for _ in 0..MAX_RETIRE_ATTEMPTS {
            self.counter += 1;
            let target = dir.join(format!("{}{}{}", self.marker, self.counter, ext));

            match std::fs::hard_link(path, &target) {
                Ok(()) => {
                    std::fs::remove_file(path)?;
                    return Ok(target);
                },
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(IngestError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free retirement name in {}", dir.display()),
        )))
    }
}

/// Size and modification time of a source, used to notice edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Runs eligible files through read, validate, serialize, write and retire
pub struct FileLifecycleManager {
    serializer: BatchSerializer,
    retirer: Retirer,
    state: SharedState,
    /// Written but not yet retired; their errors are already counted
    charged: HashMap<PathBuf, Fingerprint>,
    /// No valid records; left in place and skipped until modified
    parked: HashMap<PathBuf, Fingerprint>,
}

impl FileLifecycleManager {
    pub fn new(serializer: BatchSerializer, retirer: Retirer, state: SharedState) -> Self {
        Self {
            serializer,
            retirer,
            state,
            charged: HashMap::new(),
            parked: HashMap::new(),
        }
    }

    /// Drop bookkeeping for sources that left the inbound directory
    pub fn forget_missing(&mut self, present: &[FileEntry]) {
        let present: HashSet<&Path> = present.iter().map(|e| e.path.as_path()).collect();
        self.charged.retain(|path, _| present.contains(path.as_path()));
        self.parked.retain(|path, _| present.contains(path.as_path()));
    }

    /// Process one eligible file
    ///
    /// Per-file failures are reported in the outcome. Only an error that
    /// makes the output root unusable is returned as `Err`.
    pub async fn process(&mut self, entry: &FileEntry) -> Result<FileOutcome> {
        let path = entry.path.as_path();
        let mut outcome = FileOutcome::new(path);

        let fingerprint = match Fingerprint::of(path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to stat file, leaving in place");
                return Ok(outcome.skipped(SkipReason::Unreadable(e.to_string())));
            },
        };

        if self.parked.get(path) == Some(&fingerprint) {
            tracing::trace!(path = %path.display(), "File still has no valid records");
            return Ok(outcome.skipped(SkipReason::Unchanged));
        }
        self.parked.remove(path);

        let text = match fsio::read_text(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read file, leaving in place");
                return Ok(outcome.skipped(SkipReason::Unreadable(e.to_string())));
            },
        };
        outcome.reached = FileStage::Read;

        let batch = self.serializer.extractor().partition(&text);
        outcome.rejected = batch.rejected;
        outcome.reached = FileStage::LineValidated;

        let serialized = match self.serializer.serialize_batch(batch.valid.as_slice()) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to serialize batch");
                return Ok(outcome.skipped(SkipReason::WriteFailed(e.to_string())));
            },
        };
        outcome.accepted = serialized.records;
        outcome.dropped = serialized.dropped.len();
        outcome.reached = FileStage::Serialized;

        let errors = if self.charged.get(path) == Some(&fingerprint) {
            0
        } else {
            outcome.rejected + outcome.dropped
        };

        if serialized.is_empty() {
            {
                let mut state = self.state.lock().await;
                state.record_errors(errors);
                state.record_invalid_file(path);
            }
            self.charged.remove(path);
            self.parked.insert(path.to_path_buf(), fingerprint);
            tracing::warn!(path = %path.display(), "No valid records in file, leaving in place");
            return Ok(outcome.skipped(SkipReason::NoValidRecords));
        }

        let text = serialized.text;
        let written = with_state_blocking(&self.state, move |state| {
            let output = state.write_output(&text)?;
            state.record_errors(errors);
            Ok(output)
        })
        .await;

        match written {
            Ok(output) => {
                tracing::info!(
                    path = %path.display(),
                    output = %output.display(),
                    records = outcome.accepted,
                    rejected = outcome.rejected,
                    dropped = outcome.dropped,
                    "Wrote output file"
                );
                self.charged.insert(path.to_path_buf(), fingerprint);
                outcome.output = Some(output);
                outcome.reached = FileStage::Written;
            },
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write output, leaving source in place");
                return Ok(outcome.skipped(SkipReason::WriteFailed(e.to_string())));
            },
        }

        let outcome = self.retire(outcome);
        if outcome.is_retired() {
            self.charged.remove(path);
        }
        Ok(outcome)
    }

    fn retire(&mut self, mut outcome: FileOutcome) -> FileOutcome {
        match self.retirer.retire(&outcome.path) {
            Ok(retirement) => {
                tracing::debug!(path = %outcome.path.display(), ?retirement, "Retired source file");
                outcome.retirement = Some(retirement);
                outcome.reached = FileStage::Retired;
                outcome
            },
            Err(e) => {
                tracing::warn!(path = %outcome.path.display(), error = %e, "Failed to retire source file");
                outcome.skipped(SkipReason::RetireFailed(e.to_string()))
            },
        }
    }
}
