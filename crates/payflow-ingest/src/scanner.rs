//! Inbound directory scanning

use crate::error::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A regular file found in the inbound directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Lowercased extension without the dot
    pub extension: Option<String>,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        Self { path, extension }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Files of one scan, sorted by path
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub eligible: Vec<FileEntry>,
    pub ineligible: Vec<FileEntry>,
}

/// Classifies inbound files by extension and retired-name marker
///
/// Subdirectories are not entries and are skipped silently.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    extensions: BTreeSet<String>,
    retired_marker: String,
}

impl DirectoryScanner {
    /// `extensions` may be given with or without a leading dot, in any case
    pub fn new<I, S>(extensions: I, retired_marker: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            extensions,
            retired_marker: retired_marker.into(),
        }
    }

    /// Eligible: allowed extension, and the name does not carry the marker
    pub fn is_eligible(&self, entry: &FileEntry) -> bool {
        let allowed = entry
            .extension
            .as_ref()
            .is_some_and(|ext| self.extensions.contains(ext));

        allowed && !entry.file_name().contains(&self.retired_marker)
    }

    /// List `dir` and partition its files
    pub fn scan(&self, dir: &Path) -> Result<ScanResult> {
        let mut result = ScanResult::default();

        for dirent in std::fs::read_dir(dir)? {
            let dirent = dirent?;
            if !dirent.file_type()?.is_file() {
                continue;
            }

            let entry = FileEntry::new(dirent.path());
            if self.is_eligible(&entry) {
                result.eligible.push(entry);
            } else {
                result.ineligible.push(entry);
            }
        }

        result.eligible.sort();
        result.ineligible.sort();

        tracing::debug!(
            dir = %dir.display(),
            eligible = result.eligible.len(),
            ineligible = result.ineligible.len(),
            "Scanned inbound directory"
        );

        Ok(result)
    }
}
