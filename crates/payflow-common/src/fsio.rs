//! Whole-file I/O primitives
//!
//! Inbound files are read in one piece and output files are published in one
//! piece: [`write_new`] stages the text next to the target and links it into
//! place, so the target either appears complete or not at all, and an
//! existing file is never replaced.

use crate::error::{PayflowError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Read a whole file as text
///
/// Invalid UTF-8 sequences are replaced rather than rejected, and a leading
/// byte order mark is dropped.
pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let bytes = fs::read(path.as_ref())?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(&text).to_string())
}

/// Write text to a path that must not exist yet
///
/// Returns [`PayflowError::AlreadyExists`] when the target is taken. The data
/// is synced to disk before the target name becomes visible.
pub fn write_new(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let target = path.as_ref();
    if target.exists() {
        return Err(PayflowError::AlreadyExists(target.to_path_buf()));
    }

    let staging = staging_path(target)?;
    let result = stage_and_link(&staging, target, contents);

    if let Err(e) = fs::remove_file(&staging) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %staging.display(), error = %e, "Failed to remove staging file");
        }
    }

    result
}

/// Append text to a file, creating it if needed
pub fn append_text(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    file.write_all(contents.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

fn staging_path(target: &Path) -> Result<PathBuf> {
    let file_name = target
        .file_name()
        .ok_or_else(|| PayflowError::InvalidPath(target.to_path_buf()))?;
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok(dir.join(format!(
        ".{}.{}.partial",
        file_name.to_string_lossy(),
        std::process::id()
    )))
}

fn stage_and_link(staging: &Path, target: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(staging)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    // hard_link fails instead of replacing an existing target
    match fs::hard_link(staging, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(PayflowError::AlreadyExists(target.to_path_buf()))
        },
        Err(e) => Err(e.into()),
    }
}
