//! Append-only session narrative file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::format::{log_file_name, short_id};
use crate::{AppError, Result};

/// Handle to one session's log file.
///
/// The file is created exactly once and only ever appended to afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Deterministic log path for a session started on `date`.
    #[must_use]
    pub fn path_for(logs_dir: &Path, date: NaiveDate, session_id: &str) -> PathBuf {
        logs_dir.join(log_file_name(date, session_id))
    }

    /// Create the log with its header. Never overwrites an existing file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::LogIo` if the directory cannot be created, the file
    /// already exists, or the header cannot be written.
    pub fn create(path: PathBuf, header: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::LogIo(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|err| {
                AppError::LogIo(format!("failed to create {}: {err}", path.display()))
            })?;
        file.write_all(header.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| AppError::LogIo(format!("failed to write header: {err}")))?;
        Ok(Self { path })
    }

    /// Handle to an existing log; no I/O.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        Self { path }
    }

    /// Find a session's log in `logs_dir` by file name.
    ///
    /// A name containing the full id wins; otherwise the first name
    /// containing the eight-character id fragment is used.
    #[must_use]
    pub fn locate(logs_dir: &Path, session_id: &str) -> Option<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(logs_dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let fragment = short_id(session_id);
        paths
            .iter()
            .find(|path| file_name(path).contains(session_id))
            .or_else(|| {
                paths
                    .iter()
                    .find(|path| !fragment.is_empty() && file_name(path).contains(fragment))
            })
            .map(|path| Self::open(path.clone()))
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text`. Fails rather than recreating a missing file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::LogIo` if the file is missing or the write fails.
    pub fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|err| {
                AppError::LogIo(format!("failed to open {}: {err}", self.path.display()))
            })?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| {
                AppError::LogIo(format!("failed to append {}: {err}", self.path.display()))
            })
    }

    /// Current size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::LogIo` if the file metadata cannot be read.
    pub fn byte_len(&self) -> Result<u64> {
        fs::metadata(&self.path)
            .map(|meta| meta.len())
            .map_err(|err| AppError::LogIo(format!("failed to stat log: {err}")))
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or_default()
}
