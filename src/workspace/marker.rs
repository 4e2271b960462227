//! Durable pointer to the session currently open for a workspace root.
//!
//! The marker is a single-line file holding a session id. It survives
//! process restarts and lets a later `start` resume the same session.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{AppError, Result};

/// Reads and writes one workspace marker file.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the marker file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Session id named by the marker, or `None` when absent or blank.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be read.
    pub fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let id = raw.trim();
                Ok((!id.is_empty()).then(|| id.to_owned()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::Io(format!(
                "failed to read marker {}: {err}",
                self.path.display()
            ))),
        }
    }

    /// Point the marker at `session_id`.
    ///
    /// Writes a sibling temp file and renames it over the marker so readers
    /// never observe a partial id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory, temp file, or rename fails.
    pub fn write(&self, session_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::Io(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let tmp = self.path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp, format!("{session_id}\n"))
            .map_err(|err| AppError::Io(format!("failed to write marker: {err}")))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            AppError::Io(format!("failed to replace marker: {err}"))
        })?;
        debug!(session_id, path = %self.path.display(), "marker written");
        Ok(())
    }

    /// Delete the marker. Absent is fine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Io(format!("failed to remove marker: {err}"))),
        }
    }

    /// Delete the marker only when it names `session_id`.
    ///
    /// Returns the id of a different owner when the marker was left intact.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if reading or removing fails.
    pub fn clear_if(&self, session_id: &str) -> Result<Option<String>> {
        match self.read()? {
            Some(owner) if owner != session_id => Ok(Some(owner)),
            Some(_) => {
                self.clear()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
