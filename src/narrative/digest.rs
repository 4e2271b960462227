//! Cross-session canonical digest.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{AppError, Result};

/// Append-only digest receiving one entry per completed session.
#[derive(Debug, Clone)]
pub struct CanonicalDigest {
    path: PathBuf,
}

impl CanonicalDigest {
    /// Digest stored at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the digest file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry`, creating the file and its parents when absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be opened or written.
    pub fn append(&self, entry: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| AppError::Io(format!("failed to create digest dir: {err}")))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| AppError::Io(format!("failed to open digest: {err}")))?;
        file.write_all(entry.as_bytes())
            .map_err(|err| AppError::Io(format!("failed to append digest: {err}")))
    }
}
