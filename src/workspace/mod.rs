//! Per-workspace local state: layout, marker, start lock, and context
//! documents.

pub mod context_loader;
pub mod marker;
pub mod path_safety;
pub mod start_lock;

use std::path::{Path, PathBuf};

/// Directory holding all local session state inside a workspace root.
pub const CONTEXT_DIR: &str = ".context";

/// Resolves the fixed file layout under a workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The workspace root itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/.context`
    #[must_use]
    pub fn context_dir(&self) -> PathBuf {
        self.root.join(CONTEXT_DIR)
    }

    /// `<root>/.context/.session_marker`
    #[must_use]
    pub fn marker_file(&self) -> PathBuf {
        self.context_dir().join(".session_marker")
    }

    /// `<root>/.context/memories/session_logs`
    #[must_use]
    pub fn session_logs_dir(&self) -> PathBuf {
        self.context_dir().join("memories").join("session_logs")
    }

    /// `<root>/.context/CANONICAL.md`
    #[must_use]
    pub fn canonical_digest(&self) -> PathBuf {
        self.context_dir().join("CANONICAL.md")
    }

    /// `<root>/.context/.session_start.lock`
    #[must_use]
    pub fn start_lock_file(&self) -> PathBuf {
        self.context_dir().join(".session_start.lock")
    }
}
