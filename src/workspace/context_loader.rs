//! Plain-file context documents read from an ordered list of roots.

use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::debug;

use super::path_safety::resolve_within;
use super::CONTEXT_DIR;
use crate::{AppError, Result};

/// Reads context documents by relative path.
pub trait ContextLoader: Send + Sync {
    /// First candidate root holding `relative_path`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if a file exists but cannot be read.
    fn read(
        &self,
        workspace_root: &Path,
        relative_path: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>>;
}

/// Loader searching `.context`, `.framework`, `.framework/protocols` under
/// the workspace root, then any extra roots.
#[derive(Debug, Clone, Default)]
pub struct FsContextLoader {
    extra_roots: Vec<PathBuf>,
}

impl FsContextLoader {
    /// Loader that also searches `extra_roots`, in order.
    #[must_use]
    pub fn new(extra_roots: Vec<PathBuf>) -> Self {
        Self { extra_roots }
    }

    /// Candidate roots for a workspace, in search order.
    #[must_use]
    pub fn candidate_roots(&self, workspace_root: &Path) -> Vec<PathBuf> {
        let mut roots = vec![
            workspace_root.join(CONTEXT_DIR),
            workspace_root.join(".framework"),
            workspace_root.join(".framework").join("protocols"),
        ];
        roots.extend(self.extra_roots.iter().cloned());
        roots
    }

    fn read_sync(&self, workspace_root: &Path, relative_path: &str) -> Result<Option<String>> {
        for root in self.candidate_roots(workspace_root) {
            let path = match resolve_within(&root, relative_path) {
                Ok(path) => path,
                Err(err) => {
                    debug!(root = %root.display(), %err, "skipping candidate root");
                    continue;
                }
            };
            if path.is_dir() {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => return Ok(Some(content)),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(AppError::Io(format!(
                        "failed to read {}: {err}",
                        path.display()
                    )))
                }
            }
        }
        Ok(None)
    }
}

impl ContextLoader for FsContextLoader {
    fn read(
        &self,
        workspace_root: &Path,
        relative_path: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>> {
        let workspace_root = workspace_root.to_path_buf();
        let relative_path = relative_path.to_owned();
        Box::pin(async move { self.read_sync(&workspace_root, &relative_path) })
    }
}
