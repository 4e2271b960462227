//! Version-control harvest run when a session ends.

pub mod git;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::Serialize;

use crate::narrative::format::preview;
use crate::Result;

pub use git::GitHarvester;

/// What a harvest achieved.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct HarvestOutcome {
    /// A commit was created.
    pub committed: bool,
    /// The commit reached the remote.
    pub pushed: bool,
}

/// Stages, commits, and pushes pending changes.
pub trait Harvester: Send + Sync {
    /// Commit everything pending in `repo_root` with `message`, then push.
    ///
    /// Returns a default (all `false`) outcome when there is nothing to
    /// commit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Harvest` if staging or committing fails.
    fn commit_and_push<'a>(
        &'a self,
        repo_root: &'a Path,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<HarvestOutcome>> + Send + 'a>>;
}

/// Commit message derived from a session summary.
#[must_use]
pub fn harvest_message(prefix: &str, summary: &str, max_chars: usize) -> String {
    format!("{prefix}{} [Session Harvest]", preview(summary.trim(), max_chars))
}
