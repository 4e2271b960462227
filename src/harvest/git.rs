//! `git` CLI harvester.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use super::{HarvestOutcome, Harvester};
use crate::config::HarvestConfig;
use crate::{AppError, Result};

/// Pathspecs for the whole repository minus this process's own local
/// state: the store and its WAL files, the marker, and the start lock.
const HARVEST_PATHSPECS: &[&str] = &[
    ":/",
    ":(exclude).context/chronicle.db*",
    ":(exclude).context/.session_marker*",
    ":(exclude).context/.session_start.lock*",
];

/// Harvester shelling out to `git` in the workspace root.
#[derive(Debug, Clone)]
pub struct GitHarvester {
    push: bool,
    timeout: Duration,
}

impl GitHarvester {
    /// Harvester honoring the `[harvest]` settings.
    #[must_use]
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            push: config.push,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    async fn git(&self, repo_root: &Path, args: &[&str]) -> Result<Output> {
        let run = Command::new("git")
            .args(args)
            .current_dir(repo_root)
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(AppError::Harvest(format!("failed to run git: {err}"))),
            Err(_) => Err(AppError::Harvest(format!(
                "git {} timed out after {}s",
                args.first().copied().unwrap_or_default(),
                self.timeout.as_secs()
            ))),
        }
    }

    async fn git_ok(&self, repo_root: &Path, args: &[&str]) -> Result<String> {
        let output = self.git(repo_root, args).await?;
        if !output.status.success() {
            return Err(AppError::Harvest(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn harvest(&self, repo_root: &Path, message: &str) -> Result<HarvestOutcome> {
        let pending = self
            .git_ok(repo_root, &with_pathspecs(&["status", "--porcelain"]))
            .await?;
        if pending.trim().is_empty() {
            info!(root = %repo_root.display(), "nothing to harvest");
            return Ok(HarvestOutcome::default());
        }

        self.git_ok(repo_root, &with_pathspecs(&["add", "-A"])).await?;
        self.git_ok(repo_root, &["commit", "-m", message]).await?;
        info!(root = %repo_root.display(), "harvest committed");

        let pushed = if self.push {
            match self.git_ok(repo_root, &["push"]).await {
                Ok(_) => true,
                Err(err) => {
                    warn!(%err, "harvest push failed");
                    false
                }
            }
        } else {
            false
        };

        Ok(HarvestOutcome {
            committed: true,
            pushed,
        })
    }
}

fn with_pathspecs<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut full = args.to_vec();
    full.push("--");
    full.extend_from_slice(HARVEST_PATHSPECS);
    full
}

impl Harvester for GitHarvester {
    fn commit_and_push<'a>(
        &'a self,
        repo_root: &'a Path,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<HarvestOutcome>> + Send + 'a>> {
        Box::pin(self.harvest(repo_root, message))
    }
}
