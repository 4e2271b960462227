//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::workspace::WorkspacePaths;
use crate::{AppError, Result};

/// Environment variable naming the fallback workspace root.
pub const PROJECT_ROOT_ENV: &str = "PROJECT_ROOT";

/// Durable store call limits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    /// Per-call timeout for durable store operations.
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
    /// How long `start` waits for another `start` on the same root.
    #[serde(default = "default_start_lock_wait")]
    pub start_lock_wait_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_store_timeout(),
            start_lock_wait_seconds: default_start_lock_wait(),
        }
    }
}

/// Ambient context documents loaded when a session starts.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ContextConfig {
    /// Relative path of the project state document.
    #[serde(default = "default_project_state")]
    pub project_state: String,
    /// Relative path of the core identity document.
    #[serde(default = "default_core_identity")]
    pub core_identity: String,
    /// Additional roots searched after the workspace's own directories.
    #[serde(default)]
    pub extra_roots: Vec<PathBuf>,
    /// Number of project-state characters copied into a new log header.
    #[serde(default = "default_preview_chars")]
    pub project_state_preview_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            project_state: default_project_state(),
            core_identity: default_core_identity(),
            extra_roots: Vec::new(),
            project_state_preview_chars: default_preview_chars(),
        }
    }
}

/// Advisory checks run on every quicksave.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ComplianceConfig {
    /// Master switch for all checks.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Warn when no search or research activity was recorded.
    #[serde(default = "default_true")]
    pub research_evidence: bool,
    /// Warn when the summary claims work without file modifications.
    #[serde(default = "default_true")]
    pub action_integrity: bool,
    /// Past-tense verbs that mark a summary as claiming completed work.
    #[serde(default = "default_action_verbs")]
    pub action_verbs: Vec<String>,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            research_evidence: true,
            action_integrity: true,
            action_verbs: default_action_verbs(),
        }
    }
}

/// Version-control harvest at session end.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HarvestConfig {
    /// Whether to stage, commit, and push when a session ends.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Push after a successful commit.
    #[serde(default = "default_true")]
    pub push: bool,
    /// Commit message prefix.
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,
    /// Summary characters kept in the commit message.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
    /// Timeout applied to each git invocation.
    #[serde(default = "default_harvest_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            push: true,
            message_prefix: default_message_prefix(),
            summary_max_chars: default_summary_max_chars(),
            timeout_seconds: default_harvest_timeout(),
        }
    }
}

/// Embedding service used for background indexing and vector search.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// Disabled by default; enabling requires a reachable endpoint.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the embedding server.
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Request timeout.
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            timeout_seconds: default_embedding_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_store_timeout() -> u64 {
    10
}

fn default_start_lock_wait() -> u64 {
    30
}

fn default_project_state() -> String {
    "project_state.md".into()
}

fn default_core_identity() -> String {
    "modules/Core_Identity.md".into()
}

fn default_preview_chars() -> usize {
    500
}

fn default_action_verbs() -> Vec<String> {
    ["created", "updated", "refactored", "fixed", "implemented"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_message_prefix() -> String {
    "feat(session): ".into()
}

fn default_summary_max_chars() -> usize {
    50
}

fn default_harvest_timeout() -> u64 {
    60
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "bge-m3".into()
}

fn default_embedding_timeout() -> u64 {
    10
}

fn default_recent_context_limit() -> usize {
    5
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Workspace root used when a request does not name one.
    pub default_workspace_root: PathBuf,
    /// `SQLite` file backing the durable store.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Number of prior sessions returned as recent context.
    #[serde(default = "default_recent_context_limit")]
    pub recent_context_limit: usize,
    /// Durable store limits.
    #[serde(default)]
    pub store: StoreConfig,
    /// Context documents.
    #[serde(default)]
    pub context: ContextConfig,
    /// Quicksave compliance checks.
    #[serde(default)]
    pub compliance: ComplianceConfig,
    /// Session-end harvest.
    #[serde(default)]
    pub harvest: HarvestConfig,
    /// Optional embedding service.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration for a workspace root, without a config file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the root does not exist.
    pub fn for_workspace(root: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self {
            default_workspace_root: root.into(),
            db_path: None,
            recent_context_limit: default_recent_context_limit(),
            store: StoreConfig::default(),
            context: ContextConfig::default(),
            compliance: ComplianceConfig::default(),
            harvest: HarvestConfig::default(),
            embedding: EmbeddingConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration from the command line and environment.
    ///
    /// Precedence for the workspace root: `workspace`, then the config
    /// file, then `PROJECT_ROOT`, then the current directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be loaded or the chosen
    /// root does not exist.
    pub fn resolve(config_path: Option<&Path>, workspace: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            let mut config = Self::load_from_path(path)?;
            if let Some(ws) = workspace {
                config.default_workspace_root = ws
                    .canonicalize()
                    .map_err(|err| AppError::Config(format!("invalid workspace override: {err}")))?;
            }
            return Ok(config);
        }

        let root = match workspace {
            Some(ws) => ws.to_path_buf(),
            None => match std::env::var_os(PROJECT_ROOT_ENV) {
                Some(root) if !root.is_empty() => PathBuf::from(root),
                _ => std::env::current_dir()
                    .map_err(|err| AppError::Config(format!("cannot resolve current dir: {err}")))?,
            },
        };
        Self::for_workspace(root)
    }

    /// Absolute path to the default workspace root.
    #[must_use]
    pub fn default_workspace_root(&self) -> &Path {
        &self.default_workspace_root
    }

    /// Path of the `SQLite` database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            WorkspacePaths::new(&self.default_workspace_root)
                .context_dir()
                .join("chronicle.db")
        })
    }

    /// Durable store call timeout.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_seconds)
    }

    /// Maximum wait for the per-workspace start lock.
    #[must_use]
    pub fn start_lock_wait(&self) -> Duration {
        Duration::from_secs(self.store.start_lock_wait_seconds)
    }

    fn validate(&mut self) -> Result<()> {
        if self.store.timeout_seconds == 0 {
            return Err(AppError::Config(
                "store.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.harvest.timeout_seconds == 0 {
            return Err(AppError::Config(
                "harvest.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.compliance.action_integrity
            && self
                .compliance
                .action_verbs
                .iter()
                .all(|verb| verb.trim().is_empty())
        {
            return Err(AppError::Config(
                "compliance.action_verbs must not be empty when action_integrity is on".into(),
            ));
        }

        if self.embedding.enabled
            && !(self.embedding.endpoint.starts_with("http://")
                || self.embedding.endpoint.starts_with("https://"))
        {
            return Err(AppError::Config(
                "embedding.endpoint must be an http(s) URL".into(),
            ));
        }

        let canonical_root = self
            .default_workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("default_workspace_root invalid: {err}")))?;
        self.default_workspace_root = canonical_root;

        Ok(())
    }
}
