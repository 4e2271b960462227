//! Session record, status lifecycle, and the in-memory active handle.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Lifecycle status for a work session.
///
/// Monotonic: `Active` may become `Completed`, never the reverse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session open and accepting checkpoints.
    Active,
    /// Session closed by `end`.
    Completed,
}

impl SessionStatus {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Active | Self::Completed)
        )
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Durable session record, stored as a `Session` node in the graph store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionRecord {
    /// Globally unique identifier; immutable.
    pub id: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Creation timestamp; set once.
    pub start_time: DateTime<Utc>,
    /// Completion timestamp; set once.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Last start, resume, or checkpoint.
    pub last_activity: DateTime<Utc>,
    /// Free-form user attribution.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Free-form project attribution.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Append-only narrative file; immutable after creation.
    pub log_file: PathBuf,
    /// Closing summary; set only at completion.
    #[serde(default)]
    pub summary: Option<String>,
}

impl SessionRecord {
    /// Construct a new active record.
    #[must_use]
    pub fn new(
        id: String,
        start_time: DateTime<Utc>,
        log_file: PathBuf,
        user_id: Option<String>,
        project_id: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id,
            status: SessionStatus::Active,
            start_time,
            end_time: None,
            last_activity: start_time,
            user_id,
            project_id,
            description,
            log_file,
            summary: None,
        }
    }

    /// Whether the session can still be resumed or checkpointed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Advance `last_activity`, never moving it backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity {
            self.last_activity = at;
        }
    }

    /// Flip to `Completed`, recording end time and summary.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionClosed` if the session already completed.
    pub fn complete(&mut self, end_time: DateTime<Utc>, summary: String) -> Result<()> {
        if !self.status.can_transition_to(SessionStatus::Completed) {
            return Err(AppError::SessionClosed(self.id.clone()));
        }
        self.status = SessionStatus::Completed;
        self.end_time = Some(end_time);
        self.touch(end_time);
        self.summary = Some(summary);
        Ok(())
    }
}

/// Process-local view of a session that is open in this process.
///
/// Reconstructible from the durable record plus the workspace marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSessionHandle {
    /// Session identifier.
    pub id: String,
    /// User attribution.
    pub user_id: Option<String>,
    /// Project attribution.
    pub project_id: Option<String>,
    /// Durable start time.
    pub start_time: DateTime<Utc>,
    /// Advanced on every checkpoint; monotonic.
    pub last_activity: DateTime<Utc>,
    /// Session narrative file.
    pub log_path: PathBuf,
    /// Workspace root the session is scoped to.
    pub workspace_root: PathBuf,
}

impl ActiveSessionHandle {
    /// Build a handle for a record opened in this process at `now`.
    #[must_use]
    pub fn from_record(record: &SessionRecord, workspace_root: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id.clone(),
            user_id: record.user_id.clone(),
            project_id: record.project_id.clone(),
            start_time: record.start_time,
            last_activity: now.max(record.last_activity),
            log_path: record.log_file.clone(),
            workspace_root,
        }
    }
}

/// Short summary of a prior session, returned as recent context by `start`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecentSession {
    /// Session identifier.
    pub id: String,
    /// When the session record was created.
    pub date: DateTime<Utc>,
    /// Closing summary, else description, else a placeholder.
    pub summary: String,
    /// Status at query time.
    pub status: SessionStatus,
}

impl From<&SessionRecord> for RecentSession {
    fn from(record: &SessionRecord) -> Self {
        let summary = record
            .summary
            .clone()
            .or_else(|| record.description.clone())
            .unwrap_or_else(|| "No summary".into());
        Self {
            id: record.id.clone(),
            date: record.start_time,
            summary,
            status: record.status,
        }
    }
}
