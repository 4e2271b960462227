//! Closing artifacts and activity evidence linked to a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Typed, directed relationship from a session to another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    /// Session → Decision.
    MadeDecision,
    /// Session → Task.
    IdentifiedTask,
    /// Session → Activity.
    Performed,
    /// Session → `LogChunk`.
    HasCheckpoint,
}

impl RelationType {
    /// Edge type string stored in the graph.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MadeDecision => "MADE_DECISION",
            Self::IdentifiedTask => "IDENTIFIED_TASK",
            Self::Performed => "PERFORMED",
            Self::HasCheckpoint => "HAS_CHECKPOINT",
        }
    }
}

/// A decision recorded when a session ends. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Decision {
    /// Unique identifier.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Decision text.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Decision {
    /// Construct a decision with a generated identifier.
    #[must_use]
    pub fn new(session_id: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            content,
            created_at: Utc::now(),
        }
    }
}

/// Task progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Identified but not started.
    Pending,
}

/// A next step identified when a session ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Task {
    /// Unique identifier.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Task text.
    pub content: String,
    /// Always `Pending` at creation.
    pub status: TaskStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Construct a pending task with a generated identifier.
    #[must_use]
    pub fn new(session_id: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            content,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Classification of recorded session activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Semantic, keyword, or web search.
    Search,
    /// Reading or research without a search query.
    Research,
    /// A file in the workspace was created or changed.
    FileModification,
    /// Anything else worth recording.
    Other,
}

impl ActivityKind {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Research => "research",
            Self::FileModification => "file_modification",
            Self::Other => "other",
        }
    }
}

/// Evidence of something the agent did during a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Activity {
    /// Unique identifier.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Classification.
    pub kind: ActivityKind,
    /// Free-form detail (query text, file path, ...).
    pub detail: String,
    /// When the activity was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl Activity {
    /// Construct an activity with a generated identifier.
    #[must_use]
    pub fn new(session_id: String, kind: ActivityKind, detail: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            kind,
            detail,
            recorded_at: Utc::now(),
        }
    }
}

/// Identifier and text of an artifact created at session end.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Node identifier.
    pub id: String,
    /// Artifact text.
    pub content: String,
}
