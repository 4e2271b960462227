//! Session identity resolution for `start`.
//!
//! The orchestrator gathers evidence (explicit id lookup, or marker plus
//! lookup), then [`resolve`] decides deterministically what to do.

use serde::Serialize;

use crate::models::session::SessionRecord;
use crate::persistence::session_repo::SessionLookup;
use crate::{AppError, Result};

/// What `start` learned before deciding.
#[derive(Debug)]
pub enum Evidence {
    /// Caller named a session id.
    Explicit {
        /// Requested id.
        id: String,
        /// Durable store answer.
        lookup: SessionLookup,
    },
    /// No explicit id; the workspace marker named one.
    Marker {
        /// Id read from the marker.
        id: String,
        /// Durable store answer.
        lookup: SessionLookup,
    },
    /// No explicit id and no marker.
    NoMarker,
}

/// Decision taken by [`resolve`].
#[derive(Debug)]
pub enum ResolutionOutcome {
    /// Mint a fresh session.
    New,
    /// Resume the explicitly requested session.
    ResumedExplicit(SessionRecord),
    /// Resume the session named by the marker.
    ResumedFromMarker(SessionRecord),
    /// The explicitly requested id does not exist.
    ExplicitNotFound(String),
}

/// How a started session was obtained, reported to callers.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Fresh session.
    New,
    /// Resumed by explicit id.
    ResumedExplicit,
    /// Resumed through the workspace marker.
    ResumedFromMarker,
}

/// Outcome plus the soft failures that led to it.
#[derive(Debug)]
pub struct Resolution {
    /// Decision.
    pub outcome: ResolutionOutcome,
    /// Reasons a marker was ignored.
    pub warnings: Vec<String>,
}

impl Resolution {
    fn clean(outcome: ResolutionOutcome) -> Self {
        Self {
            outcome,
            warnings: Vec::new(),
        }
    }

    fn fallback(reason: String) -> Self {
        Self {
            outcome: ResolutionOutcome::New,
            warnings: vec![reason],
        }
    }
}

/// Decide between resuming and starting fresh.
///
/// Explicit ids are a hard request; marker ids are a hint that degrades
/// to a new session when stale, closed, or unverifiable.
///
/// # Errors
///
/// Returns the store error when an explicit lookup was unavailable, or
/// `AppError::SessionClosed` when an explicit id names a completed session.
pub fn resolve(evidence: Evidence) -> Result<Resolution> {
    match evidence {
        Evidence::Explicit { id, lookup } => match lookup {
            SessionLookup::Found(record) if record.is_active() => {
                Ok(Resolution::clean(ResolutionOutcome::ResumedExplicit(record)))
            }
            SessionLookup::Found(record) => Err(AppError::SessionClosed(record.id)),
            SessionLookup::Missing => Ok(Resolution::clean(ResolutionOutcome::ExplicitNotFound(id))),
            SessionLookup::Unavailable(err) => Err(err),
        },
        Evidence::Marker { id, lookup } => match lookup {
            SessionLookup::Found(record) if record.is_active() => {
                Ok(Resolution::clean(ResolutionOutcome::ResumedFromMarker(record)))
            }
            SessionLookup::Found(_) => Ok(Resolution::fallback(format!(
                "marker names completed session {id}; starting new session"
            ))),
            SessionLookup::Missing => Ok(Resolution::fallback(format!(
                "marker names unknown session {id}; starting new session"
            ))),
            SessionLookup::Unavailable(err) => Ok(Resolution::fallback(format!(
                "could not verify marker session {id} ({err}); starting new session"
            ))),
        },
        Evidence::NoMarker => Ok(Resolution::clean(ResolutionOutcome::New)),
    }
}
