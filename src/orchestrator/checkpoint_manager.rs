//! Mid-session quicksave with advisory compliance checks.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::indexing::Indexer;
use crate::models::outcome::StepLedger;
use crate::narrative::format;
use crate::narrative::writer::SessionLog;
use crate::persistence::session_repo::SessionRepo;
use crate::{AppError, Result};

use super::compliance::{CheckContext, CompliancePredicate};
use super::registry::SessionRegistry;

/// Inputs to [`CheckpointService::quicksave`].
#[derive(Debug, Clone, Default)]
pub struct QuicksaveParams {
    /// Checkpoint summary.
    pub summary: String,
    /// Optional bullet points.
    pub bullets: Vec<String>,
    /// Target session; defaults to the most recently active one.
    pub session_id: Option<String>,
}

/// Result of [`CheckpointService::quicksave`].
#[derive(Debug, Clone, Serialize)]
pub struct QuicksaveOutcome {
    /// Always `saved`.
    pub status: &'static str,
    /// Session checkpointed.
    pub session_id: String,
    /// Session narrative file.
    pub log_path: PathBuf,
    /// Compliance warnings, then any degraded steps.
    pub warnings: Vec<String>,
}

/// Appends checkpoints to the current session's log.
pub struct CheckpointService {
    registry: Arc<SessionRegistry>,
    sessions: SessionRepo,
    predicates: Vec<Box<dyn CompliancePredicate>>,
    indexer: Option<Indexer>,
}

impl CheckpointService {
    /// Service evaluating `predicates` on every checkpoint.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        sessions: SessionRepo,
        predicates: Vec<Box<dyn CompliancePredicate>>,
        indexer: Option<Indexer>,
    ) -> Self {
        Self {
            registry,
            sessions,
            predicates,
            indexer,
        }
    }

    /// Checkpoint the active session.
    ///
    /// Never starts a session implicitly.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` if no matching session is open in
    /// this process.
    pub async fn quicksave(&self, params: QuicksaveParams) -> Result<QuicksaveOutcome> {
        let handle = self
            .registry
            .get(params.session_id.as_deref())
            .ok_or(AppError::NoActiveSession)?;
        let span = info_span!("quicksave", session_id = %handle.id);

        async move {
            let now = Utc::now();
            self.registry.touch_at(&handle.id, now);

            let mut ledger = StepLedger::new();
            ledger.soft("persist activity", self.sessions.touch(&handle.id, now).await);

            let compliance = self
                .evaluate(CheckContext {
                    session_id: &handle.id,
                    summary: &params.summary,
                })
                .await;

            let log = SessionLog::open(handle.log_path.clone());
            ledger.soft(
                "append quicksave",
                log.append(&format::quicksave_entry(
                    now,
                    &params.summary,
                    &params.bullets,
                    &compliance,
                )),
            );

            if let Some(ref indexer) = self.indexer {
                let mut text = params.summary.clone();
                for bullet in &params.bullets {
                    text.push('\n');
                    text.push_str(bullet);
                }
                indexer.spawn_index(handle.id.clone(), text);
            }

            info!(warnings = compliance.len(), "quicksave appended");
            let mut warnings = compliance;
            warnings.extend(ledger.into_warnings());
            Ok(QuicksaveOutcome {
                status: "saved",
                session_id: handle.id,
                log_path: handle.log_path,
                warnings,
            })
        }
        .instrument(span)
        .await
    }

    async fn evaluate(&self, ctx: CheckContext<'_>) -> Vec<String> {
        let mut warnings = Vec::new();
        for predicate in &self.predicates {
            match predicate.check(ctx).await {
                Ok(Some(warning)) => warnings.push(warning),
                Ok(None) => {}
                Err(err) => warn!(check = predicate.name(), %err, "compliance check skipped"),
            }
        }
        warnings
    }
}
