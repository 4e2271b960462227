//! Session lifecycle: start (new or resumed), end, and activity evidence.
//!
//! Durable record mutation and registry/marker bookkeeping are hard
//! failures. Narrative logging, digest, artifacts, and harvest are
//! best-effort and surface as warnings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::GlobalConfig;
use crate::harvest::{harvest_message, HarvestOutcome, Harvester};
use crate::models::artifact::{Activity, ActivityKind, ArtifactRef, Decision, Task};
use crate::models::outcome::StepLedger;
use crate::models::session::{ActiveSessionHandle, RecentSession, SessionRecord, SessionStatus};
use crate::narrative::digest::CanonicalDigest;
use crate::narrative::format::{self, Header};
use crate::narrative::writer::SessionLog;
use crate::persistence::artifact_repo::ArtifactRepo;
use crate::persistence::session_repo::SessionRepo;
use crate::workspace::context_loader::ContextLoader;
use crate::workspace::marker::MarkerStore;
use crate::workspace::{start_lock, WorkspacePaths};
use crate::{AppError, Result};

use super::registry::SessionRegistry;
use super::resolution::{resolve, Evidence, ResolutionKind, ResolutionOutcome};

/// Inputs to [`SessionOrchestrator::start`].
#[derive(Debug, Clone, Default)]
pub struct StartParams {
    /// Resume exactly this session; fail if it does not exist.
    pub session_id: Option<String>,
    /// Workspace the session is scoped to.
    pub workspace_root: PathBuf,
    /// User attribution.
    pub user_id: Option<String>,
    /// Project attribution.
    pub project_id: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

/// Result of [`SessionOrchestrator::start`].
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    /// Session identifier.
    pub session_id: String,
    /// Whether an existing session was resumed.
    pub resumed: bool,
    /// How the session was obtained.
    pub resolution: ResolutionKind,
    /// Session narrative file.
    pub log_path: PathBuf,
    /// Most recent other sessions, newest first.
    pub recent_context: Vec<RecentSession>,
    /// Project state document, when present.
    pub project_state: Option<String>,
    /// Core identity document, when present.
    pub core_identity: Option<String>,
    /// Soft failures encountered along the way.
    pub warnings: Vec<String>,
}

/// Inputs to [`SessionOrchestrator::end`].
#[derive(Debug, Clone, Default)]
pub struct EndParams {
    /// Session to close.
    pub session_id: String,
    /// Closing summary.
    pub summary: String,
    /// Decisions to record.
    pub decisions: Vec<String>,
    /// Next steps to record as pending tasks.
    pub next_steps: Vec<String>,
    /// Workspace root, when the session is not open in this process.
    pub workspace_root: Option<PathBuf>,
}

/// Result of [`SessionOrchestrator::end`].
#[derive(Debug, Clone, Serialize)]
pub struct EndOutcome {
    /// Session identifier.
    pub session_id: String,
    /// Completion timestamp.
    pub end_time: DateTime<Utc>,
    /// Always `completed`.
    pub status: SessionStatus,
    /// Decision nodes created.
    pub decisions: Vec<ArtifactRef>,
    /// Task nodes created.
    pub tasks: Vec<ArtifactRef>,
    /// Harvest result, when a harvest ran.
    pub harvest: Option<HarvestOutcome>,
    /// Soft failures encountered along the way.
    pub warnings: Vec<String>,
}

/// Inputs to [`SessionOrchestrator::record_activity`].
#[derive(Debug, Clone)]
pub struct ActivityParams {
    /// Classification.
    pub kind: ActivityKind,
    /// Free-form detail.
    pub detail: String,
    /// Target session; defaults to the current one.
    pub session_id: Option<String>,
}

/// Result of [`SessionOrchestrator::record_activity`].
#[derive(Debug, Clone, Serialize)]
pub struct ActivityOutcome {
    /// New activity node id.
    pub activity_id: String,
    /// Session the activity was linked to.
    pub session_id: String,
}

/// Session state machine over the registry, marker, log, and store.
pub struct SessionOrchestrator {
    config: Arc<GlobalConfig>,
    registry: Arc<SessionRegistry>,
    sessions: SessionRepo,
    artifacts: ArtifactRepo,
    context: Arc<dyn ContextLoader>,
    harvester: Arc<dyn Harvester>,
}

impl SessionOrchestrator {
    /// Wire the orchestrator to its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        registry: Arc<SessionRegistry>,
        sessions: SessionRepo,
        artifacts: ArtifactRepo,
        context: Arc<dyn ContextLoader>,
        harvester: Arc<dyn Harvester>,
    ) -> Self {
        Self {
            config,
            registry,
            sessions,
            artifacts,
            context,
            harvester,
        }
    }

    /// Start a new session or resume an existing one.
    ///
    /// Holds the workspace start lock while resolving identity and
    /// persisting the marker.
    ///
    /// # Errors
    ///
    /// - `AppError::SessionNotFound` if an explicit id does not exist.
    /// - `AppError::SessionClosed` if an explicit id names a completed session.
    /// - `AppError::StoreUnavailable` if an explicit lookup or a record write fails.
    /// - `AppError::LogIo` if a new session's log cannot be created.
    /// - `AppError::LockTimeout` if another `start` holds the workspace lock.
    /// - `AppError::Io` if the marker cannot be written.
    pub async fn start(&self, params: StartParams) -> Result<StartOutcome> {
        let span = info_span!(
            "session_start",
            session_id = params.session_id.as_deref().unwrap_or("")
        );
        self.start_inner(params).instrument(span).await
    }

    async fn start_inner(&self, params: StartParams) -> Result<StartOutcome> {
        let paths = WorkspacePaths::new(&params.workspace_root);
        let marker = MarkerStore::new(paths.marker_file());
        let mut ledger = StepLedger::new();
        let _lock = ledger.hard(
            "acquire start lock",
            start_lock::acquire(&paths.start_lock_file(), self.config.start_lock_wait()).await,
        )?;

        let evidence = match params.session_id {
            Some(ref id) => Evidence::Explicit {
                id: id.clone(),
                lookup: self.sessions.lookup(id).await,
            },
            None => match ledger.soft("read marker", marker.read()).flatten() {
                Some(id) => {
                    let lookup = self.sessions.lookup(&id).await;
                    Evidence::Marker { id, lookup }
                }
                None => Evidence::NoMarker,
            },
        };

        let resolution = ledger.hard("resolve session", resolve(evidence))?;
        for reason in resolution.warnings {
            ledger.warn("resolve session", reason);
        }

        let project_state = self
            .load_context(&mut ledger, &params.workspace_root, &self.config.context.project_state)
            .await;
        let core_identity = self
            .load_context(&mut ledger, &params.workspace_root, &self.config.context.core_identity)
            .await;

        let now = Utc::now();
        let (record, kind) = match resolution.outcome {
            ResolutionOutcome::ExplicitNotFound(id) => {
                return ledger.hard("resolve session", Err(AppError::SessionNotFound(id)));
            }
            ResolutionOutcome::New => {
                let record = self
                    .create_session(&params, &paths, project_state.as_deref(), &mut ledger, now)
                    .await?;
                (record, ResolutionKind::New)
            }
            ResolutionOutcome::ResumedExplicit(record) => (
                self.resume_session(record, &mut ledger, now).await?,
                ResolutionKind::ResumedExplicit,
            ),
            ResolutionOutcome::ResumedFromMarker(record) => (
                self.resume_session(record, &mut ledger, now).await?,
                ResolutionKind::ResumedFromMarker,
            ),
        };

        // Register only after the marker is written.
        ledger.hard("write marker", marker.write(&record.id))?;
        self.registry.set(ActiveSessionHandle::from_record(
            &record,
            params.workspace_root.clone(),
            now,
        ));

        let recent_context = ledger
            .soft(
                "recent context",
                self.sessions
                    .recent(self.config.recent_context_limit, Some(&record.id))
                    .await,
            )
            .unwrap_or_default();

        info!(session_id = %record.id, resolution = ?kind, "session started");
        Ok(StartOutcome {
            session_id: record.id,
            resumed: kind != ResolutionKind::New,
            resolution: kind,
            log_path: record.log_file,
            recent_context,
            project_state,
            core_identity,
            warnings: ledger.into_warnings(),
        })
    }

    async fn load_context(
        &self,
        ledger: &mut StepLedger,
        workspace_root: &Path,
        relative_path: &str,
    ) -> Option<String> {
        ledger
            .soft(
                "load context",
                self.context.read(workspace_root, relative_path).await,
            )
            .flatten()
    }

    async fn create_session(
        &self,
        params: &StartParams,
        paths: &WorkspacePaths,
        project_state: Option<&str>,
        ledger: &mut StepLedger,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        let id = Uuid::new_v4().to_string();
        let snapshot = project_state
            .map(|text| format::preview(text, self.config.context.project_state_preview_chars));
        let header = format::session_header(&Header {
            session_id: &id,
            started_at: now,
            project_id: params.project_id.as_deref(),
            user_id: params.user_id.as_deref(),
            project_state_preview: snapshot.as_deref(),
        });
        let log_path = SessionLog::path_for(&paths.session_logs_dir(), now.date_naive(), &id);
        let log = ledger.hard("create session log", SessionLog::create(log_path, &header))?;

        let record = SessionRecord::new(
            id,
            now,
            log.path().to_path_buf(),
            params.user_id.clone(),
            params.project_id.clone(),
            params.description.clone(),
        );
        ledger.hard("persist session", self.sessions.save(&record).await)?;
        debug!(session_id = %record.id, log = %log.path().display(), "session log created");
        Ok(record)
    }

    async fn resume_session(
        &self,
        mut record: SessionRecord,
        ledger: &mut StepLedger,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        let log = SessionLog::open(record.log_file.clone());
        ledger.soft("append resume entry", log.append(&format::resumed_entry(now)));
        record.touch(now);
        ledger.hard("persist session", self.sessions.save(&record).await)?;
        Ok(record)
    }

    /// Close a session and record its closing artifacts.
    ///
    /// The durable status flip and registry/marker cleanup happen before
    /// any artifact is created.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidInput` if the summary is blank.
    /// - `AppError::SessionNotFound` if the session does not exist.
    /// - `AppError::SessionClosed` if it already completed.
    /// - `AppError::StoreUnavailable` if the status update fails.
    /// - `AppError::Io` if the marker cannot be removed.
    pub async fn end(&self, params: EndParams) -> Result<EndOutcome> {
        let span = info_span!("session_end", session_id = %params.session_id);
        self.end_inner(params).instrument(span).await
    }

    async fn end_inner(&self, params: EndParams) -> Result<EndOutcome> {
        if params.summary.trim().is_empty() {
            return Err(AppError::InvalidInput("summary must not be empty".into()));
        }
        let session_id = params.session_id.as_str();
        let workspace_root = self
            .registry
            .get(Some(session_id))
            .map(|handle| handle.workspace_root)
            .or_else(|| params.workspace_root.clone())
            .unwrap_or_else(|| self.config.default_workspace_root().to_path_buf());
        let paths = WorkspacePaths::new(&workspace_root);
        let mut ledger = StepLedger::new();

        let log = SessionLog::locate(&paths.session_logs_dir(), session_id);
        if log.is_none() {
            debug!(session_id, "session log not found; log steps skipped");
        }

        let end_time = Utc::now();
        ledger.hard(
            "complete session",
            self.sessions
                .complete(session_id, end_time, params.summary.clone())
                .await,
        )?;

        self.registry.remove(session_id);
        let marker = MarkerStore::new(paths.marker_file());
        if let Some(owner) = ledger.hard("clear marker", marker.clear_if(session_id))? {
            warn!(session_id, owner, "marker owned by another session; left in place");
        }

        let narrative = Narrative { log: log.as_ref() };
        narrative.append(
            &mut ledger,
            "append closing block",
            &format::closing_block(session_id, &params.summary, end_time),
        );

        let digest = CanonicalDigest::new(paths.canonical_digest());
        ledger.soft(
            "append digest",
            digest.append(&format::digest_entry(
                session_id,
                end_time.date_naive(),
                &params.summary,
            )),
        );

        let decisions = self
            .record_artifacts(
                &mut ledger,
                narrative,
                ArtifactKind::Decision,
                session_id,
                &params.decisions,
            )
            .await;
        let tasks = self
            .record_artifacts(
                &mut ledger,
                narrative,
                ArtifactKind::Task,
                session_id,
                &params.next_steps,
            )
            .await;

        let harvest = if self.config.harvest.enabled {
            let message = harvest_message(
                &self.config.harvest.message_prefix,
                &params.summary,
                self.config.harvest.summary_max_chars,
            );
            let outcome = ledger.soft(
                "harvest",
                self.harvester.commit_and_push(&workspace_root, &message).await,
            );
            if let Some(outcome) = outcome.filter(|o| o.committed) {
                narrative.append(
                    &mut ledger,
                    "append harvest",
                    &format::harvest_line(outcome.pushed),
                );
            }
            outcome
        } else {
            None
        };

        narrative.append(&mut ledger, "append closed line", &format::closed_line(end_time));

        info!(session_id, "session closed");
        Ok(EndOutcome {
            session_id: session_id.to_owned(),
            end_time,
            status: SessionStatus::Completed,
            decisions,
            tasks,
            harvest,
            warnings: ledger.into_warnings(),
        })
    }

    /// Store one artifact per text, each followed by its log line once the
    /// node exists. Failed artifacts are skipped with a warning.
    async fn record_artifacts(
        &self,
        ledger: &mut StepLedger,
        narrative: Narrative<'_>,
        kind: ArtifactKind,
        session_id: &str,
        texts: &[String],
    ) -> Vec<ArtifactRef> {
        let mut recorded = Vec::with_capacity(texts.len());
        if texts.is_empty() {
            return recorded;
        }
        narrative.append(ledger, kind.heading_step(), kind.heading());

        for text in texts {
            let (artifact, stored) = match kind {
                ArtifactKind::Decision => {
                    let decision = Decision::new(session_id.to_owned(), text.clone());
                    let stored = self.artifacts.record_decision(&decision).await;
                    let artifact = ArtifactRef {
                        id: decision.id,
                        content: decision.content,
                    };
                    (artifact, stored)
                }
                ArtifactKind::Task => {
                    let task = Task::new(session_id.to_owned(), text.clone());
                    let stored = self.artifacts.record_task(&task).await;
                    let artifact = ArtifactRef {
                        id: task.id,
                        content: task.content,
                    };
                    (artifact, stored)
                }
            };
            if ledger.soft(kind.record_step(), stored).is_some() {
                narrative.append(ledger, kind.line_step(), &kind.line(text, &artifact.id));
                recorded.push(artifact);
            }
        }
        recorded
    }

    /// Record evidence of agent activity against a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` if no matching session is open in
    /// this process, or `AppError::StoreUnavailable` if the write fails.
    pub async fn record_activity(&self, params: ActivityParams) -> Result<ActivityOutcome> {
        let handle = self
            .registry
            .get(params.session_id.as_deref())
            .ok_or(AppError::NoActiveSession)?;
        let span = info_span!("record_activity", session_id = %handle.id);
        async move {
            let activity = Activity::new(handle.id.clone(), params.kind, params.detail);
            self.artifacts.record_activity(&activity).await?;
            self.registry.touch(&handle.id);
            debug!(kind = activity.kind.as_str(), "activity recorded");
            Ok(ActivityOutcome {
                activity_id: activity.id,
                session_id: handle.id,
            })
        }
        .instrument(span)
        .await
    }
}

/// Closing artifacts recorded by `end`.
#[derive(Debug, Clone, Copy)]
enum ArtifactKind {
    Decision,
    Task,
}

impl ArtifactKind {
    fn heading(self) -> &'static str {
        match self {
            Self::Decision => format::DECISIONS_HEADING,
            Self::Task => format::NEXT_STEPS_HEADING,
        }
    }

    fn line(self, text: &str, id: &str) -> String {
        match self {
            Self::Decision => format::decision_line(text, id),
            Self::Task => format::task_line(text, id),
        }
    }

    fn heading_step(self) -> &'static str {
        match self {
            Self::Decision => "append decisions",
            Self::Task => "append next steps",
        }
    }

    fn record_step(self) -> &'static str {
        match self {
            Self::Decision => "record decision",
            Self::Task => "record task",
        }
    }

    fn line_step(self) -> &'static str {
        match self {
            Self::Decision => "append decision",
            Self::Task => "append task",
        }
    }
}

/// The located session log, if any. Appends are best-effort and skipped
/// when no log was found.
#[derive(Clone, Copy)]
struct Narrative<'a> {
    log: Option<&'a SessionLog>,
}

impl Narrative<'_> {
    fn append(self, ledger: &mut StepLedger, step: &str, text: &str) {
        if let Some(log) = self.log {
            ledger.soft(step, log.append(text));
        }
    }
}
