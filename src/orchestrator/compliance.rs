//! Advisory checks run on every quicksave.
//!
//! Predicates annotate a checkpoint with warnings; they never block it.

use std::future::Future;
use std::pin::Pin;

use regex::Regex;

use crate::config::ComplianceConfig;
use crate::models::artifact::ActivityKind;
use crate::persistence::artifact_repo::ArtifactRepo;
use crate::{AppError, Result};

/// Inputs available to a predicate.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// Session being checkpointed.
    pub session_id: &'a str,
    /// Checkpoint summary text.
    pub summary: &'a str,
}

/// A non-blocking check producing at most one warning.
pub trait CompliancePredicate: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Evaluate the check; `Some` carries the warning text.
    ///
    /// # Errors
    ///
    /// Returns the store error if evidence could not be queried.
    fn check<'a>(
        &'a self,
        ctx: CheckContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;
}

/// Warns when no search or research activity was recorded.
pub struct ResearchEvidenceCheck {
    artifacts: ArtifactRepo,
}

impl ResearchEvidenceCheck {
    /// Check backed by `artifacts`.
    #[must_use]
    pub fn new(artifacts: ArtifactRepo) -> Self {
        Self { artifacts }
    }
}

impl CompliancePredicate for ResearchEvidenceCheck {
    fn name(&self) -> &'static str {
        "research-evidence"
    }

    fn check<'a>(
        &'a self,
        ctx: CheckContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move {
            let researched = self
                .artifacts
                .has_activity(ctx.session_id, &[ActivityKind::Search, ActivityKind::Research])
                .await?;
            Ok((!researched).then(|| {
                "[research-evidence] WARNING: no search or research activity recorded for this \
                 session; verify assumptions before continuing."
                    .to_owned()
            }))
        })
    }
}

/// Warns when the summary claims completed work without any recorded
/// file modification.
pub struct ActionIntegrityCheck {
    artifacts: ArtifactRepo,
    claim: Regex,
}

impl ActionIntegrityCheck {
    /// Check matching any of `verbs` as whole words, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `verbs` is empty or the pattern fails
    /// to compile.
    pub fn new(artifacts: ArtifactRepo, verbs: &[String]) -> Result<Self> {
        let alternation = verbs
            .iter()
            .map(|verb| verb.trim())
            .filter(|verb| !verb.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        if alternation.is_empty() {
            return Err(AppError::Config("action verb list is empty".into()));
        }
        let claim = Regex::new(&format!(r"(?i)\b({alternation})\b"))
            .map_err(|err| AppError::Config(format!("invalid action verb pattern: {err}")))?;
        Ok(Self { artifacts, claim })
    }

    /// The claimed verb in `summary`, if any.
    #[must_use]
    pub fn claimed_action<'s>(&self, summary: &'s str) -> Option<&'s str> {
        self.claim.find(summary).map(|m| m.as_str())
    }
}

impl CompliancePredicate for ActionIntegrityCheck {
    fn name(&self) -> &'static str {
        "action-integrity"
    }

    fn check<'a>(
        &'a self,
        ctx: CheckContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move {
            let Some(verb) = self.claimed_action(ctx.summary) else {
                return Ok(None);
            };
            let modified = self
                .artifacts
                .has_activity(ctx.session_id, &[ActivityKind::FileModification])
                .await?;
            Ok((!modified).then(|| {
                format!(
                    "[action-integrity] WARNING: summary claims work (\"{verb}\") but no file \
                     modification was recorded for this session."
                )
            }))
        })
    }
}

/// Build the enabled predicates, in evaluation order.
///
/// # Errors
///
/// Returns `AppError::Config` if the action verb pattern is invalid.
pub fn predicates_from_config(
    config: &ComplianceConfig,
    artifacts: &ArtifactRepo,
) -> Result<Vec<Box<dyn CompliancePredicate>>> {
    let mut predicates: Vec<Box<dyn CompliancePredicate>> = Vec::new();
    if !config.enabled {
        return Ok(predicates);
    }
    if config.research_evidence {
        predicates.push(Box::new(ResearchEvidenceCheck::new(artifacts.clone())));
    }
    if config.action_integrity {
        predicates.push(Box::new(ActionIntegrityCheck::new(
            artifacts.clone(),
            &config.action_verbs,
        )?));
    }
    Ok(predicates)
}
