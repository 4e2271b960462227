//! Per-step outcomes for multi-step operations.
//!
//! Each named step of `start`, `end`, or `quicksave` goes through a
//! [`StepLedger`] as either best-effort (`soft`) or mandatory (`hard`). The
//! ledger keeps the [`StepOutcome`] of every step; the warnings returned to
//! the caller are derived from that trail.

use tracing::{error, warn};

use crate::Result;

/// Outcome of one sub-operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step completed.
    Done,
    /// The step failed softly; the operation continued.
    Warning(String),
    /// The step failed hard; the operation aborted.
    Fatal(String),
}

/// Ordered trail of step outcomes for one operation.
#[derive(Debug, Default)]
pub struct StepLedger {
    steps: Vec<(String, StepOutcome)>,
}

impl StepLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a best-effort result. An error becomes the warning
    /// `"{step}: {err}"` and yields `None`.
    pub fn soft<T>(&mut self, step: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.push(step, StepOutcome::Done);
                Some(value)
            }
            Err(err) => {
                let reason = format!("{step}: {err}");
                warn!(%reason, "step degraded");
                self.push(step, StepOutcome::Warning(reason));
                None
            }
        }
    }

    /// Record a mandatory result.
    ///
    /// # Errors
    ///
    /// Returns the step's own error unchanged; the caller aborts.
    pub fn hard<T>(&mut self, step: &str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.push(step, StepOutcome::Done);
                Ok(value)
            }
            Err(err) => {
                error!(step, %err, completed = ?self.completed(), "step failed");
                self.push(step, StepOutcome::Fatal(err.to_string()));
                Err(err)
            }
        }
    }

    /// Add a warning that did not originate from an error.
    pub fn warn(&mut self, step: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "step degraded");
        self.push(step, StepOutcome::Warning(reason));
    }

    /// Consume the ledger, yielding the warnings in step order.
    #[must_use]
    pub fn into_warnings(self) -> Vec<String> {
        self.steps
            .into_iter()
            .filter_map(|(_, outcome)| match outcome {
                StepOutcome::Warning(reason) => Some(reason),
                StepOutcome::Done | StepOutcome::Fatal(_) => None,
            })
            .collect()
    }

    fn completed(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|(_, outcome)| *outcome == StepOutcome::Done)
            .map(|(step, _)| step.as_str())
            .collect()
    }

    fn push(&mut self, step: &str, outcome: StepOutcome) {
        self.steps.push((step.to_owned(), outcome));
    }
}
