//! Advisory step outcomes
//!
//! Every step downstream of the core write (audit record, history append)
//! is non-critical: its failure is logged and reported, never escalated.
//! That policy is enforced structurally — advisory steps produce a
//! [`StepOutcome`], not a `Result` the orchestrator could propagate.

use crate::error::UpdateResult;
use serde::Serialize;
use tracing::warn;

/// A failed non-critical step, surfaced in the report for observability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryFailure {
    pub step: &'static str,
    pub error: String,
}

/// Result of one non-critical post-write step.
#[derive(Debug)]
pub enum StepOutcome {
    /// Step ran and wrote something
    Completed,
    /// Step had nothing to do
    Skipped,
    /// Step failed; already logged, never escalated
    Failed(AdvisoryFailure),
}

impl StepOutcome {
    /// Convert an advisory step's result. `Ok(true)` means the step did
    /// work, `Ok(false)` that it was a no-op. Errors are logged here and
    /// demoted — the caller only ever sees an outcome.
    pub fn from_result(step: &'static str, result: UpdateResult<bool>) -> Self {
        match result {
            Ok(true) => StepOutcome::Completed,
            Ok(false) => StepOutcome::Skipped,
            Err(e) => {
                warn!(step, error = %e, "Advisory step failed; primary update unaffected");
                StepOutcome::Failed(AdvisoryFailure {
                    step,
                    error: e.to_string(),
                })
            }
        }
    }

    pub fn failure(self) -> Option<AdvisoryFailure> {
        match self {
            StepOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
