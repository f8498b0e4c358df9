//! Idempotency guard.

use crate::{Step, StepContext, StepError};
use kubeforge_config::Host;
use tracing::debug;

/// Outcome of a guarded step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's effect was applied in this run.
    Applied,
    /// The step's effect already held; nothing was executed.
    AlreadySatisfied,
}

impl StepOutcome {
    /// Canonical name used in reports and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::AlreadySatisfied => "already-satisfied",
        }
    }
}

/// Execute `step` on `host` only if its effect does not already hold.
///
/// This is the system's at-most-once guarantee for irreversible effects:
/// the satisfaction check runs first, and an inconclusive check is a hard
/// error rather than a reason to re-apply.
///
/// # Errors
/// Propagates [`StepError`] from the check or from the step itself.
pub async fn ensure(
    step: &dyn Step,
    host: &Host,
    cx: &StepContext,
) -> Result<StepOutcome, StepError> {
    if step.satisfied(host, cx).await? {
        debug!(step = step.name(), host = %host.name, "already satisfied, skipping");
        return Ok(StepOutcome::AlreadySatisfied);
    }

    step.apply(host, cx).await?;
    Ok(StepOutcome::Applied)
}
