//! Step error types.

use thiserror::Error;

use crate::credential::CredentialError;
use kubeforge_transport::TransportError;

/// Errors from executing a provisioning step on one host.
#[derive(Error, Debug)]
pub enum StepError {
    /// The transport could not deliver a command (host unreachable, spawn
    /// failure). Fatal for this host's remaining steps in the current phase.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The idempotency check itself could not be evaluated. Treated exactly
    /// like an unreachable host, never as "not yet applied".
    #[error("precondition check for step {step} on {host} failed: {source}")]
    PreconditionCheck {
        step: String,
        host: String,
        #[source]
        source: TransportError,
    },

    /// A remote command ran and reported failure.
    #[error("step {step} on {host} failed: `{command}` exited with {exit_code:?}: {stderr}")]
    CommandFailed {
        step: String,
        host: String,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The join credential was not available when a worker needed it. The
    /// phase barrier makes this unreachable in a correct run; hitting it
    /// means the control-plane phase was skipped.
    #[error("join credential unavailable: {0}")]
    Credential(#[from] CredentialError),

    /// A step produced output the orchestrator could not interpret.
    #[error("step {step} on {host} produced unusable output: {reason}")]
    MalformedOutput {
        step: String,
        host: String,
        reason: String,
    },
}

impl StepError {
    /// Whether this failure means the host cannot be trusted for further
    /// steps in the phase (as opposed to a contained command failure).
    #[must_use]
    pub fn is_host_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::PreconditionCheck { .. }
        )
    }
}
