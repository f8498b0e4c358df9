//! Idempotent provisioning steps for kubeforge.
//!
//! A [`Step`] is a single idempotent action against one host: a declared
//! effect plus a way to tell that the effect already holds. The
//! [`guard`] module enforces at-most-one execution of irreversible effects;
//! the [`adapters`] module wraps the external collaborators (apt, systemctl,
//! kubectl, kubeadm) as thin argv builders over the transport.

pub mod adapters;
pub mod control_plane;
pub mod credential;
pub mod error;
pub mod guard;
pub mod markers;
pub mod prepare;
pub mod worker;

pub use credential::{CredentialError, JoinCredentialChannel};
pub use error::StepError;
pub use guard::{StepOutcome, ensure};

use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::sync::Arc;

use kubeforge_config::{ClusterConfig, Host};
use kubeforge_transport::{CommandSpec, ExecOutput, Transport};

/// Everything a step needs to act on a host.
pub struct StepContext {
    /// Remote execution capability.
    pub transport: Arc<dyn Transport>,
    /// Cluster-wide configuration.
    pub config: ClusterConfig,
    /// Single-writer, many-reader join-credential hand-off, scoped to one
    /// orchestration run.
    pub credential: Arc<JoinCredentialChannel>,
}

impl StepContext {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: ClusterConfig) -> Self {
        Self {
            transport,
            config,
            credential: Arc::new(JoinCredentialChannel::new()),
        }
    }

    /// Run a command on a host and require exit status 0.
    ///
    /// # Errors
    /// Returns [`StepError::CommandFailed`] on non-zero exit and
    /// [`StepError::Transport`] when the command could not be delivered.
    pub async fn run_checked(
        &self,
        host: &Host,
        step: &str,
        cmd: &CommandSpec,
    ) -> Result<ExecOutput, StepError> {
        let output = self.transport.run(host, cmd).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(StepError::CommandFailed {
                step: step.to_string(),
                host: host.name.clone(),
                command: cmd.display(),
                exit_code: output.exit_code,
                stderr: output.stderr_string().trim().to_string(),
            })
        }
    }
}

/// A single idempotent unit of work against one host.
///
/// Most steps declare a [`marker`](Step::marker) path; the default
/// [`satisfied`](Step::satisfied) check is then an existence test for that
/// path. Steps whose "already holds" condition is a logical fact rather than
/// a file (swap state, installed packages) override `satisfied` instead.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable step name used in reports and logs.
    fn name(&self) -> &'static str;

    /// Idempotency marker: a host-local path whose presence means the step's
    /// effect already holds. `None` for steps that always run or that
    /// override [`satisfied`](Step::satisfied).
    fn marker(&self) -> Option<Utf8PathBuf> {
        None
    }

    /// Whether the step's effect already holds on the host.
    ///
    /// # Errors
    /// Returns [`StepError::PreconditionCheck`] when the check itself cannot
    /// be evaluated. That is a hard error: an unverifiable precondition must
    /// never be treated as "not yet applied".
    async fn satisfied(&self, host: &Host, cx: &StepContext) -> Result<bool, StepError> {
        match self.marker() {
            Some(marker) => cx.transport.file_exists(host, &marker).await.map_err(|e| {
                StepError::PreconditionCheck {
                    step: self.name().to_string(),
                    host: host.name.clone(),
                    source: e,
                }
            }),
            None => Ok(false),
        }
    }

    /// Execute the step's effect. Only called when
    /// [`satisfied`](Step::satisfied) returned `false`.
    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError>;
}
