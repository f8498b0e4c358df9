//! Remote execution transport for kubeforge.
//!
//! The orchestrator never talks to hosts directly; every remote effect goes
//! through the [`Transport`] trait. The production implementation shells out
//! to `ssh`/`scp`, and the in-memory [`mock::MockTransport`] (behind the
//! `test-utils` feature) lets the whole orchestration run in a unit test.
//!
//! # Security model
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style
//! invocation; commands are never assembled as shell strings on this side.
//! Where a remote login shell unavoidably re-parses the command (ssh joins
//! the remote argv with spaces), the SSH implementation shell-quotes every
//! element first, so each argument reaches the remote command as one
//! literal word.

pub mod command_spec;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod ssh;

pub use command_spec::CommandSpec;
pub use error::TransportError;
pub use ssh::SshTransport;

use async_trait::async_trait;
use camino::Utf8Path;
use kubeforge_config::Host;

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Standard output from the remote process.
    pub stdout: Vec<u8>,
    /// Standard error from the remote process.
    pub stderr: Vec<u8>,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    /// Create a new `ExecOutput` with the given values.
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// Get stdout as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Check if the remote command exited successfully (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Remote execution capability against one host.
///
/// A transport reports *reachability* problems as errors; a command that ran
/// and returned non-zero is a successful `run` with a failing [`ExecOutput`].
/// The caller decides what a non-zero exit means.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a command on the host.
    ///
    /// # Errors
    /// Returns [`TransportError`] only when the command could not be
    /// delivered (host unreachable, spawn failure).
    async fn run(&self, host: &Host, cmd: &CommandSpec) -> Result<ExecOutput, TransportError>;

    /// Copy a file that already exists on the host to another path on the
    /// same host, optionally setting its owner.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the copy or ownership change fails.
    async fn copy_file(
        &self,
        host: &Host,
        src: &Utf8Path,
        dst: &Utf8Path,
        owner: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Write `contents` to `path` on the host, replacing any existing file.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the file cannot be written.
    async fn write_file(
        &self,
        host: &Host,
        path: &Utf8Path,
        contents: &str,
    ) -> Result<(), TransportError>;

    /// Check whether `path` exists on the host.
    ///
    /// This backs the idempotency guard, so an inconclusive check is a hard
    /// error, never a silent `false`.
    ///
    /// # Errors
    /// Returns [`TransportError::ExistenceCheckFailed`] if the check itself
    /// could not be evaluated.
    async fn file_exists(&self, host: &Host, path: &Utf8Path) -> Result<bool, TransportError>;

    /// Discover the host's routable local address by querying live interface
    /// state. Called once per host per run; never cached across runs because
    /// address assignment may change between runs.
    ///
    /// # Errors
    /// Returns [`TransportError::AddressDiscoveryFailed`] if the address
    /// cannot be determined.
    async fn discover_address(&self, host: &Host) -> Result<String, TransportError>;
}
