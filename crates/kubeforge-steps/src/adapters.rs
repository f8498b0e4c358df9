//! Thin adapters over the external collaborators.
//!
//! Each adapter turns one collaborator capability (package management,
//! service management, manifest application, the cluster CLI) into argv
//! commands executed through the transport. They hold no state and make no
//! idempotency promises of their own; idempotency either comes from the
//! collaborator's contract (apt, `kubectl apply`) or from the guard wrapped
//! around the calling step.

use kubeforge_config::Host;
use kubeforge_transport::CommandSpec;

use crate::markers::ADMIN_CONF;
use crate::{StepContext, StepError};

/// Package-management capability (apt). Idempotent by contract: installing
/// an installed package and holding a held package are no-ops.
pub mod pkg {
    use super::*;

    /// Refresh the package index.
    pub async fn update(cx: &StepContext, host: &Host, step: &str) -> Result<(), StepError> {
        let cmd = CommandSpec::new("apt-get").args(["update", "-q"]);
        cx.run_checked(host, step, &cmd).await?;
        Ok(())
    }

    /// Ensure the given package specs are installed. A spec is either a bare
    /// name or `name=version` pin syntax, passed through opaquely.
    pub async fn ensure_installed(
        cx: &StepContext,
        host: &Host,
        step: &str,
        specs: &[String],
    ) -> Result<(), StepError> {
        let cmd = CommandSpec::new("apt-get")
            .args(["install", "-y"])
            .args(specs.iter().map(String::as_str));
        cx.run_checked(host, step, &cmd).await?;
        Ok(())
    }

    /// Pin packages at their installed version so re-runs cannot silently
    /// upgrade them.
    pub async fn pin(
        cx: &StepContext,
        host: &Host,
        step: &str,
        names: &[&str],
    ) -> Result<(), StepError> {
        let cmd = CommandSpec::new("apt-mark").arg("hold").args(names.iter().copied());
        cx.run_checked(host, step, &cmd).await?;
        Ok(())
    }
}

/// Service-manager capability (systemd).
pub mod service {
    use super::*;

    /// Enable a unit at boot and start it now.
    pub async fn enable_and_start(
        cx: &StepContext,
        host: &Host,
        step: &str,
        unit: &str,
    ) -> Result<(), StepError> {
        let cmd = CommandSpec::new("systemctl").args(["enable", "--now", unit]);
        cx.run_checked(host, step, &cmd).await?;
        Ok(())
    }
}

/// Manifest-application capability (`kubectl apply`). Idempotent by
/// contract: re-applying an unchanged manifest is a no-op.
pub mod manifest {
    use super::*;

    /// Apply a manifest source (URL or path) with the admin credential.
    pub async fn apply(
        cx: &StepContext,
        host: &Host,
        step: &str,
        source: &str,
    ) -> Result<(), StepError> {
        let cmd = CommandSpec::new("kubectl")
            .args(["--kubeconfig", ADMIN_CONF])
            .args(["apply", "-f", source]);
        cx.run_checked(host, step, &cmd).await?;
        Ok(())
    }

    /// Check whether a named resource exists in the cluster.
    ///
    /// # Errors
    /// Only transport failures are errors; "not found" is `Ok(false)`.
    pub async fn resource_exists(
        cx: &StepContext,
        host: &Host,
        namespace: &str,
        resource: &str,
    ) -> Result<bool, StepError> {
        let cmd = CommandSpec::new("kubectl")
            .args(["--kubeconfig", ADMIN_CONF])
            .args(["get", "-n", namespace, resource]);
        let output = cx.transport.run(host, &cmd).await?;
        Ok(output.success())
    }
}

/// Cluster CLI surface (kubeadm), treated as opaque commands.
pub mod kubeadm {
    use super::*;

    /// Initialize the control plane. Creates the admin credential file on
    /// success; irreversible, so callers guard it.
    pub async fn init(
        cx: &StepContext,
        host: &Host,
        step: &str,
        advertise_address: &str,
        pod_cidr: &str,
        node_name: &str,
    ) -> Result<(), StepError> {
        let cmd = CommandSpec::new("kubeadm")
            .arg("init")
            .args(["--apiserver-advertise-address", advertise_address])
            .args(["--pod-network-cidr", pod_cidr])
            .args(["--node-name", node_name]);
        cx.run_checked(host, step, &cmd).await?;
        Ok(())
    }

    /// Mint a join credential. Not idempotent: every invocation may produce
    /// a fresh token, and only the credential from the current run is
    /// assumed valid.
    pub async fn issue_join_command(
        cx: &StepContext,
        host: &Host,
        step: &str,
    ) -> Result<String, StepError> {
        let cmd = CommandSpec::new("kubeadm").args(["token", "create", "--print-join-command"]);
        let output = cx.run_checked(host, step, &cmd).await?;

        let credential = output.stdout_string().trim().to_string();
        if credential.is_empty() {
            return Err(StepError::MalformedOutput {
                step: step.to_string(),
                host: host.name.clone(),
                reason: "token issuance printed no join command".to_string(),
            });
        }
        Ok(credential)
    }

    /// Join this host to the cluster using the credential minted on the
    /// control plane. The credential is a complete command line; it is split
    /// into discrete argv elements, never handed to a shell.
    pub async fn join(
        cx: &StepContext,
        host: &Host,
        step: &str,
        credential: &str,
    ) -> Result<(), StepError> {
        let mut parts = credential.split_whitespace();
        let program = parts.next().ok_or_else(|| StepError::MalformedOutput {
            step: step.to_string(),
            host: host.name.clone(),
            reason: "empty join credential".to_string(),
        })?;

        let cmd = CommandSpec::new(program).args(parts);
        cx.run_checked(host, step, &cmd).await?;
        Ok(())
    }
}
