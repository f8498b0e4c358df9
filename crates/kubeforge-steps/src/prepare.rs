//! Preparation-phase steps, run on every host.
//!
//! These take a stock Debian-family host to the point where it can run
//! cluster components: kernel modules, networking sysctls, swap disabled,
//! and the container runtime plus cluster packages installed and pinned.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use kubeforge_config::Host;
use kubeforge_transport::CommandSpec;

use crate::adapters::{pkg, service};
use crate::markers::{MODULES_CONF, SYSCTL_CONF};
use crate::{Step, StepContext, StepError};

/// Kernel modules required for container networking.
const REQUIRED_MODULES: [&str; 2] = ["overlay", "br_netfilter"];

/// Sysctls required for pod traffic to traverse bridges and be forwarded.
const REQUIRED_SYSCTLS: [&str; 3] = [
    "net.bridge.bridge-nf-call-iptables = 1",
    "net.bridge.bridge-nf-call-ip6tables = 1",
    "net.ipv4.ip_forward = 1",
];

/// Load the required kernel modules now and persist the list so they load
/// on every boot.
pub struct KernelModulesStep;

#[async_trait]
impl Step for KernelModulesStep {
    fn name(&self) -> &'static str {
        "kernel-modules"
    }

    fn marker(&self) -> Option<Utf8PathBuf> {
        Some(Utf8PathBuf::from(MODULES_CONF))
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        for module in REQUIRED_MODULES {
            let cmd = CommandSpec::new("modprobe").arg(module);
            cx.run_checked(host, self.name(), &cmd).await?;
        }

        let mut contents = REQUIRED_MODULES.join("\n");
        contents.push('\n');
        cx.transport
            .write_file(host, Utf8Path::new(MODULES_CONF), &contents)
            .await?;
        Ok(())
    }
}

/// Persist pod-networking sysctls and apply them without a reboot.
pub struct SysctlStep;

#[async_trait]
impl Step for SysctlStep {
    fn name(&self) -> &'static str {
        "sysctl"
    }

    fn marker(&self) -> Option<Utf8PathBuf> {
        Some(Utf8PathBuf::from(SYSCTL_CONF))
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        let mut contents = REQUIRED_SYSCTLS.join("\n");
        contents.push('\n');
        cx.transport
            .write_file(host, Utf8Path::new(SYSCTL_CONF), &contents)
            .await?;

        let cmd = CommandSpec::new("sysctl").arg("--system");
        cx.run_checked(host, self.name(), &cmd).await?;
        Ok(())
    }
}

/// Disable swap now and comment out swap entries in fstab so it stays off.
///
/// The kubelet refuses to run with swap active. There is no marker file for
/// this; the satisfaction check asks the kernel directly.
pub struct DisableSwapStep;

#[async_trait]
impl Step for DisableSwapStep {
    fn name(&self) -> &'static str {
        "disable-swap"
    }

    /// Satisfied when no swap device is active: `swapon --noheadings`
    /// prints nothing.
    async fn satisfied(&self, host: &Host, cx: &StepContext) -> Result<bool, StepError> {
        let cmd = CommandSpec::new("swapon").arg("--noheadings");
        let output = cx.run_checked(host, self.name(), &cmd).await?;
        Ok(output.stdout_string().trim().is_empty())
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        let cmd = CommandSpec::new("swapoff").arg("-a");
        cx.run_checked(host, self.name(), &cmd).await?;

        // Comment out swap lines in fstab so the next boot stays swap-free.
        // The pattern is one argv element; no shell is involved.
        let cmd = CommandSpec::new("sed")
            .arg("-ri")
            .arg(r"/\sswap\s/s/^#?/#/")
            .arg("/etc/fstab");
        cx.run_checked(host, self.name(), &cmd).await?;
        Ok(())
    }
}

/// Install and pin the container runtime and the cluster packages.
///
/// Considered satisfied when the cluster CLI package is already installed,
/// which is the last thing this step puts in place.
pub struct PackagesStep;

impl PackagesStep {
    fn versioned_cluster_packages(cx: &StepContext) -> Vec<String> {
        let k8s = &cx.config.kubernetes_version;
        let cri = cx.config.cri_version();
        vec![
            format!("kubelet={k8s}*"),
            format!("kubeadm={k8s}*"),
            format!("kubectl={k8s}*"),
            format!("cri-tools={cri}*"),
        ]
    }
}

#[async_trait]
impl Step for PackagesStep {
    fn name(&self) -> &'static str {
        "packages"
    }

    /// Satisfied when the cluster CLI is installed. `dpkg -s` exits non-zero
    /// for unknown packages, which is the normal "not yet" answer, so only
    /// transport failures are errors here.
    async fn satisfied(&self, host: &Host, cx: &StepContext) -> Result<bool, StepError> {
        let cmd = CommandSpec::new("dpkg").args(["-s", "kubeadm"]);
        let output = cx.transport.run(host, &cmd).await.map_err(|e| {
            StepError::PreconditionCheck {
                step: self.name().to_string(),
                host: host.name.clone(),
                source: e,
            }
        })?;
        Ok(output.success())
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        pkg::update(cx, host, self.name()).await?;
        pkg::ensure_installed(
            cx,
            host,
            self.name(),
            &[
                "apt-transport-https".to_string(),
                "ca-certificates".to_string(),
                "curl".to_string(),
                "gpg".to_string(),
            ],
        )
        .await?;

        pkg::ensure_installed(cx, host, self.name(), &["containerd".to_string()]).await?;
        service::enable_and_start(cx, host, self.name(), "containerd").await?;

        pkg::ensure_installed(cx, host, self.name(), &Self::versioned_cluster_packages(cx))
            .await?;
        service::enable_and_start(cx, host, self.name(), "kubelet").await?;

        pkg::pin(
            cx,
            host,
            self.name(),
            &["kubelet", "kubeadm", "kubectl", "containerd"],
        )
        .await?;
        Ok(())
    }
}

/// The preparation phase's steps, in execution order.
#[must_use]
pub fn steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(KernelModulesStep),
        Box::new(SysctlStep),
        Box::new(DisableSwapStep),
        Box::new(PackagesStep),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{StepOutcome, ensure};
    use kubeforge_config::{ClusterConfig, HostRole};
    use kubeforge_transport::mock::{MockTransport, StubResponse};
    use std::sync::Arc;

    fn context() -> (Arc<MockTransport>, StepContext) {
        let transport = Arc::new(MockTransport::new());
        let config = ClusterConfig {
            kubernetes_version: "1.30".to_string(),
            cri_version: None,
            pod_cidr: "10.244.0.0/16".to_string(),
            fan_out: 4,
            ssh_user: "root".to_string(),
        };
        let cx = StepContext::new(transport.clone(), config);
        (transport, cx)
    }

    fn host() -> Host {
        Host {
            name: "node-1".to_string(),
            address: "10.0.0.5".to_string(),
            role: HostRole::Worker,
        }
    }

    #[tokio::test]
    async fn kernel_modules_loads_and_persists() {
        let (transport, cx) = context();

        let outcome = ensure(&KernelModulesStep, &host(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Applied);

        let commands = transport.commands_on("node-1");
        assert_eq!(
            commands,
            vec![
                "modprobe overlay".to_string(),
                "modprobe br_netfilter".to_string(),
                format!("write {MODULES_CONF}"),
            ]
        );
        assert!(transport.has_file("node-1", MODULES_CONF));
    }

    #[tokio::test]
    async fn kernel_modules_skips_when_persisted() {
        let (transport, cx) = context();
        transport.seed_file("node-1", MODULES_CONF);

        let outcome = ensure(&KernelModulesStep, &host(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadySatisfied);
        assert!(transport.commands_on("node-1").is_empty());
    }

    #[tokio::test]
    async fn sysctl_writes_then_reloads() {
        let (transport, cx) = context();

        ensure(&SysctlStep, &host(), &cx).await.unwrap();
        assert!(transport.has_file("node-1", SYSCTL_CONF));
        assert_eq!(
            transport.commands_on("node-1"),
            vec![format!("write {SYSCTL_CONF}"), "sysctl --system".to_string()]
        );
    }

    #[tokio::test]
    async fn swap_active_triggers_swapoff_and_fstab_edit() {
        let (transport, cx) = context();
        transport.stub(
            "swapon",
            StubResponse::ok().with_stdout("/swap.img file 2G 0B -2\n"),
        );

        let outcome = ensure(&DisableSwapStep, &host(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Applied);

        let commands = transport.commands_on("node-1");
        assert_eq!(commands[1], "swapoff -a");
        assert!(commands[2].starts_with("sed -ri"));
        assert!(commands[2].ends_with("/etc/fstab"));
    }

    #[tokio::test]
    async fn swap_already_off_is_satisfied() {
        let (transport, cx) = context();
        // Unstubbed swapon exits 0 with empty stdout: no active swap.

        let outcome = ensure(&DisableSwapStep, &host(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadySatisfied);
        assert_eq!(transport.commands_on("node-1"), vec!["swapon --noheadings"]);
    }

    #[tokio::test]
    async fn packages_installs_versioned_stack_and_pins() {
        let (transport, cx) = context();
        transport.stub("dpkg -s kubeadm", StubResponse::failure(1));

        let outcome = ensure(&PackagesStep, &host(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Applied);

        let commands = transport.commands_on("node-1");
        assert!(commands.contains(&"apt-get update -q".to_string()));
        assert!(
            commands
                .iter()
                .any(|c| c.contains("kubelet=1.30*") && c.contains("cri-tools=1.30*"))
        );
        assert!(commands.contains(&"systemctl enable --now containerd".to_string()));
        assert!(commands.contains(&"systemctl enable --now kubelet".to_string()));
        assert_eq!(
            commands.last().map(String::as_str),
            Some("apt-mark hold kubelet kubeadm kubectl containerd")
        );
    }

    #[tokio::test]
    async fn packages_honors_separate_cri_version() {
        let (transport, _) = context();
        transport.stub("dpkg -s kubeadm", StubResponse::failure(1));
        let config = ClusterConfig {
            kubernetes_version: "1.30".to_string(),
            cri_version: Some("1.29".to_string()),
            pod_cidr: "10.244.0.0/16".to_string(),
            fan_out: 4,
            ssh_user: "root".to_string(),
        };
        let cx = StepContext::new(transport.clone(), config);

        ensure(&PackagesStep, &host(), &cx).await.unwrap();
        assert!(
            transport
                .commands_on("node-1")
                .iter()
                .any(|c| c.contains("cri-tools=1.29*"))
        );
    }

    #[tokio::test]
    async fn packages_skip_when_cli_already_installed() {
        let (transport, cx) = context();
        // Unstubbed dpkg query exits 0: package present.

        let outcome = ensure(&PackagesStep, &host(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadySatisfied);
        assert_eq!(transport.commands_on("node-1"), vec!["dpkg -s kubeadm"]);
    }

    #[test]
    fn phase_order_is_stable() {
        let names: Vec<&str> = steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["kernel-modules", "sysctl", "disable-swap", "packages"]
        );
    }
}
