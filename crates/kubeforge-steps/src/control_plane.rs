//! Control-plane bootstrap steps, run on the single master host.
//!
//! The bootstrap itself (`kubeadm init`) is the one irreversible operation
//! in the system, guarded by the admin-credential marker. After it commits,
//! the master installs the cluster addons and mints the worker join
//! credential, publishing it to the in-run channel.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use kubeforge_config::Host;
use kubeforge_transport::CommandSpec;

use crate::adapters::{kubeadm, manifest};
use crate::markers::{ADMIN_CONF, KUBELET_DEFAULTS};
use crate::{Step, StepContext, StepError};

/// Pod network addon manifest.
const FLANNEL_MANIFEST: &str =
    "https://github.com/flannel-io/flannel/releases/latest/download/kube-flannel.yml";

/// Resource-metrics addon manifest.
const METRICS_SERVER_MANIFEST: &str =
    "https://github.com/kubernetes-sigs/metrics-server/releases/latest/download/components.yaml";

/// Discover the host's routable address and persist it as the kubelet's
/// node IP.
///
/// On multi-homed hosts the kubelet may otherwise register on the wrong
/// interface. Discovery queries live interface state on every run that
/// applies this step; the inventory address is never assumed to be the
/// routable one.
pub struct NodeIpStep;

#[async_trait]
impl Step for NodeIpStep {
    fn name(&self) -> &'static str {
        "node-ip"
    }

    fn marker(&self) -> Option<Utf8PathBuf> {
        Some(Utf8PathBuf::from(KUBELET_DEFAULTS))
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        let address = cx.transport.discover_address(host).await?;
        let contents = format!("KUBELET_EXTRA_ARGS=--node-ip={address}\n");
        cx.transport
            .write_file(host, Utf8Path::new(KUBELET_DEFAULTS), &contents)
            .await?;
        Ok(())
    }
}

/// Initialize the control plane.
///
/// Running `kubeadm init` on an initialized node is destructive, so this is
/// the step the idempotency guard exists for: the admin credential file is
/// both the step's product and its marker.
pub struct ClusterInitStep;

#[async_trait]
impl Step for ClusterInitStep {
    fn name(&self) -> &'static str {
        "cluster-init"
    }

    fn marker(&self) -> Option<Utf8PathBuf> {
        Some(Utf8PathBuf::from(ADMIN_CONF))
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        let advertise = cx.transport.discover_address(host).await?;
        kubeadm::init(
            cx,
            host,
            self.name(),
            &advertise,
            &cx.config.pod_cidr,
            &host.name,
        )
        .await
    }
}

/// Install the admin credential into the operating user's kubeconfig so
/// `kubectl` works without flags in interactive sessions.
pub struct AdminCredentialStep;

impl AdminCredentialStep {
    fn kubeconfig_path(user: &str) -> Utf8PathBuf {
        if user == "root" {
            Utf8PathBuf::from("/root/.kube/config")
        } else {
            Utf8PathBuf::from(format!("/home/{user}/.kube/config"))
        }
    }
}

#[async_trait]
impl Step for AdminCredentialStep {
    fn name(&self) -> &'static str {
        "admin-credential"
    }

    fn marker(&self) -> Option<Utf8PathBuf> {
        None
    }

    async fn satisfied(&self, host: &Host, cx: &StepContext) -> Result<bool, StepError> {
        let path = Self::kubeconfig_path(&cx.config.ssh_user);
        cx.transport
            .file_exists(host, &path)
            .await
            .map_err(|e| StepError::PreconditionCheck {
                step: self.name().to_string(),
                host: host.name.clone(),
                source: e,
            })
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        let user = cx.config.ssh_user.clone();
        let path = Self::kubeconfig_path(&user);
        let dir = path
            .parent()
            .map(Utf8Path::to_owned)
            .unwrap_or_else(|| Utf8PathBuf::from("/"));

        let cmd = CommandSpec::new("mkdir").args(["-p", dir.as_str()]);
        cx.run_checked(host, self.name(), &cmd).await?;

        cx.transport
            .copy_file(host, Utf8Path::new(ADMIN_CONF), &path, Some(&user))
            .await?;
        Ok(())
    }
}

/// Apply the pod network and metrics addons.
///
/// `kubectl apply` is idempotent by contract, so the satisfaction check here
/// only exists to keep re-runs quiet: once the flannel daemonset exists the
/// step reports already-satisfied instead of re-applying.
pub struct AddonsStep;

#[async_trait]
impl Step for AddonsStep {
    fn name(&self) -> &'static str {
        "addons"
    }

    async fn satisfied(&self, host: &Host, cx: &StepContext) -> Result<bool, StepError> {
        manifest::resource_exists(cx, host, "kube-flannel", "daemonset/kube-flannel-ds")
            .await
            .map_err(|e| match e {
                StepError::Transport(source) => StepError::PreconditionCheck {
                    step: self.name().to_string(),
                    host: host.name.clone(),
                    source,
                },
                other => other,
            })
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        manifest::apply(cx, host, self.name(), FLANNEL_MANIFEST).await?;
        manifest::apply(cx, host, self.name(), METRICS_SERVER_MANIFEST).await?;
        Ok(())
    }
}

/// Mint a fresh worker join credential and publish it to the in-run channel.
///
/// Never guarded: tokens are short-lived, so a credential from an earlier
/// run is never assumed valid and every run mints its own. This is the
/// single producer for [`crate::JoinCredentialChannel`].
pub struct IssueJoinTokenStep;

#[async_trait]
impl Step for IssueJoinTokenStep {
    fn name(&self) -> &'static str {
        "issue-join-token"
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        let credential = kubeadm::issue_join_command(cx, host, self.name()).await?;
        cx.credential.publish(credential)?;
        Ok(())
    }
}

/// The control-plane phase's steps, in execution order.
#[must_use]
pub fn steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(NodeIpStep),
        Box::new(ClusterInitStep),
        Box::new(AdminCredentialStep),
        Box::new(AddonsStep),
        Box::new(IssueJoinTokenStep),
    ]
}
