//! Worker-join steps, run on every worker host after the control plane has
//! committed.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use kubeforge_config::Host;

use crate::adapters::kubeadm;
use crate::control_plane::NodeIpStep;
use crate::markers::KUBELET_CONF;
use crate::{Step, StepContext, StepError};

/// Join this worker to the cluster using the credential minted in this run.
///
/// Guarded by the membership marker: a node that is already a member is
/// never joined twice. The credential is read from the in-run channel; if it
/// is absent the run's phase ordering was violated and the step fails hard.
pub struct JoinStep;

#[async_trait]
impl Step for JoinStep {
    fn name(&self) -> &'static str {
        "join"
    }

    fn marker(&self) -> Option<Utf8PathBuf> {
        Some(Utf8PathBuf::from(KUBELET_CONF))
    }

    async fn apply(&self, host: &Host, cx: &StepContext) -> Result<(), StepError> {
        let credential = cx.credential.read()?.to_string();
        kubeadm::join(cx, host, self.name(), &credential).await
    }
}

/// The worker-join phase's steps, in execution order.
#[must_use]
pub fn steps() -> Vec<Box<dyn Step>> {
    vec![Box::new(NodeIpStep), Box::new(JoinStep)]
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

    fn worker() -> Host {
        Host {
            name: "worker-1".to_string(),
            address: "10.0.0.11".to_string(),
            role: HostRole::Worker,
        }
    }

    #[tokio::test]
    async fn join_runs_published_credential_as_argv() {
        let (transport, cx) = context();
        cx.credential
            .publish("kubeadm join 10.0.0.10:6443 --token abc".to_string())
            .unwrap();
        transport.stub("kubeadm join", StubResponse::ok().creates(KUBELET_CONF));

        let outcome = ensure(&JoinStep, &worker(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(
            transport.commands_on("worker-1"),
            vec!["kubeadm join 10.0.0.10:6443 --token abc"]
        );
        assert!(transport.has_file("worker-1", KUBELET_CONF));
    }

    #[tokio::test]
    async fn member_node_is_never_joined_twice() {
        let (transport, cx) = context();
        cx.credential
            .publish("kubeadm join 10.0.0.10:6443 --token abc".to_string())
            .unwrap();
        transport.seed_file("worker-1", KUBELET_CONF);

        let outcome = ensure(&JoinStep, &worker(), &cx).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadySatisfied);
        assert!(transport.commands_on("worker-1").is_empty());
    }

    #[tokio::test]
    async fn unpublished_credential_fails_hard_before_any_command() {
        let (transport, cx) = context();

        let err = ensure(&JoinStep, &worker(), &cx).await.unwrap_err();
        assert!(matches!(err, StepError::Credential(_)));
        assert!(transport.commands_on("worker-1").is_empty());
    }

    #[tokio::test]
    async fn failed_join_reports_command_context() {
        let (transport, cx) = context();
        cx.credential
            .publish("kubeadm join 10.0.0.10:6443 --token expired".to_string())
            .unwrap();
        transport.stub("kubeadm join", StubResponse::failure(1));

        let err = ensure(&JoinStep, &worker(), &cx).await.unwrap_err();
        match &err {
            StepError::CommandFailed { step, host, .. } => {
                assert_eq!(step, "join");
                assert_eq!(host, "worker-1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_host_fatal());
    }

    #[test]
    fn phase_order_is_stable() {
        let names: Vec<&str> = steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["node-ip", "join"]);
    }
}
