//! End-to-end orchestration scenarios against the in-memory transport.
//!
//! These drive the full phase plan the way the binary does, with the mock
//! transport scripted to behave like a fresh or partially converged fleet.

use std::sync::Arc;

use kubeforge::{ClusterConfig, Host, HostRole, Inventory, Orchestrator, RunOutcome, StepStatus};
use kubeforge_steps::markers::{ADMIN_CONF, KUBELET_CONF, MODULES_CONF, SYSCTL_CONF};
use kubeforge_transport::mock::{MockTransport, StubResponse};

fn inventory() -> Inventory {
    Inventory::new(vec![
        Host {
            name: "master-1".to_string(),
            address: "10.0.0.10".to_string(),
            role: HostRole::Master,
        },
        Host {
            name: "worker-1".to_string(),
            address: "10.0.0.11".to_string(),
            role: HostRole::Worker,
        },
        Host {
            name: "worker-2".to_string(),
            address: "10.0.0.12".to_string(),
            role: HostRole::Worker,
        },
    ])
    .unwrap()
}

fn config() -> ClusterConfig {
    ClusterConfig {
        kubernetes_version: "1.30".to_string(),
        cri_version: None,
        pod_cidr: "10.244.0.0/16".to_string(),
        fan_out: 8,
        ssh_user: "root".to_string(),
    }
}

/// Script a fleet of stock hosts: swap on, nothing installed, no cluster.
fn fresh_fleet(transport: &MockTransport) {
    transport.stub("swapon", StubResponse::ok().with_stdout("/swap.img file 2G\n"));
    transport.stub("dpkg -s kubeadm", StubResponse::failure(1));
    transport.stub("kubeadm init", StubResponse::ok().creates(ADMIN_CONF));
    transport.stub("get -n kube-flannel", StubResponse::failure(1));
    transport.stub(
        "token create",
        StubResponse::ok().with_stdout("kubeadm join 10.0.0.10:6443 --token fresh.token\n"),
    );
    transport.stub("kubeadm join", StubResponse::ok().creates(KUBELET_CONF));
}

/// Re-script the same fleet as converged for the checks that ask the hosts
/// directly instead of looking for a marker file. Later stubs win.
fn converged_fleet(transport: &MockTransport) {
    transport.stub("swapon", StubResponse::ok());
    transport.stub("dpkg -s kubeadm", StubResponse::ok());
    transport.stub("get -n kube-flannel", StubResponse::ok());
}

#[tokio::test]
async fn fresh_three_node_fleet_converges() {
    let transport = Arc::new(MockTransport::new());
    fresh_fleet(&transport);

    let report = Orchestrator::new(transport.clone(), config(), inventory())
        .run()
        .await;

    assert_eq!(report.outcome(), RunOutcome::Converged);
    assert!(report.aborted.is_none());

    // Every host was prepared.
    for host in ["master-1", "worker-1", "worker-2"] {
        assert!(transport.has_file(host, MODULES_CONF));
        assert!(transport.has_file(host, SYSCTL_CONF));
    }

    // The master bootstrapped exactly once and holds the admin credential.
    assert_eq!(transport.command_count_matching("kubeadm init"), 1);
    assert!(transport.has_file("master-1", ADMIN_CONF));
    assert!(transport.has_file("master-1", "/root/.kube/config"));

    // Both workers joined with the minted credential, exactly once each.
    assert_eq!(transport.command_count_matching("--token fresh.token"), 2);
    assert!(transport.has_file("worker-1", KUBELET_CONF));
    assert!(transport.has_file("worker-2", KUBELET_CONF));
}

#[tokio::test]
async fn no_worker_joins_before_the_credential_is_minted() {
    let transport = Arc::new(MockTransport::new());
    fresh_fleet(&transport);

    Orchestrator::new(transport.clone(), config(), inventory())
        .run()
        .await;

    // In the global command order, token minting strictly precedes every
    // worker join.
    let commands = transport.commands();
    let mint = commands
        .iter()
        .position(|c| c.command.contains("token create"))
        .expect("token was minted");
    for (idx, record) in commands.iter().enumerate() {
        if record.command.starts_with("kubeadm join") {
            assert!(idx > mint, "join on {} ran before minting", record.host);
        }
    }
}

#[tokio::test]
async fn second_run_changes_nothing_except_token_minting() {
    let transport = Arc::new(MockTransport::new());
    fresh_fleet(&transport);

    let first = Orchestrator::new(transport.clone(), config(), inventory())
        .run()
        .await;
    assert_eq!(first.outcome(), RunOutcome::Converged);
    let joins_after_first = transport.command_count_matching("kubeadm join 10.0.0.10");

    converged_fleet(&transport);
    let second = Orchestrator::new(transport.clone(), config(), inventory())
        .run()
        .await;

    assert_eq!(second.outcome(), RunOutcome::Converged);

    // Tokens are short-lived, so minting runs on every run; everything else
    // reads as already satisfied.
    for record in &second.records {
        match record.step.as_str() {
            "issue-join-token" => assert_eq!(record.status, StepStatus::Applied),
            _ => assert_eq!(
                record.status,
                StepStatus::AlreadySatisfied,
                "step {} on {} ran again",
                record.step,
                record.host
            ),
        }
    }

    // In particular, no node was joined twice and init never re-ran.
    assert_eq!(
        transport.command_count_matching("kubeadm join 10.0.0.10"),
        joins_after_first
    );
    assert_eq!(transport.command_count_matching("kubeadm init"), 1);
}

#[tokio::test]
async fn one_failing_worker_does_not_stop_its_siblings() {
    let transport = Arc::new(MockTransport::new());
    fresh_fleet(&transport);
    transport.stub_for_host("worker-1", "kubeadm join", StubResponse::failure(1));

    let report = Orchestrator::new(transport.clone(), config(), inventory())
        .run()
        .await;

    assert_eq!(report.outcome(), RunOutcome::Partial);
    assert_eq!(report.failed_hosts(), vec!["worker-1"]);
    assert!(!transport.has_file("worker-1", KUBELET_CONF));
    assert!(transport.has_file("worker-2", KUBELET_CONF));
}

#[tokio::test]
async fn control_plane_init_failure_yields_zero_join_attempts() {
    let transport = Arc::new(MockTransport::new());
    fresh_fleet(&transport);
    transport.stub("kubeadm init", StubResponse::failure(1));

    let report = Orchestrator::new(transport.clone(), config(), inventory())
        .run()
        .await;

    assert_eq!(report.outcome(), RunOutcome::Aborted);
    assert_eq!(transport.command_count_matching("kubeadm join 10.0.0.10"), 0);
    assert!(!transport.has_file("worker-1", KUBELET_CONF));
    assert!(!transport.has_file("worker-2", KUBELET_CONF));

    // The report still carries the preparation work that did happen.
    assert!(
        report
            .records
            .iter()
            .any(|r| r.phase == "preparation" && r.status == StepStatus::Applied)
    );
}

#[tokio::test]
async fn unreachable_worker_is_reported_and_skipped() {
    let transport = Arc::new(MockTransport::new());
    fresh_fleet(&transport);
    transport.mark_unreachable("worker-2");

    let report = Orchestrator::new(transport.clone(), config(), inventory())
        .run()
        .await;

    assert_eq!(report.outcome(), RunOutcome::Partial);
    assert_eq!(report.failed_hosts(), vec!["worker-2"]);
    // The unreachable host failed its first precondition check and was never
    // touched again.
    assert_eq!(report.records_for("worker-2").count(), 1);
    assert!(transport.has_file("worker-1", KUBELET_CONF));
}

#[tokio::test]
async fn run_report_renders_text_and_json() {
    let transport = Arc::new(MockTransport::new());
    fresh_fleet(&transport);

    let report = Orchestrator::new(transport, config(), inventory()).run().await;

    let text = report.render_text();
    assert!(text.contains("phase preparation"));
    assert!(text.contains("phase control-plane-bootstrap"));
    assert!(text.contains("phase worker-join"));
    assert!(text.contains("outcome: Converged"));

    let json = report.to_json().unwrap();
    assert!(json.contains("\"issue-join-token\""));
    assert!(json.contains("\"applied\""));
}
