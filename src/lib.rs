//! kubeforge - idempotent multi-node Kubernetes cluster bootstrap over SSH.
//!
//! The library facade re-exports the pieces a caller needs to drive an
//! orchestration run programmatically; the `cli` module is the command-line
//! surface built on top of them.

pub mod cli;

pub use kubeforge_config::{ClusterConfig, ConfigError, Host, HostRole, Inventory};
pub use kubeforge_engine::{
    Orchestrator, PhaseId, RunOutcome, RunReport, StepRecord, StepStatus, plan,
};
pub use kubeforge_transport::{CommandSpec, SshTransport, Transport, TransportError};
pub use kubeforge_utils::ExitCode;
