//! Orchestration engine for kubeforge.
//!
//! Takes a validated configuration and inventory, walks the fixed phase
//! plan (preparation, control-plane bootstrap, worker join) with barriers
//! between steps and phases, and produces a [`RunReport`] recording what
//! every step did on every host.

pub mod orchestrator;
pub mod phase;
pub mod report;

pub use orchestrator::Orchestrator;
pub use phase::{Phase, PhaseId, TargetGroup, plan};
pub use report::{RunOutcome, RunReport, StepRecord, StepStatus};

// The join-credential channel is owned by the steps crate (the producer and
// consumers live there); re-exported for callers that inspect it.
pub use kubeforge_steps::{CredentialError, JoinCredentialChannel};
