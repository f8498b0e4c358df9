//! The fixed phase plan.
//!
//! A run is a sequence of phases; each phase is a sequence of steps applied
//! to a target group. Ordering is structural: the plan below is the single
//! place that encodes which step runs where and when, and the orchestrator
//! walks it with two-level barriers (all hosts finish a step before the next
//! step; all steps finish before the next phase).

use std::sync::Arc;

use kubeforge_config::{Host, Inventory};
use kubeforge_steps::{Step, control_plane, prepare, worker};

/// Identity of a phase, stable across runs and used in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseId {
    /// Host preparation, every host.
    Preparation,
    /// Control-plane bootstrap, master only.
    ControlPlaneBootstrap,
    /// Worker join, workers only.
    WorkerJoin,
}

impl PhaseId {
    /// Canonical kebab-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Preparation => "preparation",
            Self::ControlPlaneBootstrap => "control-plane-bootstrap",
            Self::WorkerJoin => "worker-join",
        }
    }
}

/// Which inventory-derived group a phase targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetGroup {
    All,
    Master,
    Workers,
}

impl TargetGroup {
    /// Resolve the group against an inventory, preserving inventory order.
    #[must_use]
    pub fn resolve<'a>(&self, inventory: &'a Inventory) -> Vec<&'a Host> {
        match self {
            Self::All => inventory.all().iter().collect(),
            Self::Master => vec![inventory.master()],
            Self::Workers => inventory.workers().collect(),
        }
    }
}

/// One phase of the plan: an ordered list of steps against a target group.
pub struct Phase {
    pub id: PhaseId,
    pub target: TargetGroup,
    pub steps: Vec<Arc<dyn Step>>,
}

/// The full, fixed plan for one run.
#[must_use]
pub fn plan() -> Vec<Phase> {
    vec![
        Phase {
            id: PhaseId::Preparation,
            target: TargetGroup::All,
            steps: prepare::steps().into_iter().map(Arc::from).collect(),
        },
        Phase {
            id: PhaseId::ControlPlaneBootstrap,
            target: TargetGroup::Master,
            steps: control_plane::steps().into_iter().map(Arc::from).collect(),
        },
        Phase {
            id: PhaseId::WorkerJoin,
            target: TargetGroup::Workers,
            steps: worker::steps().into_iter().map(Arc::from).collect(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeforge_config::HostRole;

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
        ])
        .unwrap()
    }

    #[test]
    fn plan_orders_phases_and_targets() {
        let plan = plan();
        let summary: Vec<(&str, TargetGroup)> =
            plan.iter().map(|p| (p.id.as_str(), p.target)).collect();
        assert_eq!(
            summary,
            vec![
                ("preparation", TargetGroup::All),
                ("control-plane-bootstrap", TargetGroup::Master),
                ("worker-join", TargetGroup::Workers),
            ]
        );
    }

    #[test]
    fn groups_resolve_against_inventory() {
        let inv = inventory();
        let all: Vec<&str> = TargetGroup::All
            .resolve(&inv)
            .iter()
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(all, vec!["master-1", "worker-1"]);

        let master: Vec<&str> = TargetGroup::Master
            .resolve(&inv)
            .iter()
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(master, vec!["master-1"]);

        let workers: Vec<&str> = TargetGroup::Workers
            .resolve(&inv)
            .iter()
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(workers, vec!["worker-1"]);
    }

    #[test]
    fn every_phase_has_steps() {
        for phase in plan() {
            assert!(!phase.steps.is_empty(), "{} is empty", phase.id.as_str());
        }
    }
}
