//! Phase-sequenced orchestrator.
//!
//! Walks the fixed [`plan`](crate::phase::plan) with two-level barriers:
//! within a phase, every targeted host finishes a step before any host
//! begins the next; between phases, a phase completes on all hosts before
//! the next begins. The inter-phase barrier is what makes the join-credential
//! hand-off safe: the control-plane phase publishes before any worker reads.
//!
//! A host that fails a step is excluded from the rest of the run; other
//! hosts continue. The one exception is the control-plane host: without a
//! bootstrapped control plane a worker join cannot succeed, so a master
//! failure in or before the control-plane phase aborts the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{Instrument, debug, info, warn};

use kubeforge_config::{ClusterConfig, Host, Inventory};
use kubeforge_steps::{StepContext, StepOutcome, ensure};
use kubeforge_transport::Transport;
use kubeforge_utils::logging::{log_step_failure, log_step_outcome, phase_span, step_span};

use crate::phase::{Phase, PhaseId, plan};
use crate::report::{RunReport, StepRecord, StepStatus};

/// Drives one orchestration run against a fixed inventory.
pub struct Orchestrator {
    context: Arc<StepContext>,
    inventory: Inventory,
}

impl Orchestrator {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: ClusterConfig, inventory: Inventory) -> Self {
        Self {
            context: Arc::new(StepContext::new(transport, config)),
            inventory,
        }
    }

    /// Execute the full plan and report what happened.
    ///
    /// Never returns an error: per-host failures and aborts are part of the
    /// [`RunReport`], and the caller derives the process exit code from it.
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let master_name = self.inventory.master().name.clone();

        let mut records = Vec::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut aborted = None;

        for phase in plan() {
            if phase.id == PhaseId::ControlPlaneBootstrap && failed.contains(&master_name) {
                aborted = Some(format!(
                    "control-plane host {master_name} failed preparation"
                ));
                break;
            }

            if phase.id == PhaseId::WorkerJoin {
                // Inter-phase barrier check: the credential must have been
                // published by the control-plane phase. On a fully converged
                // re-run it is read here and then discarded, because every
                // worker skips its join.
                match self.context.credential.read() {
                    Ok(_) => debug!(phase = phase.id.as_str(), "join credential available"),
                    Err(e) => {
                        aborted = Some(e.to_string());
                        break;
                    }
                }
            }

            let targets: Vec<Host> = phase
                .target
                .resolve(&self.inventory)
                .into_iter()
                .filter(|h| !failed.contains(&h.name))
                .cloned()
                .collect();
            if targets.is_empty() {
                info!(phase = phase.id.as_str(), "no remaining targets, skipping");
                continue;
            }

            self.run_phase(&phase, &targets, &mut records, &mut failed)
                .instrument(phase_span(phase.id.as_str()))
                .await;

            if phase.id == PhaseId::ControlPlaneBootstrap && failed.contains(&master_name) {
                aborted = Some(format!(
                    "control-plane bootstrap failed on {master_name}"
                ));
                break;
            }
        }

        if let Some(reason) = &aborted {
            warn!(reason = %reason, "run aborted");
        }

        RunReport {
            started_at,
            finished_at: Utc::now(),
            records,
            aborted,
        }
    }

    /// Run one phase: each step fans out over the surviving targets, bounded
    /// by `fan_out`, and joins completely before the next step starts.
    async fn run_phase(
        &self,
        phase: &Phase,
        targets: &[Host],
        records: &mut Vec<StepRecord>,
        failed: &mut HashSet<String>,
    ) {
        let phase_name = phase.id.as_str();
        let fan_out = self.context.config.fan_out.max(1);

        for step in &phase.steps {
            let step_name = step.name();
            let remaining: Vec<&Host> =
                targets.iter().filter(|h| !failed.contains(&h.name)).collect();
            if remaining.is_empty() {
                info!(step = step_name, "no surviving hosts, phase ends early");
                break;
            }

            for window in remaining.chunks(fan_out) {
                let mut handles = Vec::with_capacity(window.len());
                for host in window {
                    let cx = Arc::clone(&self.context);
                    let step = Arc::clone(step);
                    let host = (*host).clone();
                    let span = step_span(phase_name, step_name, &host.name);
                    let host_name = host.name.clone();

                    let task = async move {
                        let start = Instant::now();
                        let result = ensure(step.as_ref(), &host, &cx).await;
                        (result, start.elapsed())
                    };
                    handles.push((host_name, tokio::spawn(task.instrument(span))));
                }

                // Step barrier: every host in the window finishes before the
                // next window (and the next step) starts.
                for (host_name, handle) in handles {
                    let status = match handle.await {
                        Ok((Ok(outcome), elapsed)) => {
                            log_step_outcome(
                                phase_name,
                                step_name,
                                &host_name,
                                outcome.as_str(),
                                elapsed.as_millis(),
                            );
                            match outcome {
                                StepOutcome::Applied => StepStatus::Applied,
                                StepOutcome::AlreadySatisfied => StepStatus::AlreadySatisfied,
                            }
                        }
                        Ok((Err(e), elapsed)) => {
                            log_step_failure(
                                phase_name,
                                step_name,
                                &host_name,
                                &e.to_string(),
                                elapsed.as_millis(),
                            );
                            failed.insert(host_name.clone());
                            StepStatus::Failed {
                                reason: e.to_string(),
                            }
                        }
                        Err(join_error) => {
                            failed.insert(host_name.clone());
                            StepStatus::Failed {
                                reason: format!("internal task failure: {join_error}"),
                            }
                        }
                    };
                    records.push(StepRecord {
                        phase: phase_name.to_string(),
                        step: step_name.to_string(),
                        host: host_name,
                        status,
                    });
                }
            }
        }
    }
}
