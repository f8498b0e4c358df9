//! Run report: the per-host, per-step record of what a run did.
//!
//! The report is the operator's answer to "what changed": every targeted
//! (phase, step, host) triple appears exactly once, as applied,
//! already-satisfied, or failed. A fully converged re-run therefore reads as
//! a column of already-satisfied records, which is the observable form of
//! idempotency.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kubeforge_utils::ExitCode;

/// What happened to one step on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepStatus {
    /// The step's effect was applied in this run.
    Applied,
    /// The step's effect already held; nothing was executed.
    AlreadySatisfied,
    /// The step failed; the host was excluded from the rest of the run.
    Failed { reason: String },
}

/// One (phase, step, host) record.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub phase: String,
    pub step: String,
    pub host: String,
    pub status: StepStatus,
}

/// Terminal outcome of a run, derived from its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every targeted host converged.
    Converged,
    /// Some hosts failed; the run completed for the rest.
    Partial,
    /// The control plane could not be bootstrapped; worker join never ran.
    Aborted,
}

/// The full report for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<StepRecord>,
    /// Set when the run aborted before completing the plan, with the reason.
    pub aborted: Option<String>,
}

impl RunReport {
    /// Terminal outcome, derived from the records and the abort flag.
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        if self.aborted.is_some() {
            RunOutcome::Aborted
        } else if self
            .records
            .iter()
            .any(|r| matches!(r.status, StepStatus::Failed { .. }))
        {
            RunOutcome::Partial
        } else {
            RunOutcome::Converged
        }
    }

    /// Process exit code for this report.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self.outcome() {
            RunOutcome::Converged => ExitCode::SUCCESS,
            RunOutcome::Partial => ExitCode::PARTIAL_CONVERGENCE,
            RunOutcome::Aborted => ExitCode::CONTROL_PLANE_FAILED,
        }
    }

    /// Records for one host, in execution order.
    pub fn records_for(&self, host: &str) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(move |r| r.host == host)
    }

    /// Hosts that failed at least one step.
    #[must_use]
    pub fn failed_hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self
            .records
            .iter()
            .filter(|r| matches!(r.status, StepStatus::Failed { .. }))
            .map(|r| r.host.as_str())
            .collect();
        hosts.dedup();
        hosts
    }

    /// Machine-readable JSON rendering.
    ///
    /// # Errors
    /// Returns a serialization error (should not happen for this type).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable text rendering, one line per record plus a summary.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mut current_phase = "";

        for record in &self.records {
            if record.phase != current_phase {
                current_phase = &record.phase;
                out.push_str(&format!("phase {current_phase}\n"));
            }
            let status = match &record.status {
                StepStatus::Applied => "applied".to_string(),
                StepStatus::AlreadySatisfied => "already-satisfied".to_string(),
                StepStatus::Failed { reason } => format!("FAILED: {reason}"),
            };
            out.push_str(&format!(
                "  {:<24} {:<12} {status}\n",
                record.step, record.host
            ));
        }

        if let Some(reason) = &self.aborted {
            out.push_str(&format!("run aborted: {reason}\n"));
        }

        let duration = self.finished_at - self.started_at;
        out.push_str(&format!(
            "outcome: {:?} ({} records, {}ms)\n",
            self.outcome(),
            self.records.len(),
            duration.num_milliseconds()
        ));
        out
    }
}
