//! Structured logging infrastructure for kubeforge.
//!
//! Every step execution is logged with `host`, `phase`, and `step` fields so
//! a run against a large inventory can be filtered per host after the fact.

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the tracing subscriber for structured logging.
///
/// Respects `RUST_LOG` when set; otherwise defaults to `kubeforge=info` or,
/// with `verbose`, `kubeforge=debug`.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("kubeforge=debug,info")
            } else {
                EnvFilter::try_new("kubeforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

/// Create a span covering one phase of the orchestration.
pub fn phase_span(phase: &str) -> tracing::Span {
    span!(Level::INFO, "phase", phase = %phase)
}

/// Create a span covering one step on one host.
pub fn step_span(phase: &str, step: &str, host: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "step",
        phase = %phase,
        step = %step,
        host = %host,
    )
}

/// Log step completion with its outcome string (applied / already-satisfied).
pub fn log_step_outcome(phase: &str, step: &str, host: &str, outcome: &str, duration_ms: u128) {
    info!(
        phase = %phase,
        step = %step,
        host = %host,
        outcome = %outcome,
        duration_ms = %duration_ms,
        "step finished"
    );
}

/// Log a step failure with context.
pub fn log_step_failure(phase: &str, step: &str, host: &str, error: &str, duration_ms: u128) {
    error!(
        phase = %phase,
        step = %step,
        host = %host,
        duration_ms = %duration_ms,
        error = %error,
        "step failed"
    );
}
