//! Command-line interface for kubeforge.
//!
//! Argument parsing, config/inventory loading, and the mapping from a run
//! report to a process exit code. All orchestration logic lives in
//! `kubeforge-engine`; this module only wires it to the terminal.

use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tracing::info;

use kubeforge_config::{ClusterConfig, Inventory};
use kubeforge_engine::Orchestrator;
use kubeforge_transport::SshTransport;
use kubeforge_utils::{ExitCode, logging::init_tracing};

/// kubeforge - idempotent multi-node Kubernetes cluster bootstrap
#[derive(Parser)]
#[command(name = "kubeforge")]
#[command(about = "Bootstrap a multi-node Kubernetes cluster over SSH, safely re-runnable")]
#[command(long_about = r#"
kubeforge brings a fixed inventory of hosts from an unconfigured state to
converged cluster membership in three phases: preparation (all hosts),
control-plane bootstrap (the single master), and worker join (all workers).

Every step is guarded: work whose effect already holds is skipped, so a
re-run against a converged cluster changes nothing and double-joining a node
is impossible.

EXAMPLES:
  # Converge the cluster described by the default files
  kubeforge up

  # Explicit file locations and machine-readable report
  kubeforge up --inventory hosts.toml --config cluster.toml --json

  # Validate configuration and inventory without touching any host
  kubeforge check

EXIT CODES:
  0  every targeted host converged
  2  invalid arguments, configuration, or inventory
  3  partial convergence: some hosts failed, the run completed for the rest
  4  control-plane bootstrap failed, the run aborted before worker join
"#)]
#[command(version)]
pub struct Cli {
    /// Path to the cluster configuration file
    #[arg(long, global = true, default_value = "kubeforge.toml")]
    pub config: Utf8PathBuf,

    /// Path to the host inventory file
    #[arg(long, global = true, default_value = "inventory.toml")]
    pub inventory: Utf8PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Converge the cluster: run all phases against the inventory
    Up {
        /// Override the configured fan-out (max hosts touched concurrently)
        #[arg(long)]
        fan_out: Option<usize>,

        /// Override the configured SSH user
        #[arg(long)]
        ssh_user: Option<String>,

        /// Emit the run report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and inventory without touching any host
    Check,
}

/// Parse arguments, run the selected command, and map the result to an exit
/// code. Handles all of its own output; `main` only exits.
///
/// # Errors
/// Returns the exit code the process should terminate with.
pub async fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("failed to initialize logging: {e}");
        return Err(ExitCode::INTERNAL);
    }

    match execute(cli).await {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            Err(ExitCode::CLI_ARGS)
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = ClusterConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    let inventory = Inventory::load(&cli.inventory)
        .with_context(|| format!("loading inventory from {}", cli.inventory))?;

    match cli.command {
        Commands::Check => {
            info!(
                hosts = inventory.all().len(),
                master = %inventory.master().name,
                "configuration and inventory are valid"
            );
            println!(
                "ok: {} hosts ({} workers), master {}",
                inventory.all().len(),
                inventory.workers().count(),
                inventory.master().name
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Up {
            fan_out,
            ssh_user,
            json,
        } => {
            let mut config = config;
            if let Some(fan_out) = fan_out {
                config.fan_out = fan_out.max(1);
            }
            if let Some(user) = ssh_user {
                config.ssh_user = user;
            }

            let transport = Arc::new(SshTransport::new(config.ssh_user.clone()));
            let orchestrator = Orchestrator::new(transport, config, inventory);
            let report = orchestrator.run().await;

            if json {
                println!("{}", report.to_json().context("rendering run report")?);
            } else {
                print!("{}", report.render_text());
            }
            Ok(report.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn up_parses_overrides() {
        let cli = Cli::parse_from([
            "kubeforge",
            "--inventory",
            "hosts.toml",
            "up",
            "--fan-out",
            "2",
            "--json",
        ]);
        assert_eq!(cli.inventory, Utf8PathBuf::from("hosts.toml"));
        match cli.command {
            Commands::Up { fan_out, json, .. } => {
                assert_eq!(fan_out, Some(2));
                assert!(json);
            }
            Commands::Check => panic!("expected up"),
        }
    }

    #[test]
    fn defaults_point_at_working_directory_files() {
        let cli = Cli::parse_from(["kubeforge", "check"]);
        assert_eq!(cli.config, Utf8PathBuf::from("kubeforge.toml"));
        assert_eq!(cli.inventory, Utf8PathBuf::from("inventory.toml"));
    }
}
