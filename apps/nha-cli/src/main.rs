//! # nha-cli
//!
//! Command-line interface for the NHA runtime policy gate.
//!
//! - `nha serve` — run the HTTP decision API behind the gate
//! - `nha check` — run health checks once, self-healing the trust source
//! - `nha validate` — validate the trust source and list every issue
//! - `nha export` — write the JSON backup and Markdown projections
//! - `nha enforce` — make a one-off decision from the command line
//! - `nha audit tail` — show recent audit records

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nha_policy::{EnforcementMode, GateConfig};
use tracing_subscriber::EnvFilter;

/// NHA runtime policy gate.
#[derive(Parser)]
#[command(name = "nha", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    /// Trust source path (overrides config and NHA_REGISTRY_PATH).
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Enforcement mode: deny, warn or fail-closed.
    #[arg(long, global = true)]
    mode: Option<EnforcementMode>,

    /// Policy version label stamped on every decision.
    #[arg(long, global = true)]
    policy_version: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP decision API.
    Serve(commands::serve::ServeArgs),
    /// Run the health checker once.
    Check(commands::check::CheckArgs),
    /// Validate the trust source.
    Validate,
    /// Write backup and Markdown projections of the trust source.
    Export(commands::export::ExportArgs),
    /// Decide whether an agent may perform an action.
    Enforce(commands::enforce::EnforceArgs),
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let project_root = cli
        .project_root
        .canonicalize()
        .unwrap_or_else(|_| cli.project_root.clone());
    let mut config = GateConfig::load(&project_root).context("failed to load gate configuration")?;
    if let Some(path) = cli.registry {
        config.registry_path = path;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(version) = cli.policy_version {
        config.policy_version = version;
    }

    let code = match &cli.command {
        Commands::Serve(args) => commands::serve::execute(args, &config).map(|()| 0),
        Commands::Check(args) => commands::check::execute(args, &config),
        Commands::Validate => commands::validate::execute(&config),
        Commands::Export(args) => commands::export::execute(args, &config).map(|()| 0),
        Commands::Enforce(args) => commands::enforce::execute(args, &config),
        Commands::Audit { command } => commands::audit::execute(command, &config).map(|()| 0),
    }?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("nha_policy=info".parse()?)
        .add_directive("nha_gate=info".parse()?)
        .add_directive("nha_health=info".parse()?)
        .add_directive("nha=info".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }
    Ok(())
}
