// audit.rs — Audit subcommands: tail.

use std::path::PathBuf;

use clap::Subcommand;
use nha_audit::AuditSink;
use nha_policy::GateConfig;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show recent enforcement decisions.
    Tail {
        /// Path to audit log (defaults to <audit_dir>/nha-audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
        /// Only show DENY and WARN decisions.
        #[arg(long)]
        violations: bool,
    },
}

pub fn execute(cmd: &AuditCommands, config: &GateConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Tail { log, n, violations } => {
            let path = log.clone().unwrap_or_else(|| config.audit_log_path());
            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            let records: Vec<_> = AuditSink::read_all(&path)?
                .into_iter()
                .filter(|r| !*violations || r.result != "ALLOW")
                .collect();
            let start = records.len().saturating_sub(*n);
            let recent = &records[start..];

            if recent.is_empty() {
                println!("No audit records.");
                return Ok(());
            }

            println!(
                "{:<20} {:<6} {:<22} {:<24} {:<22} TRACE",
                "TIMESTAMP", "RESULT", "AGENT", "ACTION", "REASON"
            );
            println!("{}", "-".repeat(110));
            for record in recent {
                println!(
                    "{:<20} {:<6} {:<22} {:<24} {:<22} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.result,
                    record.agent_id,
                    record.action,
                    record.reason,
                    record.trace_id,
                );
            }
        }
    }

    Ok(())
}
