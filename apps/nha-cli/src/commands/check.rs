// check.rs — Run the health checker once.
//
// Exit codes: 0 healthy (or tolerated), 1 failing under fail-closed,
// 2 critical (self-heal could not repair the trust source).

use clap::Args;
use nha_health::{HealthChecker, HealthConfig};
use nha_policy::{EnforcementMode, GateConfig};

#[derive(Args)]
pub struct CheckArgs {
    /// Posture the gate is expected to run in (e.g. fail-closed in production).
    #[arg(long)]
    expect_mode: Option<EnforcementMode>,
    /// Treat any failing check as fatal.
    #[arg(long)]
    fail_closed: bool,
    /// Report problems without restoring from backup.
    #[arg(long)]
    no_heal: bool,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

pub fn execute(args: &CheckArgs, config: &GateConfig) -> anyhow::Result<i32> {
    let mut health = HealthConfig::from_gate(config);
    if let Some(mode) = args.expect_mode {
        health.expected_mode = mode;
    }
    health.heal = !args.no_heal;

    let report = HealthChecker::new(health).run();
    nha_health::log_report(&report);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    let fail_closed = args.fail_closed || config.mode.is_fail_closed();
    Ok(report.exit_code(fail_closed))
}
