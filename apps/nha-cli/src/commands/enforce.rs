// enforce.rs — One-off enforcement decision.
//
// Runs the same path as the gate: bootstrap from config, decide, audit.
// Exit code 1 on DENY so the command can guard shell scripts.

use anyhow::Context;
use clap::Args;
use nha_policy::{EnforcementRequest, Enforcer, GateConfig};

#[derive(Args)]
pub struct EnforceArgs {
    /// Agent id, e.g. nha:rag-worker.
    agent: String,
    /// Action name, e.g. run.invoker.
    action: String,
    /// Scope the action needs.
    #[arg(long)]
    scope: Option<String>,
    /// Logical secret name the action needs.
    #[arg(long)]
    secret: Option<String>,
    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,
}

pub fn execute(args: &EnforceArgs, config: &GateConfig) -> anyhow::Result<i32> {
    let enforcer = Enforcer::bootstrap(config).context("failed to start enforcer")?;

    let mut request = EnforcementRequest::new(&args.agent, &args.action)
        .with_extra(serde_json::json!({ "source": "cli" }));
    if let Some(scope) = &args.scope {
        request = request.with_scope(scope);
    }
    if let Some(secret) = &args.secret {
        request = request.with_secret(secret);
    }
    let result = enforcer.enforce(request);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{} {} {} ({})",
            result.decision(),
            result.agent_id(),
            result.action(),
            result.reason()
        );
        println!("  trace_id:         {}", result.trace_id());
        println!("  policy_version:   {}", result.policy_version());
        println!("  registry_version: {}", result.registry_version());
    }

    Ok(if result.allowed() { 0 } else { 1 })
}
