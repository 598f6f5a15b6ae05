// validate.rs — Load the trust source and report every structural issue.

use std::collections::BTreeMap;

use nha_policy::GateConfig;
use nha_registry::RegistryError;

/// Exit code 1 when the trust source is invalid.
pub fn execute(config: &GateConfig) -> anyhow::Result<i32> {
    let path = &config.registry_path;
    let registry = match nha_registry::load(path) {
        Ok(registry) => registry,
        Err(RegistryError::Invalid { origin, issues }) => {
            println!("INVALID: {origin}");
            for issue in &issues {
                println!("  - {issue}");
            }
            println!();
            println!("{} issue(s) found; the gate will not load this document.", issues.len());
            return Ok(1);
        }
        Err(e) => {
            println!("INVALID: {e}");
            return Ok(1);
        }
    };

    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    for nha in &registry.nhas {
        *by_status.entry(nha.status.to_string()).or_default() += 1;
    }
    let breakdown: Vec<String> = by_status
        .iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect();

    println!("OK: {}", path.display());
    println!("  version: {}", registry.version);
    println!(
        "  agents:  {} ({})",
        registry.len(),
        if breakdown.is_empty() {
            "none".to_string()
        } else {
            breakdown.join(", ")
        }
    );
    println!("  digest:  {}", nha_registry::registry_digest(&registry));
    Ok(0)
}
