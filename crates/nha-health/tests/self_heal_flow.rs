// self_heal_flow.rs — A corrupted trust source is repaired under a live enforcer.
//
// Steps:
// 1. Write a valid registry and its backup, bootstrap an Enforcer.
// 2. Corrupt the registry on disk.
// 3. Run the checker wired to the enforcer.
// 4. The registry is restored, the cache is reloaded, decisions keep working.

use std::fs;
use std::sync::Arc;

use nha_health::{CheckStatus, HealthChecker, HealthConfig, CHECK_BACKUP, CHECK_REGISTRY};
use nha_policy::{Decision, EnforcementMode, Enforcer, GateConfig, Reason};

const REGISTRY: &str = r#"
version: "2026.10.2"
nhas:
  - id: nha:rag-worker
    name: RAG Worker
    category: ml-ops
    owner: platform
    status: active
    channels: [{kind: http, endpoint: "https://rag", auth: oidc}]
    capabilities: [{name: vectors, scopes: [write:vectors]}]
    permissions: [run.invoker]
    secrets: [RAG_DB_URL]
    tags: [env:prod, service:rag]
"#;

fn project(mode: EnforcementMode) -> (tempfile::TempDir, GateConfig) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GateConfig::for_project(dir.path());
    config.mode = mode;
    fs::create_dir_all(config.registry_path.parent().unwrap()).unwrap();
    fs::write(&config.registry_path, REGISTRY).unwrap();
    let registry = nha_registry::load(&config.registry_path).unwrap();
    nha_registry::write_backup(&registry, &config.backup_path).unwrap();
    (dir, config)
}

#[test]
fn corrupted_registry_is_restored_and_cache_reloaded() {
    let (_dir, config) = project(EnforcementMode::FailClosed);
    let enforcer = Arc::new(Enforcer::bootstrap(&config).unwrap());
    assert_eq!(enforcer.health().cache_generation, 1);

    fs::write(&config.registry_path, "nhas:\n  - id: [not, a, string]\n").unwrap();
    // A reload attempt now fails and keeps the old snapshot.
    assert!(enforcer.cache().reload(&config.registry_path).is_err());

    let checker = HealthChecker::for_enforcer(HealthConfig::from_gate(&config), &enforcer);
    let report = checker.run();

    assert!(report.healed, "{report}");
    assert_eq!(report.get(CHECK_REGISTRY).unwrap().status, CheckStatus::Warn);
    assert_eq!(report.get(CHECK_BACKUP).unwrap().status, CheckStatus::Pass);
    assert_eq!(report.exit_code(true), 0);

    let health = enforcer.health();
    assert_eq!(health.cache_generation, 2);
    assert_eq!(health.registry_version, "2026.10.2");

    let result = enforcer.check("nha:rag-worker", "run.invoker", Some("write:vectors"), None);
    assert_eq!(result.decision(), Decision::Allow);

    // The next run finds nothing to heal.
    let again = checker.run();
    assert!(!again.healed);
    assert_eq!(again.get(CHECK_REGISTRY).unwrap().status, CheckStatus::Pass);
}

#[test]
fn missing_backup_is_critical_and_enforcement_is_unchanged() {
    let (_dir, config) = project(EnforcementMode::Deny);
    let enforcer = Enforcer::bootstrap(&config).unwrap();
    fs::remove_file(&config.backup_path).unwrap();
    fs::write(&config.registry_path, "version: [").unwrap();

    let report = HealthChecker::for_enforcer(HealthConfig::from_gate(&config), &enforcer).run();
    assert_eq!(report.overall, CheckStatus::Critical);
    assert_eq!(report.exit_code(false), 2);

    // The last good snapshot still serves decisions.
    let result = enforcer.check("nha:ghost", "run.invoker", None, None);
    assert_eq!(result.reason(), Reason::UnknownAgent);
    let result = enforcer.check("nha:rag-worker", "run.invoker", None, None);
    assert_eq!(result.decision(), Decision::Allow);
}

#[test]
fn posture_mismatch_fails_only_under_fail_closed_exit_rules() {
    let (_dir, mut config) = project(EnforcementMode::Warn);
    config.expected_mode = Some(EnforcementMode::FailClosed);
    let enforcer = Enforcer::bootstrap(&config).unwrap();
    // Give the audit check something to look at.
    enforcer.check("nha:rag-worker", "run.invoker", None, None);

    let report = HealthChecker::for_enforcer(HealthConfig::from_gate(&config), &enforcer).run();
    assert_eq!(report.overall, CheckStatus::Fail);
    assert_eq!(report.exit_code(true), 1);
    assert_eq!(report.exit_code(false), 0);
}
