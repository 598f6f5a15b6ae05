// checker.rs — Health checks and self-heal for the policy gate.
//
// Four checks, run in this order:
//
//   registry_integrity  trust source exists, parses, validates; old mtime → warn
//   enforcement_mode    running mode equals the expected posture; else fail
//   audit_sink          audit log present, recently written, no lost writes; else warn
//   backup_freshness    backup projection present, valid, recent; else fail
//
// When registry_integrity fails and healing is enabled, the checker
// restores the trust source from the backup projection:
//
//   1. load + verify the backup (digest, count, full validation)
//   2. move the broken file aside to `<name>.corrupt-<timestamp>`
//   3. write the rebuilt YAML atomically
//   4. load it again from disk
//   5. reload the attached PolicyCache, if any
//
// Any failure along the way turns the check critical.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use nha_audit::AuditSink;
use nha_policy::{EnforcementMode, Enforcer, GateConfig, PolicyCache};
use nha_registry::Registry;

use crate::error::HealthError;
use crate::report::{CheckResult, CheckStatus, HealthReport};

pub const CHECK_REGISTRY: &str = "registry_integrity";
pub const CHECK_MODE: &str = "enforcement_mode";
pub const CHECK_AUDIT: &str = "audit_sink";
pub const CHECK_BACKUP: &str = "backup_freshness";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Paths, postures and staleness thresholds for the checker.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub registry_path: PathBuf,
    pub backup_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub current_mode: EnforcementMode,
    pub expected_mode: EnforcementMode,
    pub registry_stale_after: Duration,
    pub audit_stale_after: Duration,
    pub backup_stale_after: Duration,
    /// Attempt a restore from backup when the trust source is broken.
    pub heal: bool,
}

impl HealthConfig {
    pub fn from_gate(config: &GateConfig) -> Self {
        Self {
            registry_path: config.registry_path.clone(),
            backup_path: config.backup_path.clone(),
            audit_log_path: config.audit_log_path(),
            current_mode: config.mode,
            expected_mode: config.expected_mode(),
            registry_stale_after: 30 * DAY,
            audit_stale_after: DAY,
            backup_stale_after: 7 * DAY,
            heal: true,
        }
    }
}

/// What a successful self-heal did.
#[derive(Debug, Clone)]
pub struct HealOutcome {
    pub quarantined: Option<PathBuf>,
    pub registry_version: String,
    pub agent_count: usize,
    pub cache_reloaded: bool,
}

/// Runs the checks. Optionally attached to a live cache and audit sink.
#[derive(Debug)]
pub struct HealthChecker {
    config: HealthConfig,
    cache: Option<Arc<PolicyCache>>,
    audit: Option<Arc<AuditSink>>,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            cache: None,
            audit: None,
        }
    }

    /// A checker wired to a running enforcer: heals reload its cache, and
    /// the audit check also looks at the sink's failure counter.
    pub fn for_enforcer(mut config: HealthConfig, enforcer: &Enforcer) -> Self {
        config.current_mode = enforcer.mode();
        Self::new(config)
            .with_cache(Arc::clone(enforcer.cache()))
            .with_audit(Arc::clone(enforcer.audit()))
    }

    pub fn with_cache(mut self, cache: Arc<PolicyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Run every check, healing the trust source if needed.
    pub fn run(&self) -> HealthReport {
        let mut actions = Vec::new();
        let mut healed = false;

        let mut registry = self.check_registry();
        if registry.status >= CheckStatus::Fail && self.config.heal {
            tracing::warn!(detail = %registry.detail, "trust source unhealthy; attempting restore");
            match self.self_heal() {
                Ok(outcome) => {
                    healed = true;
                    if let Some(q) = &outcome.quarantined {
                        actions.push(format!("quarantined broken trust source to {}", q.display()));
                    }
                    actions.push(format!(
                        "restored {} agent(s) at version {} from {}",
                        outcome.agent_count,
                        outcome.registry_version,
                        self.config.backup_path.display()
                    ));
                    if outcome.cache_reloaded {
                        actions.push("reloaded policy cache".to_string());
                    }
                    registry = CheckResult::warn(
                        CHECK_REGISTRY,
                        format!("restored from backup (was: {})", registry.detail),
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "self-heal failed");
                    actions.push(format!("self-heal failed: {e}"));
                    registry = CheckResult::critical(
                        CHECK_REGISTRY,
                        format!("{}; self-heal failed: {e}", registry.detail),
                    );
                }
            }
        }

        let checks = vec![
            registry,
            self.check_mode(),
            self.check_audit(),
            self.check_backup(),
        ];
        HealthReport::new(checks, actions, healed)
    }

    pub fn check_registry(&self) -> CheckResult {
        let path = &self.config.registry_path;
        if !path.exists() {
            return CheckResult::fail(CHECK_REGISTRY, format!("{} not found", path.display()));
        }
        let registry = match nha_registry::load(path) {
            Ok(r) => r,
            Err(e) => return CheckResult::fail(CHECK_REGISTRY, e.to_string()),
        };

        let summary = format!("{} agent(s), version {}", registry.len(), registry.version);
        match file_age(path) {
            Some(age) if age > self.config.registry_stale_after => CheckResult::warn(
                CHECK_REGISTRY,
                format!("{summary}; not modified in {}", human(age)),
            ),
            _ => CheckResult::pass(CHECK_REGISTRY, summary),
        }
    }

    pub fn check_mode(&self) -> CheckResult {
        let (current, expected) = (self.config.current_mode, self.config.expected_mode);
        if current == expected {
            CheckResult::pass(CHECK_MODE, format!("running {current}"))
        } else {
            CheckResult::fail(
                CHECK_MODE,
                format!("running {current} but {expected} is expected"),
            )
        }
    }

    pub fn check_audit(&self) -> CheckResult {
        if let Some(stats) = self.audit.as_ref().map(|a| a.stats()) {
            if stats.has_failures() {
                return CheckResult::warn(
                    CHECK_AUDIT,
                    format!(
                        "{} audit write(s) lost; last error: {}",
                        stats.failed,
                        stats.last_error.as_deref().unwrap_or("unknown")
                    ),
                );
            }
        }

        let path = &self.config.audit_log_path;
        match file_age(path) {
            None => CheckResult::warn(
                CHECK_AUDIT,
                format!("no audit records at {}", path.display()),
            ),
            Some(age) if age > self.config.audit_stale_after => CheckResult::warn(
                CHECK_AUDIT,
                format!("last audit write {} ago", human(age)),
            ),
            Some(_) => CheckResult::pass(CHECK_AUDIT, format!("writing to {}", path.display())),
        }
    }

    pub fn check_backup(&self) -> CheckResult {
        let path = &self.config.backup_path;
        if !path.exists() {
            return CheckResult::fail(CHECK_BACKUP, format!("{} not found", path.display()));
        }
        let registry = match nha_registry::load_backup(path) {
            Ok(r) => r,
            Err(e) => return CheckResult::fail(CHECK_BACKUP, e.to_string()),
        };

        match file_age(path) {
            Some(age) if age > self.config.backup_stale_after => CheckResult::fail(
                CHECK_BACKUP,
                format!("backup is {} old", human(age)),
            ),
            _ => CheckResult::pass(
                CHECK_BACKUP,
                format!("{} agent(s), version {}", registry.len(), registry.version),
            ),
        }
    }

    /// Restore the trust source from the backup projection.
    pub fn self_heal(&self) -> Result<HealOutcome, HealthError> {
        let registry_path = &self.config.registry_path;
        let backup_path = &self.config.backup_path;

        let registry: Registry =
            nha_registry::load_backup(backup_path).map_err(|source| HealthError::BackupUnusable {
                path: backup_path.clone(),
                source,
            })?;

        let restore_err = |source| HealthError::RestoreFailed {
            path: registry_path.clone(),
            source,
        };
        // Render before moving anything so a bad backup leaves the file in place.
        let yaml = nha_registry::to_yaml(&registry).map_err(restore_err)?;

        let quarantined = if registry_path.exists() {
            Some(quarantine(registry_path)?)
        } else {
            None
        };

        if let Err(source) = nha_registry::write_atomic(registry_path, &yaml) {
            if let Some(aside) = &quarantined {
                unquarantine(aside, registry_path);
            }
            return Err(restore_err(source));
        }

        let restored =
            nha_registry::load(registry_path).map_err(|source| HealthError::RevalidationFailed {
                path: registry_path.clone(),
                source,
            })?;

        let cache_reloaded = match &self.cache {
            Some(cache) => {
                cache
                    .reload(registry_path)
                    .map_err(|source| HealthError::RevalidationFailed {
                        path: registry_path.clone(),
                        source,
                    })?;
                true
            }
            None => false,
        };

        tracing::info!(
            path = %registry_path.display(),
            backup = %backup_path.display(),
            agents = restored.len(),
            registry_version = %restored.version,
            "trust source restored from backup"
        );
        Ok(HealOutcome {
            quarantined,
            registry_version: restored.version,
            agent_count: restored.nhas.len(),
            cache_reloaded,
        })
    }
}

/// Move `path` aside to `<name>.corrupt-<UTC timestamp>`.
fn quarantine(path: &Path) -> Result<PathBuf, HealthError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registry".to_string());
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let target = path.with_file_name(format!("{name}.corrupt-{stamp}"));

    fs::rename(path, &target).map_err(|source| HealthError::QuarantineFailed {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::warn!(from = %path.display(), to = %target.display(), "quarantined trust source");
    Ok(target)
}

/// Put a quarantined file back after a failed restore.
fn unquarantine(aside: &Path, path: &Path) {
    match fs::rename(aside, path) {
        Ok(()) => tracing::warn!(path = %path.display(), "restore failed; trust source put back"),
        Err(e) => tracing::error!(
            error = %e,
            quarantined = %aside.display(),
            path = %path.display(),
            "restore failed and the trust source could not be put back"
        ),
    }
}

/// Time since the file was last modified, or None if it is missing.
fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

fn human(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        s if s >= DAY.as_secs() => format!("{}d", s / DAY.as_secs()),
        s if s >= 3600 => format!("{}h", s / 3600),
        s if s >= 60 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}
