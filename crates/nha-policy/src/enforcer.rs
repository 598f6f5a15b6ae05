// enforcer.rs — The decision engine.
//
// Every action an agent requests passes through `Enforcer::enforce()`, which
// checks, in order:
//
// 1. Is the agent in the registry?        → No  → DENY unknown_agent (WARN in warn mode)
// 2. Is the agent deprecated?             → Yes → DENY agent_deprecated
//    Is it paused and the action a write? → Yes → DENY agent_paused_readonly
// 3. Is the action in `permissions`?      → No  → DENY permission_not_allowed (WARN in warn mode)
// 4. Is the scope (if any) granted?       → No  → DENY scope_not_allowed (WARN in warn mode)
// 5. Is the secret (if any) entitled?     → No  → DENY secret_not_allowed (never downgraded)
// 6. Otherwise                            →       ALLOW ok
//
// Evaluation stops at the first blocking failure. In warn mode a
// downgradeable failure is remembered and evaluation continues, so a later
// blocking check (the secret check) still denies.
//
// Exactly one audit record is written per call. Audit failures never change
// the decision; they are counted by the sink and surfaced via `health()`.

use std::path::PathBuf;
use std::sync::Arc;

use nha_audit::{AuditSink, AuditStats};
use nha_registry::{AgentRecord, AgentStatus};
use serde::Serialize;

use crate::cache::PolicyCache;
use crate::config::{EnforcementMode, GateConfig};
use crate::decision::{Decision, EnforcementRequest, EnforcementResult, Reason};
use crate::error::PolicyError;

/// Action/scope prefixes that mark a read-only operation.
pub const READ_ONLY_PREFIXES: &[&str] = &["read:", "read."];

/// True if the action (or scope) name follows the read-only convention.
pub fn is_read_only(name: &str) -> bool {
    READ_ONLY_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Introspection data for operators and the health checker.
#[derive(Debug, Clone, Serialize)]
pub struct EnforcerHealth {
    pub mode: EnforcementMode,
    pub fail_closed: bool,
    pub agent_count: usize,
    pub registry_version: String,
    pub cache_generation: u64,
    pub policy_version: String,
    pub audit_path: PathBuf,
    pub audit: AuditStats,
}

/// The enforcement engine. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct Enforcer {
    cache: Arc<PolicyCache>,
    audit: Arc<AuditSink>,
    mode: EnforcementMode,
    policy_version: String,
}

impl Enforcer {
    pub fn new(
        cache: Arc<PolicyCache>,
        audit: Arc<AuditSink>,
        mode: EnforcementMode,
        policy_version: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            audit,
            mode,
            policy_version: policy_version.into(),
        }
    }

    /// Build an enforcer from config and perform the initial registry load.
    ///
    /// In fail-closed mode a load failure is fatal. In the other modes it is
    /// logged and the enforcer starts with an empty cache, which denies
    /// (or, in warn mode, flags) every agent as unknown.
    pub fn bootstrap(config: &GateConfig) -> Result<Self, PolicyError> {
        let cache = Arc::new(PolicyCache::new());
        let audit = Arc::new(AuditSink::in_dir(&config.audit_dir));

        if let Err(source) = cache.reload(&config.registry_path) {
            if config.mode.is_fail_closed() {
                tracing::error!(
                    path = %config.registry_path.display(),
                    error = %source,
                    "fail-closed: refusing to start without a verified trust source"
                );
                return Err(PolicyError::StartupFailed {
                    path: config.registry_path.clone(),
                    source,
                });
            }
            tracing::warn!(
                path = %config.registry_path.display(),
                mode = %config.mode,
                "starting with an empty policy cache; every agent is unknown"
            );
        }

        tracing::info!(
            mode = %config.mode,
            policy_version = %config.policy_version,
            agents = cache.len(),
            audit = %audit.path().display(),
            "enforcer ready"
        );
        Ok(Self::new(cache, audit, config.mode, &config.policy_version))
    }

    pub fn cache(&self) -> &Arc<PolicyCache> {
        &self.cache
    }

    pub fn audit(&self) -> &Arc<AuditSink> {
        &self.audit
    }

    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    pub fn policy_version(&self) -> &str {
        &self.policy_version
    }

    /// Decide on a request and write its audit record.
    ///
    /// This is the single chokepoint — every agent action flows through here.
    pub fn enforce(&self, request: EnforcementRequest) -> EnforcementResult {
        let snapshot = self.cache.snapshot();
        let (decision, reason) = evaluate(self.mode, snapshot.get(&request.agent_id), &request);
        let result = EnforcementResult::new(
            request,
            decision,
            reason,
            &self.policy_version,
            snapshot.registry_version(),
        );

        self.audit.record(&result.to_audit_record());

        match decision {
            Decision::Allow => tracing::debug!(
                agent = %result.agent_id(),
                action = %result.action(),
                trace_id = %result.trace_id(),
                "allow"
            ),
            Decision::Warn => tracing::warn!(
                agent = %result.agent_id(),
                action = %result.action(),
                reason = %reason,
                trace_id = %result.trace_id(),
                "policy violation allowed in warn mode"
            ),
            Decision::Deny => tracing::info!(
                agent = %result.agent_id(),
                action = %result.action(),
                reason = %reason,
                trace_id = %result.trace_id(),
                "deny"
            ),
        }
        result
    }

    /// Convenience wrapper around `enforce` with positional arguments.
    pub fn check(
        &self,
        agent_id: &str,
        action: &str,
        scope: Option<&str>,
        require_secret: Option<&str>,
    ) -> EnforcementResult {
        self.enforce(EnforcementRequest {
            agent_id: agent_id.to_string(),
            action: action.to_string(),
            scope: scope.map(str::to_string),
            require_secret: require_secret.map(str::to_string),
            extra: None,
        })
    }

    /// True iff `scope` is in one of the agent's bundles and its status
    /// allows it (paused agents keep only read-only scopes).
    pub fn has_capability(&self, agent_id: &str, scope: &str) -> bool {
        self.with_agent(agent_id, |agent| {
            status_permits(agent.status, scope) && agent.has_scope(scope)
        })
    }

    /// True iff `action` is in the agent's permissions and its status
    /// allows it.
    pub fn has_permission(&self, agent_id: &str, action: &str) -> bool {
        self.with_agent(agent_id, |agent| {
            status_permits(agent.status, action) && agent.has_permission(action)
        })
    }

    /// True iff the agent may reference `secret`. Referencing a secret name
    /// is a read, so paused agents keep their entitlements.
    pub fn has_secret(&self, agent_id: &str, secret: &str) -> bool {
        self.with_agent(agent_id, |agent| {
            agent.status != AgentStatus::Deprecated && agent.has_secret(secret)
        })
    }

    pub fn health(&self) -> EnforcerHealth {
        let snapshot = self.cache.snapshot();
        EnforcerHealth {
            mode: self.mode,
            fail_closed: self.mode.is_fail_closed(),
            agent_count: snapshot.len(),
            registry_version: snapshot.registry_version().to_string(),
            cache_generation: snapshot.generation(),
            policy_version: self.policy_version.clone(),
            audit_path: self.audit.path().to_path_buf(),
            audit: self.audit.stats(),
        }
    }

    fn with_agent(&self, agent_id: &str, check: impl FnOnce(&AgentRecord) -> bool) -> bool {
        self.cache.snapshot().get(agent_id).is_some_and(check)
    }
}

/// Whether an agent's status lets it perform the named action or scope.
fn status_permits(status: AgentStatus, name: &str) -> bool {
    match status {
        AgentStatus::Active => true,
        AgentStatus::Paused => is_read_only(name),
        AgentStatus::Deprecated => false,
    }
}

/// The pure decision function. No I/O, no audit.
fn evaluate(
    mode: EnforcementMode,
    agent: Option<&AgentRecord>,
    request: &EnforcementRequest,
) -> (Decision, Reason) {
    // Step 1: unknown agent. Deny-by-default; only warn mode lets it through.
    let Some(agent) = agent else {
        return if mode.is_warn() {
            (Decision::Warn, Reason::UnknownAgent)
        } else {
            (Decision::Deny, Reason::UnknownAgent)
        };
    };

    // Step 2: status gate. Never downgraded.
    match agent.status {
        AgentStatus::Deprecated => return (Decision::Deny, Reason::AgentDeprecated),
        AgentStatus::Paused
            if !is_read_only(&request.action)
                || request.scope.as_deref().is_some_and(|s| !is_read_only(s)) =>
        {
            return (Decision::Deny, Reason::AgentPausedReadonly)
        }
        _ => {}
    }

    // Steps 3–4: membership checks that warn mode downgrades.
    let soft_checks = [
        (
            !agent.has_permission(&request.action),
            Reason::PermissionNotAllowed,
        ),
        (
            request
                .scope
                .as_deref()
                .is_some_and(|scope| !agent.has_scope(scope)),
            Reason::ScopeNotAllowed,
        ),
    ];
    let mut warning = None;
    for (failed, reason) in soft_checks {
        if !failed {
            continue;
        }
        if !mode.is_warn() {
            return (Decision::Deny, reason);
        }
        warning.get_or_insert(reason);
    }

    // Step 5: secret entitlement. Blocking in every mode.
    if let Some(secret) = request.require_secret.as_deref() {
        if !agent.has_secret(secret) {
            return (Decision::Deny, Reason::SecretNotAllowed);
        }
    }

    match warning {
        Some(reason) => (Decision::Warn, reason),
        None => (Decision::Allow, Reason::Ok),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nha_registry::parse_str;

    const DOC: &str = r#"
version: "2026.10.1"
nhas:
  - id: nha:rag-worker
    name: RAG Worker
    category: ml-ops
    owner: platform
    status: active
    channels: [{kind: http, endpoint: "https://rag", auth: oidc}]
    capabilities:
      - name: vectors
        scopes: [write:vectors]
      - name: search
        scopes: [read:rag]
    permissions: [run.invoker, read:rag.search]
    secrets: [RAG_DB_URL]
    tags: [env:prod, service:rag]
  - id: nha:seo-audit
    name: SEO Auditor
    category: seo-tool
    owner: growth
    status: paused
    channels: [{kind: cli, endpoint: seo, auth: none}]
    capabilities: [{name: crawl, scopes: [read:sites, write:reports]}]
    permissions: [read:sites.crawl, write:reports.publish]
    secrets: [SEO_API_KEY]
    tags: [env:prod, service:seo]
  - id: nha:legacy-bot
    name: Legacy Bot
    category: ops
    owner: sre
    status: deprecated
    channels: [{kind: cli, endpoint: legacy, auth: none}]
    capabilities: [{name: all, scopes: [read:everything]}]
    permissions: [read:everything]
    secrets: [LEGACY_TOKEN]
    tags: [env:prod, service:legacy]
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        enforcer: Enforcer,
    }

    fn fixture(mode: EnforcementMode) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(PolicyCache::new());
        cache.hydrate(parse_str(DOC, "test").unwrap()).unwrap();
        let audit = Arc::new(AuditSink::in_dir(dir.path().join("audit")));
        Fixture {
            enforcer: Enforcer::new(cache, audit, mode, "p-1"),
            _dir: dir,
        }
    }

    fn audit_lines(enforcer: &Enforcer) -> Vec<nha_audit::AuditRecord> {
        AuditSink::read_all(enforcer.audit().path()).unwrap()
    }

    #[test]
    fn allow_granted_action_with_scope() {
        let f = fixture(EnforcementMode::Deny);
        let result = f
            .enforcer
            .check("nha:rag-worker", "run.invoker", Some("write:vectors"), None);
        assert_eq!(result.decision(), Decision::Allow);
        assert_eq!(result.reason(), Reason::Ok);
        assert!(result.allowed());
        assert_eq!(result.policy_version(), "p-1");
        assert_eq!(result.registry_version(), "2026.10.1");
    }

    #[test]
    fn deny_scope_not_granted() {
        let f = fixture(EnforcementMode::Deny);
        let result = f
            .enforcer
            .check("nha:rag-worker", "run.invoker", Some("write:forbidden"), None);
        assert_eq!(result.decision(), Decision::Deny);
        assert_eq!(result.reason(), Reason::ScopeNotAllowed);
        assert!(!result.allowed());
    }

    #[test]
    fn unknown_agent_per_mode() {
        for mode in [EnforcementMode::Deny, EnforcementMode::FailClosed] {
            let f = fixture(mode);
            let result = f.enforcer.check("nha:ghost", "anything", None, None);
            assert_eq!(result.decision(), Decision::Deny, "mode {}", mode);
            assert_eq!(result.reason(), Reason::UnknownAgent);
        }

        let f = fixture(EnforcementMode::Warn);
        let result = f.enforcer.check("nha:ghost", "anything", None, None);
        assert_eq!(result.decision(), Decision::Warn);
        assert_eq!(result.reason(), Reason::UnknownAgent);
        assert!(result.allowed());
    }

    #[test]
    fn deprecated_is_always_denied() {
        for mode in [
            EnforcementMode::Deny,
            EnforcementMode::Warn,
            EnforcementMode::FailClosed,
        ] {
            let f = fixture(mode);
            for (action, scope) in [
                ("read:everything", Some("read:everything")),
                ("run.invoker", None),
                ("write:x", Some("write:x")),
            ] {
                let result = f.enforcer.check("nha:legacy-bot", action, scope, None);
                assert_eq!(result.decision(), Decision::Deny);
                assert_eq!(result.reason(), Reason::AgentDeprecated);
            }
        }
    }

    #[test]
    fn paused_allows_only_read_actions() {
        let f = fixture(EnforcementMode::Warn);
        let read = f
            .enforcer
            .check("nha:seo-audit", "read:sites.crawl", Some("read:sites"), None);
        assert_eq!(read.decision(), Decision::Allow);

        let write = f
            .enforcer
            .check("nha:seo-audit", "write:reports.publish", None, None);
        assert_eq!(write.decision(), Decision::Deny);
        assert_eq!(write.reason(), Reason::AgentPausedReadonly);
    }

    #[test]
    fn paused_denies_read_action_with_write_scope() {
        for mode in [
            EnforcementMode::Deny,
            EnforcementMode::Warn,
            EnforcementMode::FailClosed,
        ] {
            let f = fixture(mode);
            let result = f.enforcer.check(
                "nha:seo-audit",
                "read:sites.crawl",
                Some("write:reports"),
                None,
            );
            assert_eq!(result.decision(), Decision::Deny, "mode {}", mode);
            assert_eq!(result.reason(), Reason::AgentPausedReadonly);
            assert!(!f.enforcer.has_capability("nha:seo-audit", "write:reports"));
        }
    }

    #[test]
    fn permission_check() {
        let f = fixture(EnforcementMode::Deny);
        let result = f.enforcer.check("nha:rag-worker", "run.admin", None, None);
        assert_eq!(result.decision(), Decision::Deny);
        assert_eq!(result.reason(), Reason::PermissionNotAllowed);

        let f = fixture(EnforcementMode::Warn);
        let result = f.enforcer.check("nha:rag-worker", "run.admin", None, None);
        assert_eq!(result.decision(), Decision::Warn);
        assert_eq!(result.reason(), Reason::PermissionNotAllowed);
    }

    #[test]
    fn scope_violation_warns_in_warn_mode() {
        let f = fixture(EnforcementMode::Warn);
        let result = f
            .enforcer
            .check("nha:rag-worker", "run.invoker", Some("write:forbidden"), None);
        assert_eq!(result.decision(), Decision::Warn);
        assert_eq!(result.reason(), Reason::ScopeNotAllowed);
    }

    #[test]
    fn first_failing_check_wins() {
        let f = fixture(EnforcementMode::Deny);
        let result = f.enforcer.check(
            "nha:rag-worker",
            "run.admin",
            Some("write:forbidden"),
            Some("NOPE"),
        );
        assert_eq!(result.reason(), Reason::PermissionNotAllowed);

        let f = fixture(EnforcementMode::Warn);
        let result = f
            .enforcer
            .check("nha:rag-worker", "run.admin", Some("write:forbidden"), None);
        assert_eq!(result.reason(), Reason::PermissionNotAllowed);
    }

    #[test]
    fn secret_check_is_never_downgraded() {
        for mode in [
            EnforcementMode::Deny,
            EnforcementMode::Warn,
            EnforcementMode::FailClosed,
        ] {
            let f = fixture(mode);
            let result = f
                .enforcer
                .check("nha:rag-worker", "run.invoker", None, Some("STRIPE_KEY"));
            assert_eq!(result.decision(), Decision::Deny, "mode {}", mode);
            assert_eq!(result.reason(), Reason::SecretNotAllowed);
        }

        // Even after a downgraded permission failure in warn mode.
        let f = fixture(EnforcementMode::Warn);
        let result = f
            .enforcer
            .check("nha:rag-worker", "run.admin", None, Some("STRIPE_KEY"));
        assert_eq!(result.decision(), Decision::Deny);
        assert_eq!(result.reason(), Reason::SecretNotAllowed);
    }

    #[test]
    fn entitled_secret_is_allowed() {
        let f = fixture(EnforcementMode::Deny);
        let result = f
            .enforcer
            .check("nha:rag-worker", "run.invoker", None, Some("RAG_DB_URL"));
        assert_eq!(result.decision(), Decision::Allow);
    }

    #[test]
    fn every_call_writes_one_audit_record() {
        let f = fixture(EnforcementMode::Deny);
        let allowed = f.enforcer.check("nha:rag-worker", "run.invoker", None, None);
        let denied = f.enforcer.check("nha:ghost", "anything", None, None);

        let lines = audit_lines(&f.enforcer);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].trace_id, allowed.trace_id().to_string());
        assert_eq!(lines[0].result, "ALLOW");
        assert_eq!(lines[1].trace_id, denied.trace_id().to_string());
        assert_eq!(lines[1].result, "DENY");
        assert_eq!(lines[1].reason, "unknown_agent");
        assert_eq!(lines[1].registry_version, "2026.10.1");
    }

    #[test]
    fn audit_failure_does_not_change_decision() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let cache = Arc::new(PolicyCache::new());
        cache.hydrate(parse_str(DOC, "test").unwrap()).unwrap();
        let enforcer = Enforcer::new(
            cache,
            Arc::new(AuditSink::in_dir(&blocker)),
            EnforcementMode::Deny,
            "p-1",
        );

        let result = enforcer.check("nha:rag-worker", "run.invoker", None, None);
        assert_eq!(result.decision(), Decision::Allow);
        assert_eq!(enforcer.health().audit.failed, 1);
    }

    #[test]
    fn helpers_follow_status_rules() {
        let f = fixture(EnforcementMode::Deny);
        let e = &f.enforcer;

        assert!(e.has_capability("nha:rag-worker", "write:vectors"));
        assert!(!e.has_capability("nha:rag-worker", "write:forbidden"));
        assert!(!e.has_capability("nha:ghost", "write:vectors"));

        // Paused: read scopes only.
        assert!(e.has_capability("nha:seo-audit", "read:sites"));
        assert!(!e.has_capability("nha:seo-audit", "write:reports"));
        assert!(e.has_permission("nha:seo-audit", "read:sites.crawl"));
        assert!(!e.has_permission("nha:seo-audit", "write:reports.publish"));
        assert!(e.has_secret("nha:seo-audit", "SEO_API_KEY"));

        // Deprecated: nothing.
        assert!(!e.has_capability("nha:legacy-bot", "read:everything"));
        assert!(!e.has_permission("nha:legacy-bot", "read:everything"));
        assert!(!e.has_secret("nha:legacy-bot", "LEGACY_TOKEN"));

        assert!(e.has_permission("nha:rag-worker", "run.invoker"));
        assert!(e.has_secret("nha:rag-worker", "RAG_DB_URL"));
        assert!(!e.has_secret("nha:rag-worker", "SEO_API_KEY"));

        // Helpers do not write audit records.
        assert!(!e.audit().path().exists());
    }

    #[test]
    fn health_reports_state() {
        let f = fixture(EnforcementMode::FailClosed);
        let health = f.enforcer.health();
        assert_eq!(health.mode, EnforcementMode::FailClosed);
        assert!(health.fail_closed);
        assert_eq!(health.agent_count, 3);
        assert_eq!(health.registry_version, "2026.10.1");
        assert_eq!(health.cache_generation, 1);
        assert!(health.audit_path.ends_with("nha-audit.jsonl"));
    }

    #[test]
    fn bootstrap_fail_closed_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GateConfig::for_project(dir.path());
        config.mode = EnforcementMode::FailClosed;
        assert!(matches!(
            Enforcer::bootstrap(&config),
            Err(PolicyError::StartupFailed { .. })
        ));
    }

    #[test]
    fn bootstrap_deny_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = GateConfig::for_project(dir.path());
        let enforcer = Enforcer::bootstrap(&config).unwrap();
        assert_eq!(enforcer.health().agent_count, 0);
        let result = enforcer.check("nha:rag-worker", "run.invoker", None, None);
        assert_eq!(result.reason(), Reason::UnknownAgent);
    }

    #[test]
    fn bootstrap_loads_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = GateConfig::for_project(dir.path());
        std::fs::create_dir_all(config.registry_path.parent().unwrap()).unwrap();
        std::fs::write(&config.registry_path, DOC).unwrap();

        let enforcer = Enforcer::bootstrap(&config).unwrap();
        assert_eq!(enforcer.health().agent_count, 3);
    }

    #[test]
    fn read_only_convention() {
        assert!(is_read_only("read:rag"));
        assert!(is_read_only("read.docs"));
        assert!(!is_read_only("reader:x"));
        assert!(!is_read_only("write:vectors"));
        assert!(!is_read_only("run.invoker"));
    }
}
