// decision.rs — Enforcement request/result types.
//
// An EnforcementResult is created once per decision and never modified.
// Its fields are private; callers read them through accessors and can only
// obtain a result from `Enforcer::enforce`.

use chrono::{DateTime, Utc};
use nha_audit::AuditRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of an enforcement decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Deny,
    /// Allowed, but a policy violation was observed (warn mode).
    Warn,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Deny => "DENY",
            Decision::Warn => "WARN",
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Deny)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason code attached to every decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Ok,
    UnknownAgent,
    AgentDeprecated,
    AgentPausedReadonly,
    PermissionNotAllowed,
    ScopeNotAllowed,
    SecretNotAllowed,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Ok => "ok",
            Reason::UnknownAgent => "unknown_agent",
            Reason::AgentDeprecated => "agent_deprecated",
            Reason::AgentPausedReadonly => "agent_paused_readonly",
            Reason::PermissionNotAllowed => "permission_not_allowed",
            Reason::ScopeNotAllowed => "scope_not_allowed",
            Reason::SecretNotAllowed => "secret_not_allowed",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to perform an action — submitted to the enforcer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnforcementRequest {
    pub agent_id: String,
    pub action: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub require_secret: Option<String>,
    /// Free-form caller context, copied into the result and audit record.
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
}

impl EnforcementRequest {
    pub fn new(agent_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.require_secret = Some(secret.into());
        self
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// The immutable result of one enforcement decision.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnforcementResult {
    allowed: bool,
    decision: Decision,
    reason: Reason,
    policy_version: String,
    registry_version: String,
    trace_id: Uuid,
    agent_id: String,
    action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    require_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra: Option<serde_json::Value>,
    timestamp: DateTime<Utc>,
}

impl EnforcementResult {
    pub(crate) fn new(
        request: EnforcementRequest,
        decision: Decision,
        reason: Reason,
        policy_version: &str,
        registry_version: &str,
    ) -> Self {
        Self {
            allowed: decision.is_allowed(),
            decision,
            reason,
            policy_version: policy_version.to_string(),
            registry_version: registry_version.to_string(),
            trace_id: Uuid::new_v4(),
            agent_id: request.agent_id,
            action: request.action,
            scope: request.scope,
            require_secret: request.require_secret,
            extra: request.extra,
            timestamp: Utc::now(),
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn policy_version(&self) -> &str {
        &self.policy_version
    }

    pub fn registry_version(&self) -> &str {
        &self.registry_version
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn require_secret(&self) -> Option<&str> {
        self.require_secret.as_deref()
    }

    pub fn extra(&self) -> Option<&serde_json::Value> {
        self.extra.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Build the audit line for this decision.
    ///
    /// A requested secret name is folded into `extra` so the audit trail
    /// shows which entitlement was checked.
    pub fn to_audit_record(&self) -> AuditRecord {
        let mut extra = self.extra.clone().unwrap_or(serde_json::Value::Null);
        if let Some(secret) = &self.require_secret {
            extra = match extra {
                serde_json::Value::Object(mut map) => {
                    map.insert("require_secret".to_string(), secret.clone().into());
                    serde_json::Value::Object(map)
                }
                serde_json::Value::Null => serde_json::json!({ "require_secret": secret }),
                other => serde_json::json!({ "context": other, "require_secret": secret }),
            };
        }

        AuditRecord {
            timestamp: self.timestamp,
            agent_id: self.agent_id.clone(),
            action: self.action.clone(),
            result: self.decision.as_str().to_string(),
            reason: self.reason.as_str().to_string(),
            policy_version: self.policy_version.clone(),
            registry_version: self.registry_version.clone(),
            trace_id: self.trace_id.to_string(),
            scope: self.scope.clone(),
            extra,
        }
    }
}
