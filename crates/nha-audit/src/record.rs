// record.rs — Audit record data model.
//
// One AuditRecord is written per enforcement decision, allowed or not.
// Records are write-once: built from a decision, appended, never updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single audit record — one line in the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// When the decision was made (UTC).
    pub timestamp: DateTime<Utc>,

    /// The agent the decision was about.
    pub agent_id: String,

    /// The action the agent requested.
    pub action: String,

    /// Decision label: "ALLOW", "DENY" or "WARN".
    pub result: String,

    /// Machine-readable reason code (e.g. "ok", "scope_not_allowed").
    pub reason: String,

    /// Operator-assigned policy version label.
    pub policy_version: String,

    /// Version string of the registry snapshot the decision was made against.
    pub registry_version: String,

    /// Correlates this record with the decision returned to the caller.
    pub trace_id: String,

    /// The scope that was checked, if one was requested.
    pub scope: Option<String>,

    /// Free-form caller context (request method, path, resolver, ...).
    #[serde(default)]
    pub extra: serde_json::Value,
}
