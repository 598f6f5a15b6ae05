//! # nha-audit
//!
//! Append-only audit trail for NHA policy decisions.
//!
//! Every enforcement decision, allowed or denied, is recorded as an
//! [`AuditRecord`] in a JSONL (JSON Lines) log file. Writes are best-effort
//! on the request path: [`AuditSink::record`] never fails, but every lost
//! write is counted in [`AuditStats`] so the tradeoff stays visible.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use nha_audit::{AuditRecord, AuditSink};
//!
//! let sink = AuditSink::in_dir("/var/log/nha");
//! let record = AuditRecord {
//!     timestamp: chrono::Utc::now(),
//!     agent_id: "nha:rag-worker".into(),
//!     action: "run.invoker".into(),
//!     result: "ALLOW".into(),
//!     reason: "ok".into(),
//!     policy_version: "p-1".into(),
//!     registry_version: "2026.10.1".into(),
//!     trace_id: "0b6f".into(),
//!     scope: None,
//!     extra: serde_json::Value::Null,
//! };
//! sink.record(&record);
//! ```

pub mod error;
pub mod record;
pub mod sink;

pub use error::AuditError;
pub use record::AuditRecord;
pub use sink::{AuditSink, AuditStats, AUDIT_FILE_NAME};
