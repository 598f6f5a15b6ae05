// error.rs — Error types for the audit subsystem.
//
// Each variant maps to a specific failure mode in the audit pipeline. On the
// request path these are caught by `AuditSink::record` and only counted; they
// reach operators through `AuditStats` and the health checker.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the audit log file (or its directory).
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a record to the log.
    #[error("failed to append audit record: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// Failed to serialize or deserialize a record (malformed JSON).
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
