// error.rs — Error types for self-healing.
//
// A failed heal is reported as a `critical` check in the HealthReport; these
// variants carry the detail of which step failed.

use std::path::PathBuf;

use nha_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    /// The backup projection is missing, corrupt, or fails validation.
    #[error("backup at {path} is unusable: {source}")]
    BackupUnusable {
        path: PathBuf,
        source: RegistryError,
    },

    /// The corrupt trust source could not be moved aside.
    #[error("failed to quarantine {path}: {source}")]
    QuarantineFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing the rebuilt trust source failed.
    #[error("failed to restore trust source at {path}: {source}")]
    RestoreFailed {
        path: PathBuf,
        source: RegistryError,
    },

    /// The restored trust source did not load cleanly.
    #[error("restored trust source at {path} failed validation: {source}")]
    RevalidationFailed {
        path: PathBuf,
        source: RegistryError,
    },
}
