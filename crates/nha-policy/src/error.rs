// error.rs — Error types for the policy subsystem.
//
// Authorization denials are NOT errors: they are `Decision::Deny` values
// returned by the enforcer. These variants cover configuration and startup
// failures only.

use std::path::PathBuf;

use nha_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while starting or reloading the policy gate.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The trust source failed to load; the previous snapshot was kept.
    #[error("registry reload failed: {0}")]
    Registry(#[from] RegistryError),

    /// Fail-closed startup could not load a verified trust source.
    #[error("fail-closed startup aborted: trust source {path} could not be loaded: {source}")]
    StartupFailed {
        path: PathBuf,
        source: RegistryError,
    },
}

/// Errors in gate configuration (config file or environment).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// An enforcement mode string is not one of deny / warn / fail-closed.
    #[error("invalid enforcement mode '{value}' from {origin} (expected deny, warn or fail-closed)")]
    InvalidMode { value: String, origin: String },
}
