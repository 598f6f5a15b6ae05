// error.rs — Error types for the trust registry.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A single structural problem found while validating a trust source.
///
/// `index` is the position of the offending record in `nhas` (None for
/// document-level problems such as a missing `version`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub index: Option<usize>,
    pub agent_id: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn document(message: impl Into<String>) -> Self {
        Self {
            index: None,
            agent_id: None,
            message: message.into(),
        }
    }

    pub fn record(index: usize, agent_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            agent_id: agent_id.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.index, &self.agent_id) {
            (Some(i), Some(id)) => write!(f, "nhas[{}] ({}): {}", i, id, self.message),
            (Some(i), None) => write!(f, "nhas[{}]: {}", i, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Errors that can occur while loading, validating or exporting a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The trust source could not be read from disk.
    #[error("failed to read trust source at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The trust source is not syntactically valid YAML.
    #[error("malformed trust source {origin}: {source}")]
    Malformed {
        origin: String,
        source: serde_yaml::Error,
    },

    /// The document parsed but failed structural validation.
    /// Every issue found is reported, not just the first one.
    #[error("invalid trust source {origin}: {}", summarize(.issues))]
    Invalid {
        origin: String,
        issues: Vec<ValidationIssue>,
    },

    /// A projection could not be written.
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON (de)serialization of a projection failed.
    #[error("projection serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization of the rebuilt trust source failed.
    #[error("trust source serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues.first() {
        Some(first) if issues.len() > 1 => {
            format!("{} (and {} more issue(s))", first, issues.len() - 1)
        }
        Some(first) => first.to_string(),
        None => "no issues recorded".to_string(),
    }
}

impl RegistryError {
    /// Validation issues carried by this error (empty for I/O and syntax errors).
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            RegistryError::Invalid { issues, .. } => issues,
            _ => &[],
        }
    }
}
