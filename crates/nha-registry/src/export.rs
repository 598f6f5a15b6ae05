// export.rs — Read-only projections of a registry.
//
// Two projections are derived from a loaded Registry:
//
// - JSON backup: the full structural form plus a digest and agent count.
//   This is the "last known good" copy the health checker restores from.
// - Markdown: a human-readable table for review. Never read back.
//
// Neither projection is needed for enforcement; the live trust source is
// always the YAML document.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::registry_digest;
use crate::error::{RegistryError, ValidationIssue};
use crate::loader::validate;
use crate::model::{AgentRecord, Registry};

/// JSON backup form of a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryProjection {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub agent_count: usize,
    /// SHA-256 of the registry content, checked again on restore.
    pub digest: String,
    pub nhas: Vec<AgentRecord>,
}

impl RegistryProjection {
    pub fn from_registry(registry: &Registry) -> Self {
        Self {
            version: registry.version.clone(),
            generated_at: Utc::now(),
            agent_count: registry.nhas.len(),
            digest: registry_digest(registry),
            nhas: registry.nhas.clone(),
        }
    }

    /// Convert back into a registry, re-running full structural validation
    /// and checking the recorded count and digest.
    pub fn into_registry(self, origin: &str) -> Result<Registry, RegistryError> {
        let registry = Registry {
            version: self.version,
            nhas: self.nhas,
        };

        let mut issues = validate(&registry);
        if registry.nhas.len() != self.agent_count {
            issues.push(ValidationIssue::document(format!(
                "agent_count is {} but {} record(s) are present",
                self.agent_count,
                registry.nhas.len()
            )));
        }
        let actual = registry_digest(&registry);
        if actual != self.digest {
            issues.push(ValidationIssue::document(format!(
                "digest mismatch: recorded {}, computed {}",
                self.digest, actual
            )));
        }

        if issues.is_empty() {
            Ok(registry)
        } else {
            Err(RegistryError::Invalid {
                origin: origin.to_string(),
                issues,
            })
        }
    }
}

pub fn to_json_projection(registry: &Registry) -> Result<String, RegistryError> {
    Ok(serde_json::to_string_pretty(
        &RegistryProjection::from_registry(registry),
    )?)
}

/// Write the JSON backup projection atomically.
pub fn write_backup(registry: &Registry, path: impl AsRef<Path>) -> Result<(), RegistryError> {
    let json = to_json_projection(registry)?;
    write_atomic(path.as_ref(), &json)?;
    tracing::info!(
        path = %path.as_ref().display(),
        agents = registry.nhas.len(),
        version = %registry.version,
        "registry backup written"
    );
    Ok(())
}

/// Load and fully validate a JSON backup projection.
pub fn load_backup(path: impl AsRef<Path>) -> Result<Registry, RegistryError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| RegistryError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let projection: RegistryProjection = serde_json::from_str(&text)?;
    projection.into_registry(&path.display().to_string())
}

/// Render the registry back into a YAML trust source.
pub fn to_yaml(registry: &Registry) -> Result<String, RegistryError> {
    let body = serde_yaml::to_string(registry)?;
    Ok(format!(
        "# NHA trust source (version {}), regenerated {}\n{}",
        registry.version,
        Utc::now().to_rfc3339(),
        body
    ))
}

/// Render a Markdown overview table.
pub fn to_markdown(registry: &Registry) -> String {
    let mut out = String::new();
    out.push_str(&format!("# NHA Registry — version {}\n\n", registry.version));
    out.push_str(&format!("{} agent(s).\n\n", registry.nhas.len()));
    out.push_str("| ID | Name | Category | Status | Owner | Permissions | Scopes | Secrets |\n");
    out.push_str("|----|------|----------|--------|-------|-------------|--------|---------|\n");
    for nha in &registry.nhas {
        let scopes: Vec<&str> = nha.scopes().into_iter().collect();
        out.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} | {} | {} |\n",
            nha.id,
            escape_cell(&nha.name),
            nha.category,
            nha.status,
            escape_cell(&nha.owner),
            join_or_dash(nha.permissions.iter().map(String::as_str)),
            join_or_dash(scopes.into_iter()),
            join_or_dash(nha.secrets.iter().map(String::as_str)),
        ));
    }
    out
}

pub fn write_markdown(registry: &Registry, path: impl AsRef<Path>) -> Result<(), RegistryError> {
    write_atomic(path.as_ref(), &to_markdown(registry))
}

/// Write through a sibling temp file and rename, so readers never see a
/// half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), RegistryError> {
    let wrap = |source| RegistryError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, contents).map_err(wrap)?;
    fs::rename(&tmp, path).map_err(wrap)?;
    Ok(())
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

fn join_or_dash<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items
        .map(|s| format!("`{}`", s))
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}
