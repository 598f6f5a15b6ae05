// loader.rs — Trust-source parsing and structural validation.
//
// The loader is pure: it reads a YAML document and either returns a fully
// validated Registry or an error listing every problem found. There is no
// partial load. A document with one bad record is rejected as a whole.
//
// Validation collects all issues rather than stopping at the first one, so
// an operator fixing a broken trust source sees the whole list at once.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value;

use crate::error::{RegistryError, ValidationIssue};
use crate::model::{AgentRecord, Registry, ID_PREFIX, REQUIRED_TAG_KEYS};

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^nha:[a-z0-9][a-z0-9._-]*$").expect("agent id pattern is a valid regex")
    })
}

/// Load and validate a trust source from disk.
pub fn load(path: impl AsRef<Path>) -> Result<Registry, RegistryError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| RegistryError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let registry = parse_str(&text, &path.display().to_string())?;
    tracing::debug!(
        path = %path.display(),
        version = %registry.version,
        agents = registry.len(),
        "trust source loaded"
    );
    Ok(registry)
}

/// Parse and validate a trust source held in memory.
///
/// `origin` is only used in error messages (usually the file path).
pub fn parse_str(text: &str, origin: &str) -> Result<Registry, RegistryError> {
    let document: Value = serde_yaml::from_str(text).map_err(|source| RegistryError::Malformed {
        origin: origin.to_string(),
        source,
    })?;

    let mut issues = Vec::new();

    let Value::Mapping(root) = document else {
        issues.push(ValidationIssue::document(
            "document must be a mapping with `version` and `nhas`",
        ));
        return Err(invalid(origin, issues));
    };

    let version = match root.get("version") {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::document("missing required field `version`"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            issues.push(ValidationIssue::document("`version` must not be empty"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        // An unquoted `2024.10` parses as the float 2024.1; refuse it rather
        // than record a version nobody wrote.
        Some(Value::Number(n)) => {
            issues.push(ValidationIssue::document(format!(
                "`version` must be a quoted string (got number {})",
                n
            )));
            None
        }
        Some(_) => {
            issues.push(ValidationIssue::document("`version` must be a string"));
            None
        }
    };

    let mut records: Vec<(usize, AgentRecord)> = Vec::new();
    match root.get("nhas") {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::document("missing required field `nhas`"));
        }
        Some(Value::Sequence(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                match serde_yaml::from_value::<AgentRecord>(entry.clone()) {
                    Ok(record) => records.push((index, record)),
                    Err(e) => issues.push(ValidationIssue::record(
                        index,
                        raw_id(entry),
                        e.to_string(),
                    )),
                }
            }
        }
        Some(_) => issues.push(ValidationIssue::document("`nhas` must be a list")),
    }

    let indexed: Vec<(usize, &AgentRecord)> = records.iter().map(|(i, r)| (*i, r)).collect();
    issues.extend(validate_records(&indexed));

    match version {
        Some(version) if issues.is_empty() => Ok(Registry {
            version,
            nhas: records.into_iter().map(|(_, r)| r).collect(),
        }),
        _ => Err(invalid(origin, issues)),
    }
}

/// Structurally validate an already-typed registry.
///
/// Used for registries that did not come through `parse_str` (for example
/// ones rebuilt from a backup projection). Returns every issue found.
pub fn validate(registry: &Registry) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if registry.version.trim().is_empty() {
        issues.push(ValidationIssue::document("`version` must not be empty"));
    }
    let indexed: Vec<(usize, &AgentRecord)> = registry.nhas.iter().enumerate().collect();
    issues.extend(validate_records(&indexed));
    issues
}

fn validate_records(records: &[(usize, &AgentRecord)]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_ids: HashMap<&str, usize> = HashMap::new();
    let mut seen_names: HashMap<&str, usize> = HashMap::new();

    for &(index, record) in records {
        let id = Some(record.id.as_str());

        if !id_pattern().is_match(&record.id) {
            issues.push(ValidationIssue::record(
                index,
                id,
                format!("id '{}' must match `{}<slug>`", record.id, ID_PREFIX),
            ));
        }
        if let Some(first) = seen_ids.insert(&record.id, index) {
            issues.push(ValidationIssue::record(
                index,
                id,
                format!("duplicate id '{}' (first defined at nhas[{}])", record.id, first),
            ));
        }

        if record.name.trim().is_empty() {
            issues.push(ValidationIssue::record(index, id, "name must not be empty"));
        } else if let Some(first) = seen_names.insert(&record.name, index) {
            issues.push(ValidationIssue::record(
                index,
                id,
                format!(
                    "duplicate name '{}' (first defined at nhas[{}])",
                    record.name, first
                ),
            ));
        }

        if record.owner.trim().is_empty() {
            issues.push(ValidationIssue::record(index, id, "owner must not be empty"));
        }

        if record.channels.is_empty() {
            issues.push(ValidationIssue::record(
                index,
                id,
                "at least one channel is required",
            ));
        }
        for (c, channel) in record.channels.iter().enumerate() {
            if channel.endpoint.trim().is_empty() {
                issues.push(ValidationIssue::record(
                    index,
                    id,
                    format!("channels[{}] ({}) has an empty endpoint", c, channel.kind),
                ));
            }
        }

        for (b, bundle) in record.capabilities.iter().enumerate() {
            if bundle.name.trim().is_empty() {
                issues.push(ValidationIssue::record(
                    index,
                    id,
                    format!("capabilities[{}] has an empty name", b),
                ));
            }
        }

        for (field, value) in [
            ("error_rate", record.slo.error_rate),
            ("availability", record.slo.availability),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                issues.push(ValidationIssue::record(
                    index,
                    id,
                    format!("slo.{} must be a finite number", field),
                ));
            }
        }

        for key in REQUIRED_TAG_KEYS {
            if !record.tag(key).is_some_and(|v| !v.is_empty()) {
                issues.push(ValidationIssue::record(
                    index,
                    id,
                    format!("missing required tag `{}:*`", key),
                ));
            }
        }
    }

    issues
}

/// Best-effort id extraction from a record that failed to deserialize.
fn raw_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}

fn invalid(origin: &str, issues: Vec<ValidationIssue>) -> RegistryError {
    RegistryError::Invalid {
        origin: origin.to_string(),
        issues,
    }
}
