// config.rs — Gate configuration.
//
// GateConfig determines where the gate finds its trust source, where it
// writes audit records, and which enforcement mode it runs in. Layers, in
// increasing precedence:
//
//   1. `for_project()` defaults under `<root>/.nha/`
//   2. `<root>/.nha/gate.toml`, if present
//   3. NHA_* environment variables
//
// The CLI applies its own flags on top of the result.
//
// The enforcement mode is fixed once the process starts. A mode string that
// does not parse is an error; it never falls back to a more permissive mode.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_REGISTRY_PATH: &str = "NHA_REGISTRY_PATH";
pub const ENV_POLICY_VERSION: &str = "NHA_POLICY_VERSION";
pub const ENV_ENFORCEMENT_MODE: &str = "NHA_ENFORCEMENT_MODE";
pub const ENV_AUDIT_DIR: &str = "NHA_AUDIT_DIR";
pub const ENV_BACKUP_PATH: &str = "NHA_BACKUP_PATH";
pub const ENV_EXPECTED_MODE: &str = "NHA_EXPECTED_MODE";

/// Global enforcement posture.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementMode {
    /// Unknown agents and disallowed actions are denied.
    #[default]
    Deny,
    /// Disallowed actions are allowed but flagged WARN and audited.
    Warn,
    /// Deny semantics, and any failure to load the registry at startup is fatal.
    FailClosed,
}

impl EnforcementMode {
    pub fn is_warn(&self) -> bool {
        matches!(self, EnforcementMode::Warn)
    }

    pub fn is_fail_closed(&self) -> bool {
        matches!(self, EnforcementMode::FailClosed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementMode::Deny => "deny",
            EnforcementMode::Warn => "warn",
            EnforcementMode::FailClosed => "fail-closed",
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnforcementMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" => Ok(EnforcementMode::Deny),
            "warn" => Ok(EnforcementMode::Warn),
            "fail-closed" | "fail_closed" => Ok(EnforcementMode::FailClosed),
            _ => Err(ConfigError::InvalidMode {
                value: s.to_string(),
                origin: "input".to_string(),
            }),
        }
    }
}

/// Configuration for the policy gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateConfig {
    /// Live YAML trust source.
    pub registry_path: PathBuf,

    /// Last-known-good JSON backup projection.
    pub backup_path: PathBuf,

    /// Markdown overview written by `nha export`.
    pub markdown_path: PathBuf,

    /// Directory holding the JSONL audit log.
    pub audit_dir: PathBuf,

    /// Operator-assigned policy version label, stamped on every decision.
    pub policy_version: String,

    /// Enforcement mode for this process.
    pub mode: EnforcementMode,

    /// Posture the health checker expects (e.g. fail-closed in production).
    /// Defaults to `mode` when unset.
    #[serde(default)]
    pub expected_mode: Option<EnforcementMode>,
}

/// On-disk shape of `.nha/gate.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GateFile {
    registry_path: Option<PathBuf>,
    backup_path: Option<PathBuf>,
    markdown_path: Option<PathBuf>,
    audit_dir: Option<PathBuf>,
    policy_version: Option<String>,
    mode: Option<String>,
    expected_mode: Option<String>,
}

impl GateConfig {
    /// Create a config with the standard `.nha/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let nha_dir = project_root.as_ref().join(".nha");
        Self {
            registry_path: nha_dir.join("registry.yaml"),
            backup_path: nha_dir.join("registry.backup.json"),
            markdown_path: nha_dir.join("REGISTRY.md"),
            audit_dir: nha_dir.join("audit"),
            policy_version: "unversioned".to_string(),
            mode: EnforcementMode::Deny,
            expected_mode: None,
        }
    }

    /// Defaults, then `.nha/gate.toml`, then process environment.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = project_root.as_ref();
        let mut config = Self::for_project(root);
        let file = root.join(".nha").join("gate.toml");
        if file.exists() {
            config.apply_file(&file, root)?;
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay a TOML config file. Relative paths resolve against `root`.
    pub fn apply_file(&mut self, path: &Path, root: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let file: GateFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();

        let resolve = |p: PathBuf| if p.is_relative() { root.join(p) } else { p };
        if let Some(p) = file.registry_path {
            self.registry_path = resolve(p);
        }
        if let Some(p) = file.backup_path {
            self.backup_path = resolve(p);
        }
        if let Some(p) = file.markdown_path {
            self.markdown_path = resolve(p);
        }
        if let Some(p) = file.audit_dir {
            self.audit_dir = resolve(p);
        }
        if let Some(v) = file.policy_version {
            self.policy_version = v;
        }
        if let Some(m) = file.mode {
            self.mode = parse_mode(&m, &origin)?;
        }
        if let Some(m) = file.expected_mode {
            self.expected_mode = Some(parse_mode(&m, &origin)?);
        }
        Ok(())
    }

    /// Overlay NHA_* variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay NHA_* variables from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_REGISTRY_PATH) {
            self.registry_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_BACKUP_PATH) {
            self.backup_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_AUDIT_DIR) {
            self.audit_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_POLICY_VERSION) {
            self.policy_version = v;
        }
        if let Some(v) = get(ENV_ENFORCEMENT_MODE) {
            self.mode = parse_mode(&v, ENV_ENFORCEMENT_MODE)?;
        }
        if let Some(v) = get(ENV_EXPECTED_MODE) {
            self.expected_mode = Some(parse_mode(&v, ENV_EXPECTED_MODE)?);
        }
        Ok(())
    }

    /// The posture the health checker should verify against.
    pub fn expected_mode(&self) -> EnforcementMode {
        self.expected_mode.unwrap_or(self.mode)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.audit_dir.join(nha_audit::AUDIT_FILE_NAME)
    }
}

fn parse_mode(value: &str, origin: &str) -> Result<EnforcementMode, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidMode {
        value: value.to_string(),
        origin: origin.to_string(),
    })
}
