// model.rs — Agent record and registry data model.
//
// An agent record is the unit of trust: it says who the agent is, how it is
// reached, and exactly which actions, scopes and secret names it is entitled
// to. Anything not listed is denied by the enforcer.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace every agent id must carry (e.g. `nha:rag-worker`).
pub const ID_PREFIX: &str = "nha:";

/// Tag keys every record must carry at least once.
pub const REQUIRED_TAG_KEYS: &[&str] = &["env", "service"];

/// The closed set of agent categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Personal,
    BusinessChannel,
    BusinessTool,
    #[serde(alias = "SEO-tool")]
    SeoTool,
    Agency,
    DevTool,
    Infra,
    Security,
    #[serde(alias = "ML-ops")]
    MlOps,
    Ops,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::BusinessChannel => "business-channel",
            Category::BusinessTool => "business-tool",
            Category::SeoTool => "seo-tool",
            Category::Agency => "agency",
            Category::DevTool => "dev-tool",
            Category::Infra => "infra",
            Category::Security => "security",
            Category::MlOps => "ml-ops",
            Category::Ops => "ops",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an agent.
///
/// - `Active`: normal enforcement.
/// - `Paused`: read-only actions only.
/// - `Deprecated`: every action is denied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Paused,
    Deprecated,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Paused => write!(f, "paused"),
            AgentStatus::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// How an agent is reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Http,
    Ws,
    Cli,
    Sdk,
    Ui,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelKind::Http => "http",
            ChannelKind::Ws => "ws",
            ChannelKind::Cli => "cli",
            ChannelKind::Sdk => "sdk",
            ChannelKind::Ui => "ui",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub kind: ChannelKind,
    pub endpoint: String,
    /// Authentication mode the channel expects (e.g. "oidc", "mtls", "none").
    pub auth: String,
}

/// A named bundle of scopes granted to an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityBundle {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Service-level objectives. Informational only, never enforced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Slo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p95_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<f64>,
}

/// A Non-Human Agent record.
///
/// Required document fields have no serde default, so a record missing one
/// fails to deserialize instead of silently picking up an empty value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub owner: String,
    pub status: AgentStatus,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityBundle>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub slo: Slo,
    #[serde(default)]
    pub notes: String,
}

impl AgentRecord {
    /// Union of scopes across every capability bundle.
    pub fn scopes(&self) -> BTreeSet<&str> {
        self.capabilities
            .iter()
            .flat_map(|bundle| bundle.scopes.iter().map(String::as_str))
            .collect()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.capabilities
            .iter()
            .any(|bundle| bundle.scopes.iter().any(|s| s == scope))
    }

    pub fn has_permission(&self, action: &str) -> bool {
        self.permissions.iter().any(|p| p == action)
    }

    pub fn has_secret(&self, secret: &str) -> bool {
        self.secrets.iter().any(|s| s == secret)
    }

    /// Value of the first `key:value` tag with the given key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find_map(|tag| {
            tag.split_once(':')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

/// The full trust registry: a version label plus every agent record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    pub version: String,
    pub nhas: Vec<AgentRecord>,
}

impl Registry {
    pub fn get(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.nhas.iter().find(|nha| nha.id == agent_id)
    }

    pub fn len(&self) -> usize {
        self.nhas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nhas.is_empty()
    }
}
