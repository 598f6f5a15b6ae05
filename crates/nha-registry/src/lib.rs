//! # nha-registry
//!
//! Declarative trust registry for Non-Human Agents (NHAs).
//!
//! The trust source is a YAML document listing every agent the policy gate
//! knows about, together with the actions ([`AgentRecord::permissions`]),
//! scopes ([`CapabilityBundle::scopes`]) and logical secret names it is
//! entitled to. [`load`] parses and validates it into a [`Registry`]; a
//! document with any structural problem is rejected as a whole.
//!
//! ## Key invariants
//!
//! - **No partial loads**: one bad record rejects the document, and the
//!   error lists every issue found.
//! - **Unique identity**: no two records share an `id` or a `name`.
//! - **Namespaced ids**: every id matches `nha:<slug>`.
//! - **Required tags**: every record carries `env:*` and `service:*`.

pub mod digest;
pub mod error;
pub mod export;
pub mod loader;
pub mod model;

pub use digest::registry_digest;
pub use error::{RegistryError, ValidationIssue};
pub use export::{
    load_backup, to_json_projection, to_markdown, to_yaml, write_atomic, write_backup,
    write_markdown, RegistryProjection,
};
pub use loader::{load, parse_str, validate};
pub use model::{
    AgentRecord, AgentStatus, CapabilityBundle, Category, Channel, ChannelKind, Registry, Slo,
};
