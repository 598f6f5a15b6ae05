//! # nha-policy
//!
//! Runtime policy enforcement for Non-Human Agents.
//!
//! This crate holds the in-memory [`PolicyCache`] built from the trust
//! registry and the [`Enforcer`] that decides, per request, whether an agent
//! may perform an action. Every decision yields an immutable
//! [`EnforcementResult`] and exactly one audit record.
//!
//! ## Key invariants
//!
//! - **Deny by default**: an agent missing from the registry is denied
//!   (flagged `WARN` in warn mode, never silently allowed).
//! - **Whole-snapshot swaps**: a reload replaces the cache atomically; a
//!   failed reload keeps the previous snapshot.
//! - **Fail-closed startup**: in fail-closed mode the gate refuses to start
//!   without a verified trust source.
//! - **Secrets are never downgraded**: a secret the agent is not entitled to
//!   is denied in every mode.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use nha_policy::{Decision, EnforcementRequest, Enforcer, GateConfig};
//!
//! let config = GateConfig::load(".").unwrap();
//! let enforcer = Enforcer::bootstrap(&config).unwrap();
//!
//! let result = enforcer.enforce(
//!     EnforcementRequest::new("nha:rag-worker", "run.invoker").with_scope("write:vectors"),
//! );
//! assert_eq!(result.decision(), Decision::Allow);
//! ```

pub mod cache;
pub mod config;
pub mod decision;
pub mod enforcer;
pub mod error;

pub use cache::{PolicyCache, PolicySnapshot, EMPTY_REGISTRY_VERSION};
pub use config::{EnforcementMode, GateConfig};
pub use decision::{Decision, EnforcementRequest, EnforcementResult, Reason};
pub use enforcer::{is_read_only, Enforcer, EnforcerHealth};
pub use error::{ConfigError, PolicyError};
