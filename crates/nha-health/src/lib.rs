//! # nha-health
//!
//! Self-healing health checker for the NHA policy gate.
//!
//! [`HealthChecker::run`] verifies the trust source, the enforcement posture,
//! the audit sink and the backup projection, and restores a broken trust
//! source from the backup when it can. The resulting [`HealthReport`] maps to
//! a process exit code via [`HealthReport::exit_code`].

pub mod checker;
pub mod error;
pub mod report;
pub mod schedule;

pub use checker::{
    HealOutcome, HealthChecker, HealthConfig, CHECK_AUDIT, CHECK_BACKUP, CHECK_MODE,
    CHECK_REGISTRY,
};
pub use error::HealthError;
pub use report::{CheckResult, CheckStatus, HealthReport};
pub use schedule::{log_report, spawn_periodic};
