// report.rs — Check results and the aggregated health report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a single check, ordered by severity.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
    /// The check failed and self-heal could not repair it.
    Critical,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    pub fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }

    pub fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, detail)
    }

    pub fn warn(name: &'static str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, detail)
    }

    pub fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, detail)
    }

    pub fn critical(name: &'static str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Critical, detail)
    }
}

/// Result of one full health run.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub overall: CheckStatus,
    pub checks: Vec<CheckResult>,
    /// True when self-heal restored the trust source during this run.
    pub healed: bool,
    /// Human-readable log of the repair steps taken, if any.
    pub actions: Vec<String>,
}

impl HealthReport {
    pub fn new(checks: Vec<CheckResult>, actions: Vec<String>, healed: bool) -> Self {
        let overall = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(CheckStatus::Pass);
        Self {
            checked_at: Utc::now(),
            overall,
            checks,
            healed,
            actions,
        }
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Process exit code for this report.
    ///
    /// `critical` is always non-zero (2). `fail` is non-zero (1) only under
    /// fail-closed; otherwise failures are reported but tolerated.
    pub fn exit_code(&self, fail_closed: bool) -> i32 {
        match self.overall {
            CheckStatus::Critical => 2,
            CheckStatus::Fail if fail_closed => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NHA gate health: {}", self.overall.as_str().to_uppercase())?;
        for check in &self.checks {
            writeln!(f, "  [{:<8}] {:<20} {}", check.status, check.name, check.detail)?;
        }
        if !self.actions.is_empty() {
            writeln!(f, "Self-heal:")?;
            for action in &self.actions {
                writeln!(f, "  - {action}")?;
            }
        }
        Ok(())
    }
}
