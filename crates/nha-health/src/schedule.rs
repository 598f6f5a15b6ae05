// schedule.rs — Periodic health checks on the tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::checker::HealthChecker;
use crate::report::{CheckStatus, HealthReport};

/// Run `checker` every `period` until the returned handle is aborted.
///
/// Checks touch the filesystem, so each run happens on the blocking pool.
/// The first run happens one full period after the call.
pub fn spawn_periodic(checker: Arc<HealthChecker>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick.
        ticker.tick().await;

        tracing::info!(interval_secs = period.as_secs(), "periodic health checks started");
        loop {
            ticker.tick().await;
            let checker = Arc::clone(&checker);
            match tokio::task::spawn_blocking(move || checker.run()).await {
                Ok(report) => log_report(&report),
                Err(e) => tracing::error!(error = %e, "health check task panicked"),
            }
        }
    })
}

/// Log a report at a level matching its worst check.
pub fn log_report(report: &HealthReport) {
    if report.healed {
        tracing::info!(actions = ?report.actions, "self-heal completed");
    }
    for check in report.checks.iter().filter(|c| c.status != CheckStatus::Pass) {
        tracing::warn!(check = check.name, status = %check.status, detail = %check.detail, "health check");
    }
    match report.overall {
        CheckStatus::Pass => tracing::debug!("health: pass"),
        CheckStatus::Warn => tracing::info!("health: warn"),
        CheckStatus::Fail => tracing::warn!("health: fail"),
        CheckStatus::Critical => tracing::error!("health: critical"),
    }
}
