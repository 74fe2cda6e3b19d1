//! Background scheduled tasks.
//!
//! Call `spawn_all` once during startup; tasks are detached with
//! `tokio::spawn` and never block the caller.

use crate::config::CronConfig;
use crate::services::QuotaService;
use chrono::Utc;
use std::time::Duration;

/// Spawn all background tasks.
///
/// The quota reset is idempotent, so it is safe to run alongside the
/// cron-triggered endpoint.
pub fn spawn_all(quota_service: QuotaService, cron: &CronConfig) {
    let interval = Duration::from_secs(cron.reset_interval_secs.max(60));

    // Roll expired FREE and lapsed periods forward
    tokio::spawn(async move {
        loop {
            match quota_service.reset_expired_periods(Utc::now()).await {
                Ok(n) if n > 0 => log::info!("Quota periods reset: {n}"),
                Ok(_) => {}
                Err(e) => log::error!("Failed to reset quota periods: {e:?}"),
            }
            tokio::time::sleep(interval).await;
        }
    });
}
