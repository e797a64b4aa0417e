//! Periodic memory check.
//!
//! Catches growth that happens between jobs (or while idle), which the
//! per-job peak tracking cannot see.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::monitor::ResourceMonitor;

/// Run the watchdog loop until `cancel` is triggered.
///
/// The first check happens one `period` after start.
pub async fn run(monitor: Arc<ResourceMonitor>, period: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = period.as_secs(),
        limit_mb = monitor.ram_limit_mb(),
        "Memory watchdog started"
    );

    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Memory watchdog stopping");
                break;
            }
            _ = interval.tick() => {
                if monitor.check_periodic() {
                    tracing::info!("Memory watchdog: restart scheduled");
                }
            }
        }
    }
}
