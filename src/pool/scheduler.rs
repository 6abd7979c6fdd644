//! Background timers driving the pool's maintenance work.

use super::TokenPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::info;

/// RefreshScheduler period.
const REFRESH_INTERVAL: Duration = Duration::from_secs(240);

/// QuotaScheduler period and initial delay.
const QUOTA_INTERVAL: Duration = Duration::from_secs(600);
const QUOTA_INITIAL_DELAY: Duration = Duration::from_secs(30);

/// Spawn both schedulers as long-lived tasks.
///
/// A tick that overruns its period finishes; the next tick is skipped rather
/// than queued (`MissedTickBehavior::Skip`).
pub fn spawn_schedulers(pool: Arc<TokenPool>) {
    tokio::spawn({
        let pool = pool.clone();
        async move {
            let mut ticker =
                interval_at(Instant::now() + REFRESH_INTERVAL, REFRESH_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("refresh scheduler started (period {REFRESH_INTERVAL:?})");
            loop {
                ticker.tick().await;
                pool.refresh_all_expiring().await;
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + QUOTA_INITIAL_DELAY, QUOTA_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "quota scheduler started (period {QUOTA_INTERVAL:?}, initial delay {QUOTA_INITIAL_DELAY:?})"
        );
        loop {
            ticker.tick().await;
            pool.update_quota_scores().await;
        }
    });
}
