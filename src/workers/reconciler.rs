use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::modules::dispatch::reconciler::Reconciler;
use crate::modules::dispatch::scheduler::SchedulerState;

pub async fn start_reconciler(scheduler: SchedulerState, interval: Duration) {
    info!("🩺 Starting reconciler every {:?}", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = Reconciler::reconcile_once(&scheduler, OffsetDateTime::now_utc()).await {
            warn!("Reconciliation pass failed: {}", e);
        }
    }
}
