use std::time::Duration;

use tracing::{error, info, warn};

use crate::common::retry::{LoopBackoff, RetryPolicy};
use crate::modules::dispatch::dispatcher::{DispatchOutcome, Dispatcher};
use crate::modules::dispatch::ports::QueuedMessage;
use crate::modules::dispatch::scheduler::SchedulerState;

/// Consecutive receive failures before the queue's channel is reopened.
const RECOVER_AFTER_FAILURES: u32 = 3;

/// Polls the Job Queue in bounded batches. A message is acknowledged only
/// once its job is launched, parked, or found already handled.
pub async fn start_dispatcher_worker(scheduler: SchedulerState, poll_interval: Duration, batch_size: u16) {
    info!("📥 Starting queue dispatcher (batch {})", batch_size);

    let mut backoff = LoopBackoff::new(
        RetryPolicy::new("job_queue_receive").with_base_delay(Duration::from_secs(1)),
    );

    loop {
        let messages = match scheduler.queue.receive(batch_size).await {
            Ok(messages) => {
                backoff.record_success();
                messages
            }
            Err(e) => {
                let delay = backoff.record_failure();
                warn!(failures = backoff.failures(), "Job queue receive failed: {}", e);
                if should_recover(backoff.failures()) {
                    if let Err(e) = scheduler.queue.recover().await {
                        warn!("Job queue recovery failed: {}", e);
                    }
                }
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        if messages.is_empty() {
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        for message in &messages {
            settle(&scheduler, message).await;
        }
    }
}

fn should_recover(failures: u32) -> bool {
    failures >= RECOVER_AFTER_FAILURES
}

pub async fn settle(scheduler: &SchedulerState, message: &QueuedMessage) {
    let source = message.payload.source();

    match Dispatcher::dispatch_message(scheduler, message).await {
        Ok(outcome) => {
            if let DispatchOutcome::Launched { worker_handle } = &outcome {
                info!(source = %source, worker_handle = %worker_handle, "Dispatched");
            }
            if let Err(e) = scheduler.queue.delete(&message.receipt_handle).await {
                // Redelivery is absorbed by the job status check.
                warn!(source = %source, "Failed to acknowledge job message: {}", e);
            }
        }
        Err(e) => {
            error!(source = %source, "Dispatch failed, returning message to queue: {}", e);
            if let Err(e) = scheduler.queue.requeue(&message.receipt_handle).await {
                warn!(source = %source, "Failed to requeue job message: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_is_reopened_only_after_repeated_failures() {
        assert!(!should_recover(1));
        assert!(!should_recover(RECOVER_AFTER_FAILURES - 1));
        assert!(should_recover(RECOVER_AFTER_FAILURES));
        assert!(should_recover(RECOVER_AFTER_FAILURES + 4));
    }
}
