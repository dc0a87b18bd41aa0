use std::time::Duration;

use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use tracing::{debug, error, info, warn};

use crate::common::retry::{LoopBackoff, RetryPolicy};
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::modules::dispatch::completion::CompletionHandler;
use crate::modules::dispatch::scheduler::SchedulerState;
use crate::modules::jobs::events::StatusEvent;

/// Consumes worker status events from the status queue and feeds them to the
/// completion handler. Reconnects with backoff if the consumer stream ends.
pub async fn start_status_consumer(mq: RabbitMqService, scheduler: SchedulerState, queue_name: String) {
    info!("📡 Starting status consumer on '{}'", queue_name);

    let mut backoff = LoopBackoff::new(
        RetryPolicy::new("status_consumer").with_base_delay(Duration::from_secs(1)),
    );

    loop {
        match consume(&mq, &scheduler, &queue_name, &mut backoff).await {
            Ok(()) => warn!("Status consumer stream ended, restarting"),
            Err(e) => error!("Status consumer failed: {}", e),
        }

        let delay = backoff.record_failure();
        tokio::time::sleep(delay).await;
        if backoff.failures() > 1 {
            if let Err(e) = mq.reconnect().await {
                warn!("RabbitMQ reconnect failed: {}", e);
            }
        }
    }
}

async fn consume(
    mq: &RabbitMqService,
    scheduler: &SchedulerState,
    queue_name: &str,
    backoff: &mut LoopBackoff,
) -> anyhow::Result<()> {
    let channel = mq.consumer_channel().await?;

    channel
        .queue_declare(
            queue_name,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            queue_name,
            "status_consumer",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!("📡 Status consumer listening on '{}'", queue_name);
    backoff.record_success();

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;

        let event = match serde_json::from_slice::<StatusEvent>(&delivery.data) {
            Ok(event) => event,
            Err(e) => {
                error!("Dropping malformed status event: {}", e);
                delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..BasicNackOptions::default()
                    })
                    .await?;
                continue;
            }
        };

        let job_id = event.job_id;
        let status = event.status;
        match CompletionHandler::handle(scheduler, event).await {
            Ok(outcome) => {
                debug!(job_id = %job_id, ?status, ?outcome, "Status event handled");
                delivery.ack(BasicAckOptions::default()).await?;
            }
            Err(e) => {
                let requeue = e.is_transient();
                warn!(job_id = %job_id, ?status, requeue, "Status event failed: {}", e);
                delivery
                    .nack(BasicNackOptions {
                        requeue,
                        ..BasicNackOptions::default()
                    })
                    .await?;
            }
        }
    }

    Ok(())
}
