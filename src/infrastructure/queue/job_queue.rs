use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{BasicAckOptions, BasicGetOptions, BasicNackOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::rabbitmq::RabbitMqService;
use crate::common::error::{DispatchError, DispatchResult};
use crate::infrastructure::redis::client::RedisService;
use crate::modules::dispatch::ports::{EnqueueOutcome, JobQueue, QueuedMessage};
use crate::modules::jobs::events::JobEnqueued;

pub const PARTITION_HEADER: &str = "x-partition-key";

fn dedup_marker(dedup_key: &str) -> String {
    format!("dedup:{}", dedup_key)
}

/// Delivery tags only mean something on the channel that handed them out,
/// so receipts carry the generation of that channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Receipt {
    generation: u64,
    delivery_tag: u64,
}

impl Receipt {
    fn encode(&self) -> String {
        format!("{}.{}", self.generation, self.delivery_tag)
    }

    fn parse(receipt_handle: &str) -> DispatchResult<Self> {
        let invalid = || DispatchError::queue(format!("invalid receipt handle '{receipt_handle}'"));
        let (generation, tag) = receipt_handle.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            generation: generation.parse().map_err(|_| invalid())?,
            delivery_tag: tag.parse().map_err(|_| invalid())?,
        })
    }
}

struct ReceiveChannel {
    channel: Channel,
    generation: u64,
}

/// The tag to settle, or `None` when the receipt came from a channel that has
/// since been replaced. The broker already requeued those messages.
fn live_tag(current_generation: u64, receipt: Receipt) -> Option<u64> {
    (receipt.generation == current_generation).then_some(receipt.delivery_tag)
}

/// Job Queue on a durable RabbitMQ queue. Duplicate suppression uses a Redis
/// marker that lives for the dedup window. Receiving and settling use a
/// channel of their own, never the shared publishing channel.
#[derive(Clone)]
pub struct RabbitJobQueue {
    mq: RabbitMqService,
    redis: RedisService,
    queue_name: String,
    dedup_window: Duration,
    receiver: Arc<Mutex<ReceiveChannel>>,
}

impl RabbitJobQueue {
    pub async fn new(
        mq: RabbitMqService,
        redis: RedisService,
        queue_name: &str,
        dedup_window: Duration,
    ) -> anyhow::Result<Self> {
        let channel = mq.consumer_channel().await?;

        Ok(Self {
            mq,
            redis,
            queue_name: queue_name.to_string(),
            dedup_window,
            receiver: Arc::new(Mutex::new(ReceiveChannel {
                channel,
                generation: 0,
            })),
        })
    }

    async fn settle(&self, receipt_handle: &str, ack: bool) -> DispatchResult<()> {
        let receipt = Receipt::parse(receipt_handle)?;
        let receiver = self.receiver.lock().await;
        let Some(tag) = live_tag(receiver.generation, receipt) else {
            debug!(receipt_handle, current = receiver.generation, "Skipping receipt from a replaced channel");
            return Ok(());
        };

        let settled = if ack {
            receiver.channel.basic_ack(tag, BasicAckOptions::default()).await
        } else {
            receiver
                .channel
                .basic_nack(
                    tag,
                    BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    },
                )
                .await
        };
        settled.map_err(|e| DispatchError::queue(format!("failed to settle job message: {e}")))
    }
}

#[async_trait]
impl JobQueue for RabbitJobQueue {
    async fn enqueue(
        &self,
        partition_key: &str,
        dedup_key: &str,
        payload: &JobEnqueued,
    ) -> DispatchResult<EnqueueOutcome> {
        let body = serde_json::to_vec(payload)?;
        let marker = dedup_marker(dedup_key);
        let mut conn = self.redis.get_conn().await?;

        let set: Option<String> = redis::cmd("SET")
            .arg(&marker)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.dedup_window.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        if set.is_none() {
            return Ok(EnqueueOutcome::Duplicate);
        }

        let mut headers = FieldTable::default();
        headers.insert(
            PARTITION_HEADER.into(),
            AMQPValue::LongString(partition_key.into()),
        );
        let properties = BasicProperties::default()
            .with_message_id(dedup_key.into())
            .with_content_type("application/json".into())
            .with_headers(headers);

        if let Err(e) = self.mq.publish(&self.queue_name, &body, properties).await {
            // Let the caller's retry through the dedup gate.
            let cleared: redis::RedisResult<i64> = conn.del(&marker).await;
            if let Err(del_err) = cleared {
                error!("Could not clear dedup marker {}: {}", marker, del_err);
            }
            return Err(DispatchError::queue(e.to_string()));
        }

        Ok(EnqueueOutcome::Enqueued)
    }

    async fn receive(&self, max_messages: u16) -> DispatchResult<Vec<QueuedMessage>> {
        let receiver = self.receiver.lock().await;
        let mut messages = Vec::new();

        while messages.len() < usize::from(max_messages) {
            let Some(message) = receiver
                .channel
                .basic_get(&self.queue_name, BasicGetOptions { no_ack: false })
                .await
                .map_err(|e| DispatchError::queue(format!("failed to get job message: {e}")))?
            else {
                break;
            };

            let delivery_tag = message.delivery.delivery_tag;
            match serde_json::from_slice::<JobEnqueued>(&message.delivery.data) {
                Ok(payload) => messages.push(QueuedMessage {
                    receipt_handle: Receipt {
                        generation: receiver.generation,
                        delivery_tag,
                    }
                    .encode(),
                    payload,
                }),
                Err(e) => {
                    error!(delivery_tag, "Dropping malformed job message: {}", e);
                    receiver
                        .channel
                        .basic_nack(delivery_tag, BasicNackOptions::default())
                        .await
                        .map_err(|e| DispatchError::queue(format!("failed to reject job message: {e}")))?;
                }
            }
        }

        if !messages.is_empty() {
            debug!(count = messages.len(), "Received job messages");
        }
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> DispatchResult<()> {
        self.settle(receipt_handle, true).await
    }

    async fn requeue(&self, receipt_handle: &str) -> DispatchResult<()> {
        self.settle(receipt_handle, false).await
    }

    async fn recover(&self) -> DispatchResult<()> {
        let channel = self
            .mq
            .reopen_channel()
            .await
            .map_err(|e| DispatchError::queue(e.to_string()))?;

        let mut receiver = self.receiver.lock().await;
        if let Err(e) = receiver.channel.close(200, "replaced".into()).await {
            warn!("Closing old job queue channel failed: {}", e);
        }
        receiver.channel = channel;
        receiver.generation += 1;
        info!(generation = receiver.generation, "Job queue channel reopened");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_handle_carries_channel_generation() {
        let receipt = Receipt {
            generation: 3,
            delivery_tag: 42,
        };
        assert_eq!(receipt.encode(), "3.42");
        assert_eq!(Receipt::parse("3.42").unwrap(), receipt);
        assert!(Receipt::parse("42").is_err());
        assert!(Receipt::parse("x.42").is_err());
    }

    #[test]
    fn receipts_from_a_replaced_channel_are_not_settled() {
        let receipt = Receipt::parse("1.7").unwrap();
        assert_eq!(live_tag(1, receipt), Some(7));
        assert_eq!(live_tag(2, receipt), None);
    }

    #[test]
    fn dedup_marker_is_namespaced() {
        assert_eq!(dedup_marker("abc"), "dedup:abc");
    }
}
