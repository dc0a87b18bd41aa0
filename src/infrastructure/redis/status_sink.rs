use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;

use super::client::RedisService;
use crate::common::error::{DispatchError, DispatchResult};
use crate::modules::dispatch::ports::StatusSink;
use crate::modules::jobs::events::StatusReport;
use crate::modules::jobs::model::JobId;

pub fn status_channel(job_id: JobId) -> String {
    format!("job-status:{}", job_id)
}

#[derive(Serialize)]
struct StatusMessage<'a> {
    job_id: JobId,
    #[serde(flatten)]
    report: &'a StatusReport,
}

/// Publishes lifecycle changes on a per-job pub/sub channel.
#[derive(Clone)]
pub struct RedisStatusSink {
    redis: RedisService,
}

impl RedisStatusSink {
    pub fn new(redis: RedisService) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl StatusSink for RedisStatusSink {
    async fn report(&self, job_id: JobId, report: &StatusReport) -> DispatchResult<()> {
        let payload = serde_json::to_string(&StatusMessage { job_id, report })?;
        let mut conn = self
            .redis
            .get_conn()
            .await
            .map_err(|e| DispatchError::Sink(e.to_string()))?;

        let _receivers: i64 = conn.publish(status_channel(job_id), payload).await?;
        Ok(())
    }
}
