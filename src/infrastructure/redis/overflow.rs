use async_trait::async_trait;
use redis::AsyncCommands;

use super::client::RedisService;
use crate::common::error::{DispatchError, DispatchResult};
use crate::modules::dispatch::ports::{OverflowEntry, OverflowQueue};

pub const OVERFLOW_KEY: &str = "admission:overflow";

/// Overflow FIFO as a Redis list: head on the left.
#[derive(Clone)]
pub struct RedisOverflowQueue {
    redis: RedisService,
    key: String,
}

impl RedisOverflowQueue {
    pub fn new(redis: RedisService) -> Self {
        Self {
            redis,
            key: OVERFLOW_KEY.to_string(),
        }
    }

    async fn conn(&self) -> DispatchResult<redis::aio::MultiplexedConnection> {
        self.redis
            .get_conn()
            .await
            .map_err(|e| DispatchError::Overflow(format!("connection failed: {e}")))
    }
}

fn encode(entry: &OverflowEntry) -> DispatchResult<String> {
    Ok(serde_json::to_string(entry)?)
}

#[async_trait]
impl OverflowQueue for RedisOverflowQueue {
    async fn push_back(&self, entry: &OverflowEntry) -> DispatchResult<()> {
        let payload = encode(entry)?;
        let mut conn = self.conn().await?;
        let _: i64 = conn
            .rpush(&self.key, payload)
            .await
            .map_err(|e| DispatchError::Overflow(e.to_string()))?;
        Ok(())
    }

    async fn push_front(&self, entry: &OverflowEntry) -> DispatchResult<()> {
        let payload = encode(entry)?;
        let mut conn = self.conn().await?;
        let _: i64 = conn
            .lpush(&self.key, payload)
            .await
            .map_err(|e| DispatchError::Overflow(e.to_string()))?;
        Ok(())
    }

    async fn pop_front(&self) -> DispatchResult<Option<OverflowEntry>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .lpop(&self.key, None)
            .await
            .map_err(|e| DispatchError::Overflow(e.to_string()))?;

        raw.map(|r| serde_json::from_str(&r).map_err(DispatchError::from))
            .transpose()
    }

    async fn contains(&self, entry: &OverflowEntry) -> DispatchResult<bool> {
        let payload = encode(entry)?;
        let mut conn = self.conn().await?;
        let position: Option<i64> = redis::cmd("LPOS")
            .arg(&self.key)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| DispatchError::Overflow(e.to_string()))?;
        Ok(position.is_some())
    }

    async fn len(&self) -> DispatchResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn
            .llen(&self.key)
            .await
            .map_err(|e| DispatchError::Overflow(e.to_string()))?;
        Ok(len)
    }
}
