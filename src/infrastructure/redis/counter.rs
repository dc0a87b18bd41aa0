use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

use super::client::RedisService;
use crate::common::error::{DispatchError, DispatchResult};
use crate::modules::dispatch::ports::{Admission, AdmissionCounter};
use crate::modules::jobs::model::JobId;

pub const SLOT_HOLDERS_KEY: &str = "admission:holders";

// Add, compare, undo if over: one server-side step. Returns {admitted, running}.
const RESERVE_SCRIPT: &str = r#"
if redis.call('SISMEMBER', KEYS[1], ARGV[1]) == 1 then
    return {1, redis.call('SCARD', KEYS[1])}
end
redis.call('SADD', KEYS[1], ARGV[1])
local running = redis.call('SCARD', KEYS[1])
if running > tonumber(ARGV[2]) then
    redis.call('SREM', KEYS[1], ARGV[1])
    return {0, running - 1}
end
return {1, running}
"#;

/// Slot counter kept as the set of job ids currently holding a slot, so a
/// release is tied to the job that reserved it.
#[derive(Clone)]
pub struct RedisAdmissionCounter {
    redis: RedisService,
    key: String,
    max_concurrent: u32,
}

impl RedisAdmissionCounter {
    pub fn new(redis: RedisService, max_concurrent: u32) -> Self {
        Self {
            redis,
            key: SLOT_HOLDERS_KEY.to_string(),
            max_concurrent,
        }
    }

    async fn conn(&self) -> DispatchResult<redis::aio::MultiplexedConnection> {
        self.redis
            .get_conn()
            .await
            .map_err(|e| DispatchError::Counter(format!("connection failed: {e}")))
    }
}

#[async_trait]
impl AdmissionCounter for RedisAdmissionCounter {
    async fn try_reserve(&self, job_id: JobId) -> DispatchResult<Admission> {
        let mut conn = self.conn().await?;

        let (admitted, running): (i64, i64) = Script::new(RESERVE_SCRIPT)
            .key(&self.key)
            .arg(job_id.to_string())
            .arg(self.max_concurrent)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| DispatchError::Counter(format!("reserve script failed: {e}")))?;

        let running = running.max(0) as u32;
        Ok(if admitted == 1 {
            Admission::Admitted { running }
        } else {
            Admission::Denied { running }
        })
    }

    async fn release(&self, job_id: JobId) -> DispatchResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn
            .srem(&self.key, job_id.to_string())
            .await
            .map_err(|e| DispatchError::Counter(format!("release failed: {e}")))?;
        Ok(removed == 1)
    }

    async fn running(&self) -> DispatchResult<u32> {
        let mut conn = self.conn().await?;
        let running: u64 = conn
            .scard(&self.key)
            .await
            .map_err(|e| DispatchError::Counter(e.to_string()))?;
        Ok(running as u32)
    }

    async fn holders(&self) -> DispatchResult<Vec<JobId>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn
            .smembers(&self.key)
            .await
            .map_err(|e| DispatchError::Counter(e.to_string()))?;

        Ok(members
            .iter()
            .filter_map(|m| Uuid::parse_str(m).ok())
            .collect())
    }

    fn max_concurrent(&self) -> u32 {
        self.max_concurrent
    }
}
