//! Seams between the scheduler and the stores/platforms it drives.
//!
//! Every method is expected to be atomic at the backing store: many
//! dispatcher processes share these, so no in-process lock can stand in for
//! the store's own guarantees.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::common::error::DispatchResult;
use crate::modules::jobs::events::{JobEnqueued, StatusReport};
use crate::modules::jobs::model::{JobId, SourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { running: u32 },
    Denied { running: u32 },
}

/// Global slot counter, `0 <= running <= max`.
#[async_trait]
pub trait AdmissionCounter: Send + Sync {
    /// Reserves a slot for `job_id` in one indivisible step. A job that
    /// already holds a slot is admitted again without taking a second one.
    async fn try_reserve(&self, job_id: JobId) -> DispatchResult<Admission>;

    /// Frees the slot held by `job_id`. Returns false if it held none, so a
    /// repeated release never frees someone else's slot.
    async fn release(&self, job_id: JobId) -> DispatchResult<bool>;

    async fn running(&self) -> DispatchResult<u32>;

    async fn holders(&self) -> DispatchResult<Vec<JobId>>;

    fn max_concurrent(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowEntry {
    pub job_id: JobId,
    pub bucket: String,
    pub key: String,
}

impl OverflowEntry {
    pub fn source(&self) -> SourceRef {
        SourceRef::new(&self.bucket, &self.key)
    }
}

impl From<&SourceRef> for OverflowEntry {
    fn from(source: &SourceRef) -> Self {
        Self {
            job_id: source.job_id(),
            bucket: source.bucket.clone(),
            key: source.key.clone(),
        }
    }
}

/// FIFO of jobs that were denied admission.
#[async_trait]
pub trait OverflowQueue: Send + Sync {
    async fn push_back(&self, entry: &OverflowEntry) -> DispatchResult<()>;

    /// Used after a failed launch so the job keeps its place at the head.
    async fn push_front(&self, entry: &OverflowEntry) -> DispatchResult<()>;

    async fn pop_front(&self) -> DispatchResult<Option<OverflowEntry>>;

    async fn contains(&self, entry: &OverflowEntry) -> DispatchResult<bool>;

    async fn len(&self) -> DispatchResult<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    Duplicate,
}

/// A received Job Queue message and the token needed to settle it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub receipt_handle: String,
    pub payload: JobEnqueued,
}

/// Durable at-least-once queue, FIFO per partition.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        partition_key: &str,
        dedup_key: &str,
        payload: &JobEnqueued,
    ) -> DispatchResult<EnqueueOutcome>;

    /// Returns at most `max_messages` without blocking for long.
    async fn receive(&self, max_messages: u16) -> DispatchResult<Vec<QueuedMessage>>;

    /// Acknowledges a message once its job is durably admitted or parked.
    async fn delete(&self, receipt_handle: &str) -> DispatchResult<()>;

    /// Hands a message back for redelivery.
    async fn requeue(&self, receipt_handle: &str) -> DispatchResult<()>;

    /// Re-establishes the receiving side after repeated failures. Receipts
    /// handed out before the call become no-ops.
    async fn recover(&self) -> DispatchResult<()>;
}

/// Execution context injected into a worker task.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerContext {
    pub job_id: JobId,
    pub source: SourceRef,
    pub callback_url: String,
    pub callback_token: String,
    pub status_queue: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Running,
    Stopped {
        exit_code: Option<i32>,
        stopped_at: Option<OffsetDateTime>,
        reason: Option<String>,
    },
    Missing,
}

#[async_trait]
pub trait ComputePlatform: Send + Sync {
    /// Starts one ephemeral task and returns its opaque handle.
    async fn run_task(&self, context: &WorkerContext) -> DispatchResult<String>;

    async fn describe_task(&self, worker_handle: &str) -> DispatchResult<TaskState>;

    /// Handle of a task started for `job_id` that has not stopped yet.
    async fn find_active_task(&self, job_id: JobId) -> DispatchResult<Option<String>>;
}

/// Object storage holding uploaded sources.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn delete(&self, source: &SourceRef) -> DispatchResult<()>;
}

/// Outbound lifecycle notifications; the transport is up to the implementor.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn report(&self, job_id: JobId, report: &StatusReport) -> DispatchResult<()>;
}
