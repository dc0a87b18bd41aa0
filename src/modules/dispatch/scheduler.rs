use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::ports::{AdmissionCounter, ArtifactStore, ComputePlatform, JobQueue, OverflowQueue, StatusSink};
use crate::modules::jobs::events::StatusReport;
use crate::modules::jobs::model::JobId;
use crate::modules::jobs::repository::JobStore;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_concurrent: u32,
    pub dedup_window: Duration,
    pub launch_timeout: Duration,
    pub launch_claim_ttl: Duration,
    pub reconcile_grace: Duration,
    pub stale_queued_after: Duration,
    pub callback_base_url: String,
    pub callback_secret: String,
    pub callback_token_ttl: Duration,
    pub status_queue_name: String,
}

/// Handles to every shared store the scheduler touches. Passed explicitly to
/// each operation; holds no scheduling state of its own.
#[derive(Clone)]
pub struct SchedulerState {
    pub settings: Arc<SchedulerSettings>,
    pub counter: Arc<dyn AdmissionCounter>,
    pub overflow: Arc<dyn OverflowQueue>,
    pub queue: Arc<dyn JobQueue>,
    pub jobs: Arc<dyn JobStore>,
    pub compute: Arc<dyn ComputePlatform>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub sink: Arc<dyn StatusSink>,
}

impl SchedulerState {
    /// Sink failures are logged, never propagated into scheduling.
    pub async fn report(&self, job_id: JobId, report: StatusReport) {
        if let Err(e) = self.sink.report(job_id, &report).await {
            warn!(job_id = %job_id, status = %report.status, "Status sink failed: {}", e);
        }
    }
}
