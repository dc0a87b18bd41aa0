use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::ports::Admission;
use super::scheduler::SchedulerState;
use crate::common::error::DispatchResult;
use crate::common::retry::{retry_async, RetryPolicy};
use crate::modules::jobs::model::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    AtCapacity,
    CounterUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    Admitted,
    Denied(DenyReason),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdmissionSnapshot {
    pub running: u32,
    pub max_concurrent: u32,
    pub overflow_depth: u64,
}

pub struct AdmissionController;

impl AdmissionController {
    /// Reserves one slot for `job_id`. An unreachable counter denies: the
    /// ceiling is never traded for liveness.
    pub async fn try_admit(state: &SchedulerState, job_id: JobId) -> AdmitDecision {
        match state.counter.try_reserve(job_id).await {
            Ok(Admission::Admitted { running }) => {
                info!(job_id = %job_id, running, "Admission granted");
                AdmitDecision::Admitted
            }
            Ok(Admission::Denied { running }) => {
                debug!(job_id = %job_id, running, "Admission denied, at capacity");
                AdmitDecision::Denied(DenyReason::AtCapacity)
            }
            Err(e) => {
                warn!(job_id = %job_id, "Admission counter unavailable, denying: {}", e);
                AdmitDecision::Denied(DenyReason::CounterUnavailable)
            }
        }
    }

    /// Returns `job_id`'s slot. Safe to repeat; only the first call frees it.
    pub async fn release(state: &SchedulerState, job_id: JobId) -> DispatchResult<bool> {
        let released = retry_async(&RetryPolicy::new("admission_release"), || {
            state.counter.release(job_id)
        })
        .await?;

        if released {
            info!(job_id = %job_id, "Admission slot released");
        } else {
            debug!(job_id = %job_id, "No admission slot held, release ignored");
        }
        Ok(released)
    }

    pub async fn snapshot(state: &SchedulerState) -> DispatchResult<AdmissionSnapshot> {
        Ok(AdmissionSnapshot {
            running: state.counter.running().await?,
            max_concurrent: state.counter.max_concurrent(),
            overflow_depth: state.overflow.len().await?,
        })
    }
}
