//! Periodic repair pass. Catches workers that died without reporting, slots
//! held by jobs that no longer need them, and queued jobs that fell out of
//! both queues.

use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::admission::AdmissionController;
use super::completion::{CompletionHandler, StatusOutcome};
use super::dispatcher::{Dispatcher, DrainReport};
use super::ports::{OverflowEntry, TaskState};
use super::scheduler::SchedulerState;
use crate::common::error::DispatchResult;
use crate::modules::jobs::model::{Job, JobMetadata, JobStatus, TerminalOutcome};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub settled: u32,
    pub slots_reclaimed: u32,
    pub requeued: u32,
    pub drained: DrainReport,
}

pub struct Reconciler;

impl Reconciler {
    pub async fn reconcile_once(
        state: &SchedulerState,
        now: OffsetDateTime,
    ) -> DispatchResult<ReconcileReport> {
        let mut report = ReconcileReport {
            settled: Self::settle_stopped_tasks(state, now).await?,
            slots_reclaimed: Self::reclaim_leaked_slots(state, now).await?,
            requeued: Self::requeue_stale_jobs(state, now).await?,
            ..Default::default()
        };
        report.drained = Dispatcher::drain_overflow(state).await?;

        if report.settled + report.slots_reclaimed + report.requeued > 0 {
            info!(
                settled = report.settled,
                slots_reclaimed = report.slots_reclaimed,
                requeued = report.requeued,
                launched = report.drained.launched,
                "Reconciliation pass repaired state"
            );
        }
        Ok(report)
    }

    async fn settle_stopped_tasks(state: &SchedulerState, now: OffsetDateTime) -> DispatchResult<u32> {
        let grace = state.settings.reconcile_grace;
        let mut settled = 0;

        for job in state.jobs.list_transcoding().await? {
            let Some(handle) = job.worker_handle.as_deref() else {
                continue;
            };

            let task = match state.compute.describe_task(handle).await {
                Ok(task) => task,
                Err(e) => {
                    warn!(job_id = %job.id, worker_handle = handle, "Task describe failed: {}", e);
                    continue;
                }
            };

            let Some(outcome) = Self::outcome_for(&job, &task, now, grace) else {
                continue;
            };

            warn!(
                job_id = %job.id,
                worker_handle = handle,
                status = %outcome.status(),
                "Worker stopped without a terminal report"
            );
            match CompletionHandler::apply_terminal_status(state, job.id, outcome).await {
                Ok(StatusOutcome::Applied) => settled += 1,
                Ok(StatusOutcome::Ignored) => {}
                Err(e) => warn!(job_id = %job.id, "Could not settle stopped job: {}", e),
            }
        }

        Ok(settled)
    }

    /// `None` while the task runs or is inside the grace period, which leaves
    /// room for its own `DONE` report (with metadata) to land first.
    fn outcome_for(
        job: &Job,
        task: &TaskState,
        now: OffsetDateTime,
        grace: Duration,
    ) -> Option<TerminalOutcome> {
        match task {
            TaskState::Running => None,
            TaskState::Stopped {
                exit_code,
                stopped_at,
                reason,
            } => {
                if stopped_at.is_some_and(|at| age(now, at) < grace) {
                    return None;
                }
                if *exit_code == Some(0) {
                    return Some(TerminalOutcome::Done(JobMetadata::default()));
                }
                let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
                Some(TerminalOutcome::Failed {
                    error: Some(format!(
                        "worker exited with code {} ({})",
                        code,
                        reason.as_deref().unwrap_or("no stop reason")
                    )),
                })
            }
            TaskState::Missing => {
                if age(now, job.updated_at) < grace {
                    return None;
                }
                Some(TerminalOutcome::Failed {
                    error: Some("worker task not found on compute platform".to_string()),
                })
            }
        }
    }

    async fn reclaim_leaked_slots(state: &SchedulerState, now: OffsetDateTime) -> DispatchResult<u32> {
        let claim_ttl = state.settings.launch_claim_ttl;
        let mut reclaimed = 0;

        for job_id in state.counter.holders().await? {
            let leaked = match state.jobs.get(job_id).await? {
                None => true,
                Some(job) => match job.status {
                    JobStatus::Transcoding => false,
                    JobStatus::Done | JobStatus::Failed => true,
                    // A live lease means a dispatcher is mid-launch.
                    JobStatus::Queued => job
                        .launch_claimed_at
                        .is_none_or(|at| age(now, at) > claim_ttl),
                },
            };

            if leaked && AdmissionController::release(state, job_id).await? {
                warn!(job_id = %job_id, "Reclaimed leaked admission slot");
                reclaimed += 1;
            }
        }

        Ok(reclaimed)
    }

    async fn requeue_stale_jobs(state: &SchedulerState, now: OffsetDateTime) -> DispatchResult<u32> {
        let claim_ttl = state.settings.launch_claim_ttl;
        let mut requeued = 0;

        for job in state.jobs.list_stale_queued(state.settings.stale_queued_after).await? {
            if job.launch_claimed_at.is_some_and(|at| age(now, at) <= claim_ttl) {
                continue;
            }
            let entry = OverflowEntry::from(&job.source);
            if state.overflow.contains(&entry).await? {
                continue;
            }
            state.overflow.push_back(&entry).await?;
            debug!(job_id = %job.id, source = %job.source, "Stale queued job returned to overflow");
            requeued += 1;
        }

        Ok(requeued)
    }
}

fn age(now: OffsetDateTime, then: OffsetDateTime) -> Duration {
    Duration::try_from(now - then).unwrap_or(Duration::ZERO)
}
