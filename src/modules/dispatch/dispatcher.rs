use tracing::{debug, info, warn};
use uuid::Uuid;

use super::admission::{AdmissionController, AdmitDecision};
use super::launcher::WorkerLauncher;
use super::ports::{OverflowEntry, QueuedMessage};
use super::scheduler::SchedulerState;
use crate::common::error::DispatchResult;
use crate::modules::jobs::model::{JobStatus, SourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Back,
    Front,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Launched { worker_handle: String },
    /// Denied admission; the job now waits in overflow.
    Parked,
    /// Admitted but the launch failed; the job is back at the overflow head.
    LaunchFailed,
    /// Not `QUEUED`, or another dispatcher holds its launch lease.
    Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub launched: u32,
    pub skipped: u32,
}

pub struct Dispatcher;

impl Dispatcher {
    /// Handles one Job Queue message. `Ok` means the job is durably launched,
    /// parked or already handled, so the message may be acknowledged; `Err`
    /// means it must be redelivered.
    pub async fn dispatch_message(
        state: &SchedulerState,
        message: &QueuedMessage,
    ) -> DispatchResult<DispatchOutcome> {
        let source = message.payload.source();
        let (job, created) = state.jobs.insert_if_absent(&source).await?;
        if created {
            info!(job_id = %job.id, source = %source, "Job record created on dequeue");
        }

        if job.status != JobStatus::Queued {
            debug!(job_id = %job.id, status = %job.status, "Redelivered message for active job, skipping");
            return Ok(DispatchOutcome::Skipped);
        }

        // Parked jobs go first; a newcomer waits behind them.
        if state.overflow.len().await? > 0 {
            let entry = OverflowEntry::from(&source);
            if !state.overflow.contains(&entry).await? {
                state.overflow.push_back(&entry).await?;
            }
            info!(job_id = %job.id, "Overflow non-empty, job queued behind parked jobs");
            Self::drain_logged(state).await;
            return Ok(DispatchOutcome::Parked);
        }

        let outcome = Self::dispatch_candidate(state, &source, Placement::Back).await?;
        if outcome == DispatchOutcome::LaunchFailed {
            Self::drain_logged(state).await;
        }
        Ok(outcome)
    }

    /// Claim, admit, launch. A denied job is parked at `placement`; a job whose
    /// launch fails always goes to the overflow head.
    pub async fn dispatch_candidate(
        state: &SchedulerState,
        source: &SourceRef,
        placement: Placement,
    ) -> DispatchResult<DispatchOutcome> {
        let job_id = source.job_id();
        let Some(job) = state.jobs.get(job_id).await? else {
            warn!(job_id = %job_id, source = %source, "Candidate without job record, skipping");
            return Ok(DispatchOutcome::Skipped);
        };
        if job.status != JobStatus::Queued {
            return Ok(DispatchOutcome::Skipped);
        }

        let claim = Uuid::new_v4();
        if !state
            .jobs
            .claim_for_launch(job_id, claim, state.settings.launch_claim_ttl)
            .await?
        {
            debug!(job_id = %job_id, "Launch lease held elsewhere, skipping");
            return Ok(DispatchOutcome::Skipped);
        }

        let entry = OverflowEntry::from(source);

        match AdmissionController::try_admit(state, job_id).await {
            AdmitDecision::Denied(reason) => {
                state.jobs.release_claim(job_id, claim).await?;
                match placement {
                    Placement::Back => state.overflow.push_back(&entry).await?,
                    Placement::Front => state.overflow.push_front(&entry).await?,
                }
                info!(job_id = %job_id, ?reason, "Job parked in overflow");
                Ok(DispatchOutcome::Parked)
            }
            AdmitDecision::Admitted => match WorkerLauncher::launch(state, &job, claim).await {
                Ok(worker_handle) => Ok(DispatchOutcome::Launched { worker_handle }),
                Err(_) => {
                    state.overflow.push_front(&entry).await?;
                    info!(job_id = %job_id, "Job returned to overflow head after failed launch");
                    Ok(DispatchOutcome::LaunchFailed)
                }
            },
        }
    }

    /// Admits parked jobs oldest-first until one is denied, a launch fails,
    /// or the overflow is empty.
    pub async fn drain_overflow(state: &SchedulerState) -> DispatchResult<DrainReport> {
        let mut report = DrainReport::default();

        while let Some(entry) = state.overflow.pop_front().await? {
            let outcome = match Self::dispatch_candidate(state, &entry.source(), Placement::Front).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Err(push_err) = state.overflow.push_front(&entry).await {
                        warn!(job_id = %entry.job_id, "Could not restore overflow entry: {}", push_err);
                    }
                    return Err(e);
                }
            };

            match outcome {
                DispatchOutcome::Launched { .. } => report.launched += 1,
                DispatchOutcome::Skipped => report.skipped += 1,
                DispatchOutcome::Parked | DispatchOutcome::LaunchFailed => break,
            }
        }

        if report.launched > 0 {
            info!(launched = report.launched, skipped = report.skipped, "Overflow drained");
        }
        Ok(report)
    }

    pub async fn drain_logged(state: &SchedulerState) {
        if let Err(e) = Self::drain_overflow(state).await {
            warn!("Overflow drain failed: {}", e);
        }
    }
}
