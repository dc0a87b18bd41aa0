use tracing::{error, info, warn};
use uuid::Uuid;

use super::admission::AdmissionController;
use super::ports::WorkerContext;
use super::scheduler::SchedulerState;
use crate::common::callback_token;
use crate::common::error::{DispatchError, DispatchResult};
use crate::common::retry::{retry_async, RetryPolicy};
use crate::modules::jobs::events::StatusReport;
use crate::modules::jobs::model::{Job, JobStatus};

pub struct WorkerLauncher;

impl WorkerLauncher {
    /// Starts the worker for an admitted job whose launch lease is `claim`.
    ///
    /// On failure the admission slot and the lease are both returned and the
    /// job stays `QUEUED`; re-parking it is the caller's call.
    pub async fn launch(state: &SchedulerState, job: &Job, claim: Uuid) -> DispatchResult<String> {
        let started = match Self::context_for(state, job) {
            Ok(context) => Self::run(state, &context).await,
            Err(e) => Err(e),
        };

        let worker_handle = match started {
            Ok(handle) => handle,
            Err(e) => {
                warn!(job_id = %job.id, source = %job.source, "Worker launch failed: {}", e);
                Self::undo_admission(state, job, claim).await;
                return Err(e);
            }
        };

        info!(job_id = %job.id, worker_handle = %worker_handle, "Worker launched");

        let marked = retry_async(&RetryPolicy::new("mark_transcoding"), || {
            state.jobs.mark_transcoding(job.id, claim, &worker_handle)
        })
        .await;

        match marked {
            Ok(true) => {
                let mut report = StatusReport::new(JobStatus::Transcoding, 0);
                report.worker_handle = Some(worker_handle.clone());
                state.report(job.id, report).await;
            }
            Ok(false) => warn!(
                job_id = %job.id,
                worker_handle = %worker_handle,
                "Launch lease lost before the job was marked transcoding"
            ),
            // The worker is running; its own status reports still settle the job.
            Err(e) => error!(
                job_id = %job.id,
                worker_handle = %worker_handle,
                "Could not record worker handle: {}", e
            ),
        }

        Ok(worker_handle)
    }

    fn context_for(state: &SchedulerState, job: &Job) -> DispatchResult<WorkerContext> {
        let settings = &state.settings;
        let callback_token = callback_token::mint(
            &settings.callback_secret,
            job.id,
            settings.callback_token_ttl,
        )?;

        Ok(WorkerContext {
            job_id: job.id,
            source: job.source.clone(),
            callback_url: format!("{}/api/v1/jobs/{}/status", settings.callback_base_url, job.id),
            callback_token,
            status_queue: settings.status_queue_name.clone(),
        })
    }

    /// A timed-out `run_task` may still have started the task, so the platform
    /// is asked for a live task of this job before and after every attempt.
    async fn run(state: &SchedulerState, context: &WorkerContext) -> DispatchResult<String> {
        if let Some(handle) = state.compute.find_active_task(context.job_id).await? {
            warn!(job_id = %context.job_id, worker_handle = %handle, "Adopting task from an earlier launch");
            return Ok(handle);
        }

        let timeout = state.settings.launch_timeout;
        match tokio::time::timeout(timeout, state.compute.run_task(context)).await {
            Ok(started) => started,
            Err(_) => match state.compute.find_active_task(context.job_id).await {
                Ok(Some(handle)) => {
                    warn!(job_id = %context.job_id, worker_handle = %handle, "run_task timed out but the task started");
                    Ok(handle)
                }
                Ok(None) => Err(DispatchError::Timeout(format!("run_task after {:?}", timeout))),
                Err(e) => Err(DispatchError::Timeout(format!(
                    "run_task after {:?}, task lookup failed: {}",
                    timeout, e
                ))),
            },
        }
    }

    async fn undo_admission(state: &SchedulerState, job: &Job, claim: Uuid) {
        if let Err(e) = AdmissionController::release(state, job.id).await {
            error!(job_id = %job.id, "Failed to release slot after launch failure: {}", e);
        }
        if let Err(e) = state.jobs.release_claim(job.id, claim).await {
            warn!(job_id = %job.id, "Failed to drop launch lease: {}", e);
        }
    }
}
