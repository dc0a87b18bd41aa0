use tracing::{debug, error, info, warn};

use super::admission::AdmissionController;
use super::dispatcher::Dispatcher;
use super::scheduler::SchedulerState;
use crate::common::error::DispatchResult;
use crate::common::retry::{retry_async, RetryPolicy};
use crate::modules::jobs::events::{ReportedStatus, StatusEvent, StatusReport};
use crate::modules::jobs::model::{JobId, JobMetadata, JobStatus, TerminalOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Applied,
    /// Duplicate, late, or for a job that is already terminal.
    Ignored,
}

pub struct CompletionHandler;

impl CompletionHandler {
    /// Applies one worker status report. Safe under redelivery.
    pub async fn handle(state: &SchedulerState, event: StatusEvent) -> DispatchResult<StatusOutcome> {
        let job_id = event.job_id;

        match event.status {
            ReportedStatus::Transcoding => {
                let progress = event.progress.unwrap_or(0).clamp(0, 100);
                if state.jobs.record_progress(job_id, progress).await? {
                    debug!(job_id = %job_id, progress, "Progress recorded");
                    state
                        .report(job_id, StatusReport::new(JobStatus::Transcoding, progress))
                        .await;
                    Ok(StatusOutcome::Applied)
                } else {
                    debug!(job_id = %job_id, progress, "Progress for inactive job ignored");
                    Ok(StatusOutcome::Ignored)
                }
            }
            ReportedStatus::UpdateThumbnail => {
                let Some(url) = event.metadata.and_then(|m| m.thumbnail_url) else {
                    warn!(job_id = %job_id, "Thumbnail update without a URL ignored");
                    return Ok(StatusOutcome::Ignored);
                };
                if state.jobs.record_thumbnail(job_id, &url).await? {
                    Ok(StatusOutcome::Applied)
                } else {
                    Ok(StatusOutcome::Ignored)
                }
            }
            ReportedStatus::Done => {
                let outcome = TerminalOutcome::Done(event.metadata.unwrap_or_default());
                Self::apply_terminal_status(state, job_id, outcome).await
            }
            ReportedStatus::Failed => {
                let outcome = TerminalOutcome::Failed { error: event.error };
                Self::apply_terminal_status(state, job_id, outcome).await
            }
        }
    }

    /// The single entry point for terminal transitions, shared by status
    /// reports and the reconciler. Only the call that actually moves the job
    /// out of its non-terminal state cleans up; every call re-checks the slot,
    /// which the counter releases at most once per job.
    pub async fn apply_terminal_status(
        state: &SchedulerState,
        job_id: JobId,
        outcome: TerminalOutcome,
    ) -> DispatchResult<StatusOutcome> {
        let Some(job) = state.jobs.get(job_id).await? else {
            warn!(job_id = %job_id, status = %outcome.status(), "Terminal status for unknown job ignored");
            return Ok(StatusOutcome::Ignored);
        };

        let transitioned = state.jobs.apply_terminal(job_id, &outcome).await?;
        let released = AdmissionController::release(state, job_id).await?;

        if !transitioned {
            debug!(job_id = %job_id, current = %job.status, "Job already terminal, status ignored");
            if released {
                Dispatcher::drain_logged(state).await;
            }
            return Ok(StatusOutcome::Ignored);
        }

        info!(
            job_id = %job_id,
            status = %outcome.status(),
            worker_handle = job.worker_handle.as_deref().unwrap_or("-"),
            "Job reached terminal state"
        );

        let mut report = match &outcome {
            TerminalOutcome::Done(_) => StatusReport::new(JobStatus::Done, 100),
            TerminalOutcome::Failed { .. } => StatusReport::new(JobStatus::Failed, job.progress),
        };

        match &outcome {
            TerminalOutcome::Done(metadata) => {
                log_metadata(job_id, metadata);
                let delete = retry_async(&RetryPolicy::new("delete_source").with_max_retries(5), || {
                    state.artifacts.delete(&job.source)
                })
                .await;
                match delete {
                    Ok(()) => info!(job_id = %job_id, source = %job.source, "Source artifact deleted"),
                    Err(e) => error!(job_id = %job_id, source = %job.source, "Source cleanup failed: {}", e),
                }
            }
            TerminalOutcome::Failed { error } => {
                report.error = error.clone();
                warn!(
                    job_id = %job_id,
                    source = %job.source,
                    error = error.as_deref().unwrap_or("unknown"),
                    "Transcode failed, source kept"
                );
            }
        }

        state.report(job_id, report).await;
        Dispatcher::drain_logged(state).await;

        Ok(StatusOutcome::Applied)
    }
}

fn log_metadata(job_id: JobId, metadata: &JobMetadata) {
    debug!(
        job_id = %job_id,
        duration_seconds = metadata.duration_seconds,
        codec = metadata.codec.as_deref(),
        thumbnail = metadata.thumbnail_url.as_deref(),
        "Transcode metadata"
    );
}
