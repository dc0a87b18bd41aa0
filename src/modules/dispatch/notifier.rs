use std::borrow::Cow;

use time::OffsetDateTime;
use tracing::{debug, info};

use super::dedup;
use super::ports::EnqueueOutcome;
use super::scheduler::SchedulerState;
use crate::common::error::{DispatchError, DispatchResult};
use crate::modules::jobs::events::{JobEnqueued, StatusReport};
use crate::modules::jobs::model::{JobId, JobStatus, SourceRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notified {
    pub job_id: JobId,
    pub outcome: EnqueueOutcome,
}

pub struct UploadNotifier;

impl UploadNotifier {
    /// Turns one "object created" event into at most one Job Queue message.
    /// Keeps no local state; callers retry on `Err`.
    pub async fn notify(
        state: &SchedulerState,
        source: &SourceRef,
        now: OffsetDateTime,
    ) -> DispatchResult<Notified> {
        let job_id = source.job_id();
        let dedup_key = dedup::dedup_key(source, state.settings.dedup_window.as_secs(), now);

        let outcome = state
            .queue
            .enqueue(&source.bucket, &dedup_key, &JobEnqueued::from(source))
            .await?;

        match outcome {
            EnqueueOutcome::Enqueued => {
                let (_, created) = state.jobs.insert_if_absent(source).await?;
                if created {
                    state.report(job_id, StatusReport::new(JobStatus::Queued, 0)).await;
                }
                info!(job_id = %job_id, bucket = %source.bucket, key = %source.key, "Job enqueued");
            }
            EnqueueOutcome::Duplicate => {
                // The marker may outlive a lost publish; the record lets the
                // stale sweep recover the job.
                state.jobs.insert_if_absent(source).await?;
                debug!(job_id = %job_id, bucket = %source.bucket, key = %source.key, "Duplicate notification absorbed");
            }
        }

        Ok(Notified { job_id, outcome })
    }
}

/// Object keys in storage notifications are form-encoded: `+` is a space.
pub fn decode_object_key(raw: &str) -> DispatchResult<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|e| DispatchError::queue(format!("undecodable object key '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plus_and_percent_escapes() {
        assert_eq!(
            decode_object_key("videos/My+Trip%20%282024%29.mp4").unwrap(),
            "videos/My Trip (2024).mp4"
        );
        assert_eq!(decode_object_key("a%2Bb.mp4").unwrap(), "a+b.mp4");
    }

    #[test]
    fn rejects_invalid_utf8_escape() {
        assert!(decode_object_key("bad%FF.mp4").is_err());
    }
}
