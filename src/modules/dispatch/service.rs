use time::OffsetDateTime;
use tracing::{debug, warn};

use super::admission::{AdmissionController, AdmissionSnapshot};
use super::dto::{NotificationResponse, ObjectCreatedNotification, RecordOutcome, RecordResult};
use super::notifier::{decode_object_key, UploadNotifier};
use super::ports::EnqueueOutcome;
use super::scheduler::SchedulerState;
use crate::common::error::DispatchResult;
use crate::modules::jobs::model::SourceRef;

pub struct NotificationService;

impl NotificationService {
    /// One enqueue per record; a failing record does not stop the rest.
    pub async fn object_created(
        scheduler: &SchedulerState,
        payload: ObjectCreatedNotification,
    ) -> NotificationResponse {
        let now = OffsetDateTime::now_utc();
        let mut records = Vec::with_capacity(payload.records.len());

        for record in payload.records {
            let bucket = record.s3.bucket.name.clone();
            let raw_key = record.s3.object.key.clone();

            if !record.is_object_created() {
                debug!(bucket = %bucket, key = %raw_key, event = ?record.event_name, "Non-creation event ignored");
                records.push(RecordResult {
                    bucket,
                    key: raw_key,
                    job_id: None,
                    outcome: RecordOutcome::Ignored,
                    error: None,
                });
                continue;
            }

            let result = match decode_object_key(&raw_key) {
                Ok(key) => {
                    let source = SourceRef::new(bucket.clone(), key.clone());
                    match UploadNotifier::notify(scheduler, &source, now).await {
                        Ok(notified) => RecordResult {
                            bucket,
                            key,
                            job_id: Some(notified.job_id),
                            outcome: match notified.outcome {
                                EnqueueOutcome::Enqueued => RecordOutcome::Enqueued,
                                EnqueueOutcome::Duplicate => RecordOutcome::Duplicate,
                            },
                            error: None,
                        },
                        Err(e) => {
                            warn!(bucket = %bucket, key = %key, "Enqueue failed: {}", e);
                            RecordResult {
                                job_id: Some(source.job_id()),
                                bucket,
                                key,
                                outcome: RecordOutcome::Failed,
                                error: Some(e.to_string()),
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(bucket = %bucket, key = %raw_key, "Rejected object key: {}", e);
                    RecordResult {
                        bucket,
                        key: raw_key,
                        job_id: None,
                        outcome: RecordOutcome::Failed,
                        error: Some(e.to_string()),
                    }
                }
            };
            records.push(result);
        }

        NotificationResponse { records }
    }

    pub async fn admission(scheduler: &SchedulerState) -> DispatchResult<AdmissionSnapshot> {
        AdmissionController::snapshot(scheduler).await
    }
}
