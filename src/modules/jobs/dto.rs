use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::events::{ReportedStatus, StatusEvent};
use super::model::{Job, JobMetadata, JobStatus};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StatusUpdateRequest {
    pub status: ReportedStatus,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i32>,
    pub metadata: Option<JobMetadata>,
    #[validate(length(max = 2000, message = "Error message is too long"))]
    pub error: Option<String>,
}

impl StatusUpdateRequest {
    pub fn into_event(self, job_id: Uuid) -> StatusEvent {
        StatusEvent {
            job_id,
            status: self.status,
            progress: self.progress,
            metadata: self.metadata,
            error: self.error,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusUpdateResponse {
    pub job_id: Uuid,
    /// False when the update was a duplicate or arrived after a terminal state.
    pub applied: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub bucket: String,
    pub key: String,
    pub status: JobStatus,
    pub progress: i32,
    pub worker_handle: Option<String>,
    pub duration_seconds: Option<f64>,
    pub codec: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        // Progress only means something while the worker runs.
        let progress = match job.status {
            JobStatus::Queued => 0,
            _ => job.progress,
        };

        Self {
            id: job.id,
            bucket: job.source.bucket,
            key: job.source.key,
            status: job.status,
            progress,
            worker_handle: job.worker_handle,
            duration_seconds: job.metadata.duration_seconds,
            codec: job.metadata.codec,
            thumbnail_url: job.metadata.thumbnail_url,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}
