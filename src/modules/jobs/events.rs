use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::model::{JobId, JobMetadata, JobStatus, SourceRef};

/// Job Queue message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnqueued {
    pub bucket: String,
    pub key: String,
}

impl JobEnqueued {
    pub fn source(&self) -> SourceRef {
        SourceRef::new(&self.bucket, &self.key)
    }
}

impl From<&SourceRef> for JobEnqueued {
    fn from(source: &SourceRef) -> Self {
        Self {
            bucket: source.bucket.clone(),
            key: source.key.clone(),
        }
    }
}

/// Statuses a running worker may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportedStatus {
    Transcoding,
    Done,
    Failed,
    UpdateThumbnail,
}

/// A worker status report, from the HTTP callback or the status queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub job_id: JobId,
    pub status: ReportedStatus,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub metadata: Option<JobMetadata>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What the scheduler publishes to the status sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn new(status: JobStatus, progress: i32) -> Self {
        Self {
            status,
            progress,
            worker_handle: None,
            error: None,
        }
    }
}
