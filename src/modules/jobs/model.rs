use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::modules::dispatch::dedup;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Transcoding,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Transcoding => "TRANSCODING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        }
    }

    /// `DONE` and `FAILED` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "TRANSCODING" => Ok(JobStatus::Transcoding),
            "DONE" => Ok(JobStatus::Done),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Bucket + key of an uploaded source artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct SourceRef {
    pub bucket: String,
    pub key: String,
}

impl SourceRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn job_id(&self) -> JobId {
        dedup::job_id_for(self)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Facts the worker derives from the source while transcoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobMetadata {
    pub duration_seconds: Option<f64>,
    pub codec: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    Done(JobMetadata),
    Failed { error: Option<String> },
}

impl TerminalOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            TerminalOutcome::Done(_) => JobStatus::Done,
            TerminalOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Job {
    #[schema(value_type = Uuid)]
    pub id: JobId,
    pub source: SourceRef,
    pub status: JobStatus,
    pub progress: i32,
    pub worker_handle: Option<String>,
    pub metadata: JobMetadata,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub launch_claimed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub bucket: String,
    pub object_key: String,
    pub status: String,
    pub progress: i32,
    pub worker_handle: Option<String>,
    pub duration_seconds: Option<f64>,
    pub codec: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
    pub launch_claimed_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<JobRow> for Job {
    type Error = String;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            source: SourceRef::new(row.bucket, row.object_key),
            status: row.status.parse()?,
            progress: row.progress,
            worker_handle: row.worker_handle,
            metadata: JobMetadata {
                duration_seconds: row.duration_seconds,
                codec: row.codec,
                thumbnail_url: row.thumbnail_url,
            },
            error_message: row.error_message,
            launch_claimed_at: row.launch_claimed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
