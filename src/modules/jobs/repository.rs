use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{Job, JobId, JobRow, SourceRef, TerminalOutcome};
use crate::common::error::{DispatchError, DispatchResult};

/// System of record for job lifecycle. Every mutation is a single conditional
/// statement so concurrent dispatchers and status handlers race safely.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates the `QUEUED` record unless one exists. Returns the current
    /// record and whether this call created it.
    async fn insert_if_absent(&self, source: &SourceRef) -> DispatchResult<(Job, bool)>;

    async fn get(&self, id: JobId) -> DispatchResult<Option<Job>>;

    /// Takes the launch lease on a `QUEUED` job. Fails if another dispatcher
    /// holds a lease younger than `ttl`.
    async fn claim_for_launch(&self, id: JobId, claim: Uuid, ttl: Duration)
    -> DispatchResult<bool>;

    async fn release_claim(&self, id: JobId, claim: Uuid) -> DispatchResult<()>;

    /// `QUEUED -> TRANSCODING`, only for the current lease holder.
    async fn mark_transcoding(
        &self,
        id: JobId,
        claim: Uuid,
        worker_handle: &str,
    ) -> DispatchResult<bool>;

    /// Raises progress on a `TRANSCODING` job; never lowers it.
    async fn record_progress(&self, id: JobId, progress: i32) -> DispatchResult<bool>;

    async fn record_thumbnail(&self, id: JobId, thumbnail_url: &str) -> DispatchResult<bool>;

    /// Moves a non-terminal job to `DONE`/`FAILED`. Returns false when the job
    /// was already terminal (or unknown), which callers treat as a duplicate.
    async fn apply_terminal(&self, id: JobId, outcome: &TerminalOutcome) -> DispatchResult<bool>;

    async fn list_transcoding(&self) -> DispatchResult<Vec<Job>>;

    async fn list_stale_queued(&self, older_than: Duration) -> DispatchResult<Vec<Job>>;
}

const JOB_COLUMNS: &str = r#"
    id, bucket, object_key, status, progress, worker_handle,
    duration_seconds, codec, thumbnail_url, error_message,
    launch_claimed_at, created_at, updated_at
"#;

const STALE_SWEEP_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn to_jobs(rows: Vec<JobRow>) -> DispatchResult<Vec<Job>> {
        rows.into_iter()
            .map(|row| Job::try_from(row).map_err(DispatchError::Store))
            .collect()
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn insert_if_absent(&self, source: &SourceRef) -> DispatchResult<(Job, bool)> {
        let id = source.job_id();
        let result = sqlx::query(
            r#"
            INSERT INTO transcode_jobs (id, bucket, object_key, status, progress)
            VALUES ($1, $2, $3, 'QUEUED', 0)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&source.bucket)
        .bind(&source.key)
        .execute(&self.pool)
        .await?;

        let job = self.get(id).await?.ok_or(DispatchError::JobNotFound(id))?;
        Ok((job, result.rows_affected() == 1))
    }

    async fn get(&self, id: JobId) -> DispatchResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM transcode_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Job::try_from(r).map_err(DispatchError::Store))
            .transpose()
    }

    async fn claim_for_launch(
        &self,
        id: JobId,
        claim: Uuid,
        ttl: Duration,
    ) -> DispatchResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET launch_claim = $2, launch_claimed_at = NOW(), updated_at = NOW()
            WHERE id = $1
              AND status = 'QUEUED'
              AND (launch_claim IS NULL
                   OR launch_claimed_at < NOW() - make_interval(secs => $3))
            "#,
        )
        .bind(id)
        .bind(claim)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, id: JobId, claim: Uuid) -> DispatchResult<()> {
        sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET launch_claim = NULL, launch_claimed_at = NULL
            WHERE id = $1 AND launch_claim = $2
            "#,
        )
        .bind(id)
        .bind(claim)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_transcoding(
        &self,
        id: JobId,
        claim: Uuid,
        worker_handle: &str,
    ) -> DispatchResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET status = 'TRANSCODING',
                worker_handle = $3,
                progress = 0,
                launch_claim = NULL,
                launch_claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'QUEUED' AND launch_claim = $2
            "#,
        )
        .bind(id)
        .bind(claim)
        .bind(worker_handle)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_progress(&self, id: JobId, progress: i32) -> DispatchResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET progress = GREATEST(progress, $2), updated_at = NOW()
            WHERE id = $1 AND status = 'TRANSCODING'
            "#,
        )
        .bind(id)
        .bind(progress.clamp(0, 100))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_thumbnail(&self, id: JobId, thumbnail_url: &str) -> DispatchResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET thumbnail_url = $2, updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('DONE', 'FAILED')
            "#,
        )
        .bind(id)
        .bind(thumbnail_url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn apply_terminal(&self, id: JobId, outcome: &TerminalOutcome) -> DispatchResult<bool> {
        let (metadata, error) = match outcome {
            TerminalOutcome::Done(metadata) => (Some(metadata), None),
            TerminalOutcome::Failed { error } => (None, error.as_deref()),
        };

        let result = sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET status = $2,
                progress = CASE WHEN $2 = 'DONE' THEN 100 ELSE progress END,
                duration_seconds = COALESCE($3, duration_seconds),
                codec = COALESCE($4, codec),
                thumbnail_url = COALESCE($5, thumbnail_url),
                error_message = $6,
                launch_claim = NULL,
                launch_claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('DONE', 'FAILED')
            "#,
        )
        .bind(id)
        .bind(outcome.status().as_str())
        .bind(metadata.and_then(|m| m.duration_seconds))
        .bind(metadata.and_then(|m| m.codec.as_deref()))
        .bind(metadata.and_then(|m| m.thumbnail_url.as_deref()))
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_transcoding(&self) -> DispatchResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM transcode_jobs WHERE status = 'TRANSCODING' ORDER BY updated_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Self::to_jobs(rows)
    }

    async fn list_stale_queued(&self, older_than: Duration) -> DispatchResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM transcode_jobs
            WHERE status = 'QUEUED'
              AND updated_at < NOW() - make_interval(secs => $1)
            ORDER BY created_at
            LIMIT $2
            "#
        ))
        .bind(older_than.as_secs_f64())
        .bind(STALE_SWEEP_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Self::to_jobs(rows)
    }
}
