//! Postgres-backed job queue
//!
//! Jobs live in the `jobs` table and are claimed with `FOR UPDATE SKIP
//! LOCKED`, so any number of workers can poll the same queue without handing
//! the same job to two of them. Retry state (attempt counter, backoff
//! schedule) is part of the row; a failed attempt either requeues the job
//! with a delayed `run_at` or marks it failed once attempts run out.

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::{Backoff, ClaimedJob, JobKind, JobRecord, JobStatus, RetryPolicy};

/// Handle to the persistent job queue
#[derive(Debug, Clone)]
pub struct JobQueue {
    pool: PgPool,
}

/// Jobs touched by one reap pass
#[derive(Debug, Default)]
pub struct ReapOutcome {
    /// Jobs returned to the queue for redelivery.
    pub requeued: u64,
    /// Jobs with no attempts left, now terminally failed. The caller owes
    /// each of these a failure notification.
    pub failed: Vec<(Uuid, JobKind)>,
}

/// Raw claimed row before the kind and backoff columns are decoded
#[derive(Debug, FromRow)]
struct ClaimedRow {
    id: Uuid,
    kind: String,
    payload: serde_json::Value,
    attempts: i32,
    max_attempts: i32,
    backoff: String,
    backoff_base_secs: i64,
}

impl ClaimedRow {
    fn decode(self) -> Result<ClaimedJob, sqlx::Error> {
        let kind = JobKind::from_str(&self.kind).map_err(|e| sqlx::Error::Decode(e.into()))?;
        Ok(ClaimedJob {
            id: self.id,
            kind,
            payload: self.payload,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            backoff: Backoff::from_columns(&self.backoff, self.backoff_base_secs),
        })
    }
}

impl JobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new job, immediately runnable. Returns the job id.
    pub async fn enqueue<P: Serialize>(
        &self,
        kind: JobKind,
        payload: &P,
        policy: RetryPolicy,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let payload =
            serde_json::to_value(payload).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let (backoff, backoff_base_secs) = policy.backoff.to_columns();

        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, kind, payload, status, attempts, max_attempts,
                 backoff, backoff_base_secs, run_at)
            VALUES ($1, $2, $3, 'queued', 0, $4, $5, $6, NOW())
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(&payload)
        .bind(policy.max_attempts)
        .bind(backoff)
        .bind(backoff_base_secs)
        .execute(&self.pool)
        .await?;

        tracing::info!(job_id = %id, kind = %kind, "job enqueued");
        Ok(id)
    }

    /// Claim the oldest runnable job, if any.
    ///
    /// Moves the row to `active` and increments its attempt counter in the
    /// same statement, so the claim is atomic.
    pub async fn claim_next(&self) -> Result<Option<ClaimedJob>, sqlx::Error> {
        let row = sqlx::query_as::<_, ClaimedRow>(
            r#"
            UPDATE jobs
            SET status = 'active', attempts = attempts + 1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'queued' AND run_at <= NOW()
                ORDER BY run_at, created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, kind, payload, attempts, max_attempts,
                      backoff, backoff_base_secs
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(ClaimedRow::decode).transpose()
    }

    /// Mark a job as finished successfully.
    pub async fn complete(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET status = 'succeeded', last_error = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// Requeues the job with its backoff delay while attempts remain;
    /// otherwise marks it failed for good. Returns the status the job ended
    /// up in.
    pub async fn fail(&self, job: &ClaimedJob, error: &str) -> Result<JobStatus, sqlx::Error> {
        if job.attempts_exhausted() {
            sqlx::query(
                "UPDATE jobs SET status = 'failed', last_error = $2, updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(job.id)
            .bind(error)
            .execute(&self.pool)
            .await?;
            tracing::warn!(job_id = %job.id, attempts = job.attempts, "job failed permanently");
            return Ok(JobStatus::Failed);
        }

        let delay = job.backoff.delay_after(job.attempts);
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued',
                last_error = $2,
                run_at = NOW() + make_interval(secs => $3),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(error)
        .bind(delay.as_secs_f64())
        .execute(&self.pool)
        .await?;

        tracing::warn!(
            job_id = %job.id,
            attempt = job.attempts,
            retry_in_secs = delay.as_secs(),
            "job attempt failed, requeued"
        );
        Ok(JobStatus::Queued)
    }

    /// Requeue jobs stuck in `active` longer than `timeout`.
    ///
    /// Jobs that already used their last attempt are marked failed instead of
    /// being redelivered; those come back in the outcome so the caller can
    /// publish their failure.
    pub async fn reap_stale(&self, timeout: Duration) -> Result<ReapOutcome, sqlx::Error> {
        let cutoff_secs = timeout.as_secs_f64();

        let failed_rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'failed',
                last_error = 'worker timed out',
                updated_at = NOW()
            WHERE status = 'active'
              AND updated_at < NOW() - make_interval(secs => $1)
              AND attempts >= max_attempts
            RETURNING id, kind
            "#,
        )
        .bind(cutoff_secs)
        .fetch_all(&self.pool)
        .await?;

        // The kind column has a CHECK constraint; anything unparseable would
        // mean schema drift, so it is dropped rather than crashing the reaper.
        let failed: Vec<(Uuid, JobKind)> = failed_rows
            .into_iter()
            .filter_map(|(id, kind)| JobKind::from_str(&kind).ok().map(|kind| (id, kind)))
            .collect();

        let requeued = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued', run_at = NOW(), updated_at = NOW()
            WHERE status = 'active'
              AND updated_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(cutoff_secs)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if requeued > 0 || !failed.is_empty() {
            tracing::warn!(requeued, failed = failed.len(), "reaped stale jobs");
        }
        Ok(ReapOutcome { requeued, failed })
    }

    /// Look up a job by id for the status endpoint.
    pub async fn get(&self, id: Uuid) -> Result<Option<JobRecord>, sqlx::Error> {
        sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT id, kind, status, attempts, max_attempts, last_error,
                   created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
