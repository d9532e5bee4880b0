use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;

use super::entry::JobEntry;
use super::traits::QueueProvider;
use super::JobError;

/// Postgres-backed [`QueueProvider`].
///
/// Expects a `jobs` table whose columns match [`JobEntry`]:
///
/// ```sql
/// CREATE TABLE jobs (
///     id UUID PRIMARY KEY,
///     queue TEXT NOT NULL,
///     payload JSONB NOT NULL,
///     status TEXT NOT NULL,
///     attempts INT NOT NULL DEFAULT 0,
///     max_attempts INT NOT NULL,
///     run_at TIMESTAMPTZ NOT NULL,
///     expires_at TIMESTAMPTZ,
///     locked_at TIMESTAMPTZ,
///     locked_by TEXT,
///     last_error TEXT,
///     result JSONB,
///     created_at TIMESTAMPTZ NOT NULL,
///     completed_at TIMESTAMPTZ
/// );
/// ```
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so several worker processes can share
/// one queue without double-processing. A `running` row whose lock is older
/// than the worker's lock timeout is claimed again.
#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
}

const COLUMNS: &str = "id, queue, payload, status, attempts, max_attempts, run_at, expires_at, \
                       locked_at, locked_by, last_error, result, created_at, completed_at";

impl PgQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &PgRow) -> Result<JobEntry, JobError> {
    let status: String = row.try_get("status")?;
    Ok(JobEntry {
        id: row.try_get("id")?,
        queue: row.try_get("queue")?,
        payload: row.try_get("payload")?,
        status: status.parse().map_err(JobError::Corrupt)?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        run_at: row.try_get("run_at")?,
        expires_at: row.try_get("expires_at")?,
        locked_at: row.try_get("locked_at")?,
        locked_by: row.try_get("locked_by")?,
        last_error: row.try_get("last_error")?,
        result: row.try_get("result")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl QueueProvider for PgQueue {
    async fn insert(&self, entry: &JobEntry) -> Result<(), JobError> {
        sqlx::query(&format!(
            "INSERT INTO jobs ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(entry.id)
        .bind(&entry.queue)
        .bind(&entry.payload)
        .bind(entry.status.as_str())
        .bind(entry.attempts)
        .bind(entry.max_attempts)
        .bind(entry.run_at)
        .bind(entry.expires_at)
        .bind(entry.locked_at)
        .bind(&entry.locked_by)
        .bind(&entry.last_error)
        .bind(&entry.result)
        .bind(entry.created_at)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_next(
        &self,
        queue: &str,
        worker_id: &str,
        stale_before: OffsetDateTime,
    ) -> Result<Option<JobEntry>, JobError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET status = 'running', locked_at = NOW(), locked_by = $2, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = $1
                  AND ((status = 'pending' AND run_at <= NOW())
                    OR (status = 'running' AND locked_at < $3))
                ORDER BY run_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {COLUMNS}
            "#
        ))
        .bind(queue)
        .bind(worker_id)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn update(&self, entry: &JobEntry) -> Result<(), JobError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, attempts = $3, run_at = $4, locked_at = $5, locked_by = $6,
                last_error = $7, result = $8, completed_at = $9
            WHERE id = $1
            "#,
        )
        .bind(entry.id)
        .bind(entry.status.as_str())
        .bind(entry.attempts)
        .bind(entry.run_at)
        .bind(entry.locked_at)
        .bind(&entry.locked_by)
        .bind(&entry.last_error)
        .bind(&entry.result)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_finished(&self, older_than: OffsetDateTime) -> Result<u64, JobError> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN ('completed', 'failed', 'expired')
              AND COALESCE(completed_at, created_at) < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
