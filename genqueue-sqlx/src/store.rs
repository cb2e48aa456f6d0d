use async_trait::async_trait;
use genqueue::generator::ScenarioRef;
use genqueue::job::{JobId, JobStatus, OwnerId, QueueJob, QueueStats, WorkUnit};
use genqueue::store::{QueueStore, StoreError};
use sqlx::Row;
use tracing::instrument;

use crate::types::{job_from_row, status_as_str, status_from_str, JOB_COLUMNS};
use crate::{map_err, PgQueueStore};

impl PgQueueStore {
    async fn current_status(&self, id: JobId) -> Result<Option<JobStatus>, StoreError> {
        let row = sqlx::query("SELECT status FROM genqueue_jobs WHERE id = $1")
            .bind(i64::from(id))
            .fetch_optional(self.pool())
            .await
            .map_err(map_err)?;
        match row {
            None => Ok(None),
            Some(row) => {
                let status: String = row.try_get("status").map_err(map_err)?;
                Ok(Some(status_from_str(&status).ok_or(StoreError::BadState)?))
            }
        }
    }

    /// Maps the affected-row count of a status-guarded update onto the
    /// store contract: one row is the transition, zero rows means the job
    /// is gone or was not in the expected status.
    async fn finish_transition(
        &self,
        rows_affected: u64,
        id: JobId,
        to: JobStatus,
    ) -> Result<(), StoreError> {
        match rows_affected {
            1 => Ok(()),
            0 => match self.current_status(id).await? {
                None => Err(StoreError::JobNotFound(id)),
                Some(from) => Err(StoreError::InvalidTransition { id, from, to }),
            },
            _ => Err(StoreError::BadState),
        }
    }

    async fn find_job(
        &self,
        owner: &OwnerId,
        kind: &str,
        key: &str,
    ) -> Result<QueueJob, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM genqueue_jobs \
             WHERE owner_id = $1 AND target_kind = $2 AND target_key = $3"
        ))
        .bind(owner.as_str())
        .bind(kind)
        .bind(key)
        .fetch_one(self.pool())
        .await
        .map_err(map_err)?;
        job_from_row(&row)
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    #[instrument(skip(self, units), fields(owner = %owner, count = units.len()))]
    async fn enqueue(
        &self,
        owner: &OwnerId,
        units: Vec<WorkUnit>,
        max_attempts: u16,
    ) -> Result<Vec<QueueJob>, StoreError> {
        let mut jobs = Vec::with_capacity(units.len());
        for unit in units {
            let context = serde_json::to_value(&unit.context)?;
            let kind = unit.target.kind();
            let key = unit.target.key();
            let inserted = sqlx::query(&format!(
                "INSERT INTO genqueue_jobs \
                     (owner_id, target_kind, target_key, max_attempts, context, target_date) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (owner_id, target_kind, target_key) DO NOTHING \
                 RETURNING {JOB_COLUMNS}"
            ))
            .bind(owner.as_str())
            .bind(kind)
            .bind(&key)
            .bind(i32::from(max_attempts))
            .bind(context)
            .bind(unit.target_date)
            .fetch_optional(self.pool())
            .await
            .map_err(map_err)?;

            let job = match inserted {
                Some(row) => job_from_row(&row)?,
                // Conflict: the job already exists for this (owner, target).
                None => self.find_job(owner, kind, &key).await?,
            };
            jobs.push(job);
        }
        Ok(jobs)
    }

    async fn pending_jobs(&self, limit: usize) -> Result<Vec<QueueJob>, StoreError> {
        // Mirrors genqueue::policy::selection_order.
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM genqueue_jobs \
             WHERE status = $1 \
             ORDER BY \
                 (CASE WHEN target_kind = 'day' AND target_key = '1' THEN 0 ELSE 1 END), \
                 target_date ASC NULLS LAST, \
                 (CASE WHEN target_kind = 'day' THEN 0 ELSE 1 END), \
                 (CASE WHEN target_kind = 'day' THEN target_key::bigint ELSE 0 END), \
                 created_at ASC, \
                 id ASC \
             LIMIT $2"
        ))
        .bind(status_as_str(JobStatus::Pending))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await
        .map_err(map_err)?;
        rows.iter().map(job_from_row).collect()
    }

    async fn claim(&self, id: JobId) -> Result<Option<QueueJob>, StoreError> {
        // RETURNING hands back the post-claim row, so callers count the
        // attempt the store counted.
        let row = sqlx::query(&format!(
            "UPDATE genqueue_jobs \
             SET status = $2, \
                 attempts = attempts + 1, \
                 updated_at = timezone('UTC'::text, now()) \
             WHERE id = $1 AND status = $3 \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(i64::from(id))
        .bind(status_as_str(JobStatus::InProgress))
        .bind(status_as_str(JobStatus::Pending))
        .fetch_optional(self.pool())
        .await
        .map_err(map_err)?;

        match row {
            Some(row) => Ok(Some(job_from_row(&row)?)),
            None => match self.current_status(id).await? {
                None => Err(StoreError::JobNotFound(id)),
                Some(_) => Ok(None),
            },
        }
    }

    async fn release_claim(&self, id: JobId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE genqueue_jobs \
             SET status = $2, \
                 attempts = GREATEST(attempts - 1, 0), \
                 updated_at = timezone('UTC'::text, now()) \
             WHERE id = $1 AND status = $3",
        )
        .bind(i64::from(id))
        .bind(status_as_str(JobStatus::Pending))
        .bind(status_as_str(JobStatus::InProgress))
        .execute(self.pool())
        .await
        .map_err(map_err)?;
        self.finish_transition(result.rows_affected(), id, JobStatus::Pending)
            .await
    }

    async fn retry_later(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE genqueue_jobs \
             SET status = $3, \
                 last_error = $2, \
                 updated_at = timezone('UTC'::text, now()) \
             WHERE id = $1 AND status = $4",
        )
        .bind(i64::from(id))
        .bind(error)
        .bind(status_as_str(JobStatus::Pending))
        .bind(status_as_str(JobStatus::InProgress))
        .execute(self.pool())
        .await
        .map_err(map_err)?;
        self.finish_transition(result.rows_affected(), id, JobStatus::Pending)
            .await
    }

    async fn mark_ready(&self, id: JobId, result_ref: ScenarioRef) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE genqueue_jobs \
             SET status = $3, \
                 result_ref = $2, \
                 updated_at = timezone('UTC'::text, now()) \
             WHERE id = $1 AND status = $4",
        )
        .bind(i64::from(id))
        .bind(result_ref.as_str())
        .bind(status_as_str(JobStatus::Ready))
        .bind(status_as_str(JobStatus::InProgress))
        .execute(self.pool())
        .await
        .map_err(map_err)?;
        self.finish_transition(result.rows_affected(), id, JobStatus::Ready)
            .await
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE genqueue_jobs \
             SET status = $3, \
                 last_error = $2, \
                 updated_at = timezone('UTC'::text, now()) \
             WHERE id = $1 AND status = $4",
        )
        .bind(i64::from(id))
        .bind(error)
        .bind(status_as_str(JobStatus::Failed))
        .bind(status_as_str(JobStatus::InProgress))
        .execute(self.pool())
        .await
        .map_err(map_err)?;
        self.finish_transition(result.rows_affected(), id, JobStatus::Failed)
            .await
    }

    async fn mark_skipped(&self, id: JobId, reason: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE genqueue_jobs \
             SET status = $3, \
                 last_error = $2, \
                 updated_at = timezone('UTC'::text, now()) \
             WHERE id = $1 AND status IN ($4, $5)",
        )
        .bind(i64::from(id))
        .bind(reason)
        .bind(status_as_str(JobStatus::Skipped))
        .bind(status_as_str(JobStatus::Pending))
        .bind(status_as_str(JobStatus::InProgress))
        .execute(self.pool())
        .await
        .map_err(map_err)?;
        self.finish_transition(result.rows_affected(), id, JobStatus::Skipped)
            .await
    }

    async fn stats(&self) -> Result<QueueStats, StoreError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM genqueue_jobs GROUP BY status",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_err)?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(map_err)?;
            let count: i64 = row.try_get("count").map_err(map_err)?;
            let count = usize::try_from(count).map_err(|_| StoreError::BadState)?;
            match status_from_str(&status).ok_or(StoreError::BadState)? {
                JobStatus::Pending => stats.pending = count,
                JobStatus::InProgress => stats.in_progress = count,
                JobStatus::Ready => stats.ready = count,
                JobStatus::Failed => stats.failed = count,
                JobStatus::Skipped => stats.skipped = count,
            }
        }
        Ok(stats)
    }
}
