//! Row decoding between the `genqueue_jobs` table and the core job types.

use chrono::{DateTime, Utc};
use genqueue::generator::{GenerationContext, ScenarioRef};
use genqueue::job::{JobStatus, JobTarget, OwnerId, QueueJob};
use genqueue::store::StoreError;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::map_err;

pub(crate) fn status_as_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::InProgress => "in_progress",
        JobStatus::Ready => "ready",
        JobStatus::Failed => "failed",
        JobStatus::Skipped => "skipped",
    }
}

pub(crate) fn status_from_str(value: &str) -> Option<JobStatus> {
    match value {
        "pending" => Some(JobStatus::Pending),
        "in_progress" => Some(JobStatus::InProgress),
        "ready" => Some(JobStatus::Ready),
        "failed" => Some(JobStatus::Failed),
        "skipped" => Some(JobStatus::Skipped),
        _ => None,
    }
}

/// Column list matching [`job_from_row`].
pub(crate) const JOB_COLUMNS: &str = "id, owner_id, target_kind, target_key, status, attempts, \
     max_attempts, context, last_error, result_ref, target_date, created_at, updated_at";

pub(crate) fn job_from_row(row: &PgRow) -> Result<QueueJob, StoreError> {
    let id: i64 = row.try_get("id").map_err(map_err)?;
    let owner: String = row.try_get("owner_id").map_err(map_err)?;
    let target_kind: String = row.try_get("target_kind").map_err(map_err)?;
    let target_key: String = row.try_get("target_key").map_err(map_err)?;
    let status: String = row.try_get("status").map_err(map_err)?;
    let attempts: i32 = row.try_get("attempts").map_err(map_err)?;
    let max_attempts: i32 = row.try_get("max_attempts").map_err(map_err)?;
    let context: serde_json::Value = row.try_get("context").map_err(map_err)?;
    let last_error: Option<String> = row.try_get("last_error").map_err(map_err)?;
    let result_ref: Option<String> = row.try_get("result_ref").map_err(map_err)?;
    let target_date: Option<DateTime<Utc>> = row.try_get("target_date").map_err(map_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_err)?;

    let target =
        JobTarget::from_parts(&target_kind, &target_key).ok_or(StoreError::BadState)?;
    let status = status_from_str(&status).ok_or(StoreError::BadState)?;
    let context: GenerationContext = serde_json::from_value(context)?;

    Ok(QueueJob {
        id: id.into(),
        owner: OwnerId::new(owner),
        target,
        status,
        attempts: attempts.try_into().map_err(|_| StoreError::BadState)?,
        max_attempts: max_attempts.try_into().map_err(|_| StoreError::BadState)?,
        context,
        last_error,
        result_ref: result_ref.map(ScenarioRef::new),
        target_date,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_bijective() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Ready,
            JobStatus::Failed,
            JobStatus::Skipped,
        ] {
            assert_eq!(status_from_str(status_as_str(status)), Some(status));
        }
        assert_eq!(status_from_str("executing"), None);
    }

    #[test]
    fn column_list_matches_the_jobs_schema() {
        for column in JOB_COLUMNS.split(", ") {
            assert!(
                crate::JOBS_SCHEMA.contains(column.trim()),
                "column {column} missing from schema"
            );
        }
    }
}
