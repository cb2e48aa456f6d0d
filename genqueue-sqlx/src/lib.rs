//! Postgres implementations of the `genqueue` store traits.
//!
//! [`PgQueueStore`] keeps jobs in a `genqueue_jobs` table. The claim is an
//! atomic conditional update (`UPDATE ... WHERE status = 'pending'`) whose
//! affected-row count is the contract: exactly one overlapping pass can
//! win a job. [`PgScenarioStore`] persists accepted drafts as JSONB rows
//! in `genqueue_scenarios`.
//!
//! Queries are bound at runtime, so no live database is needed to build
//! this crate.

use async_trait::async_trait;
use genqueue::generator::{ScenarioDraft, ScenarioRef, ScenarioStore, ScenarioStoreError};
use genqueue::job::OwnerId;
use genqueue::store::StoreError;
use sqlx::{PgPool, Row};
use tracing::instrument;

mod store;
mod types;

pub(crate) fn map_err(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

const JOBS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS genqueue_jobs (
    id BIGSERIAL PRIMARY KEY,
    owner_id TEXT NOT NULL,
    target_kind TEXT NOT NULL,
    target_key TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL,
    context JSONB NOT NULL,
    last_error TEXT,
    result_ref TEXT,
    target_date TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT timezone('UTC'::text, now()),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT timezone('UTC'::text, now()),
    UNIQUE (owner_id, target_kind, target_key)
)"#;

const SCENARIOS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS genqueue_scenarios (
    id BIGSERIAL PRIMARY KEY,
    owner_id TEXT NOT NULL,
    draft JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT timezone('UTC'::text, now())
)"#;

/// A Postgres-backed [`genqueue::store::QueueStore`].
#[derive(Clone, Debug)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl From<PgPool> for PgQueueStore {
    fn from(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PgQueueStore {
    /// Wraps the pool and creates the jobs table if it does not exist yet.
    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        let this = Self { pool };
        this.ensure_schema().await?;
        Ok(this)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(JOBS_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// A Postgres-backed [`ScenarioStore`].
#[derive(Clone, Debug)]
pub struct PgScenarioStore {
    pool: PgPool,
}

impl From<PgPool> for PgScenarioStore {
    fn from(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PgScenarioStore {
    /// Wraps the pool and creates the scenarios table if it does not exist
    /// yet.
    pub async fn from_pool(pool: PgPool) -> Result<Self, ScenarioStoreError> {
        let this = Self { pool };
        this.ensure_schema().await?;
        Ok(this)
    }

    pub async fn ensure_schema(&self) -> Result<(), ScenarioStoreError> {
        sqlx::query(SCENARIOS_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|error| ScenarioStoreError::Unavailable(error.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ScenarioStore for PgScenarioStore {
    #[instrument(skip(self, draft))]
    async fn persist(
        &self,
        owner: &OwnerId,
        draft: ScenarioDraft,
    ) -> Result<ScenarioRef, ScenarioStoreError> {
        let draft = serde_json::to_value(&draft)?;
        let row = sqlx::query(
            r#"INSERT INTO genqueue_scenarios (owner_id, draft)
            VALUES ($1, $2)
            RETURNING id"#,
        )
        .bind(owner.as_str())
        .bind(draft)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| ScenarioStoreError::Unavailable(error.to_string()))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|error| ScenarioStoreError::Unavailable(error.to_string()))?;
        Ok(ScenarioRef::new(id.to_string()))
    }
}
