//! The durable queue of generation jobs.
//!
//! The store is the only shared mutable resource in the system and every
//! mutation goes through its conditional-update methods. [`QueueStore::claim`]
//! is the single concurrency-control mechanism: it must be an atomic
//! conditional transition so that two overlapping passes can never generate
//! the same job twice.

use async_trait::async_trait;
use thiserror::Error;

use crate::generator::ScenarioRef;
use crate::job::{JobId, JobStatus, OwnerId, QueueJob, QueueStats, WorkUnit};

pub mod memory;

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Idempotently creates one job per unit. Re-enqueuing an existing
    /// `(owner, target)` pair returns the existing job instead of creating
    /// a duplicate, so a retried provisioning call cannot cause double
    /// generation.
    async fn enqueue(
        &self,
        owner: &OwnerId,
        units: Vec<WorkUnit>,
        max_attempts: u16,
    ) -> Result<Vec<QueueJob>, StoreError>;

    /// Up to `limit` pending jobs in selection-policy order.
    async fn pending_jobs(&self, limit: usize) -> Result<Vec<QueueJob>, StoreError>;

    /// Atomically transitions `pending -> in_progress` and counts the
    /// attempt. Returns the refreshed job on success, so callers see the
    /// store's attempt count rather than their own (possibly stale)
    /// snapshot; `None` when another pass already holds the job.
    async fn claim(&self, id: JobId) -> Result<Option<QueueJob>, StoreError>;

    /// Undoes a claim without consuming an attempt (`in_progress ->
    /// pending`, attempts decremented). Used by dry-run passes.
    async fn release_claim(&self, id: JobId) -> Result<(), StoreError>;

    /// Returns a claimed job to `pending` for a future pass, recording the
    /// failure. The attempt stays counted.
    async fn retry_later(&self, id: JobId, error: &str) -> Result<(), StoreError>;

    async fn mark_ready(&self, id: JobId, result_ref: ScenarioRef) -> Result<(), StoreError>;

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<(), StoreError>;

    async fn mark_skipped(&self, id: JobId, reason: &str) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<QueueStats, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("invalid status transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("error encoding or decoding job data")]
    EncodeDecode(#[from] serde_json::Error),
    #[error("queue store unavailable: {0}")]
    Unavailable(String),
    #[error("queue store in bad state")]
    BadState,
}
