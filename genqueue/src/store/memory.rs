//! In-memory implementations of [`QueueStore`] and
//! [`crate::generator::ScenarioStore`].
//!
//! These are correct rather than optimized: the claim guarantee is provided
//! by performing the status check and the transition under a single write
//! lock acquisition. Intended for tests and small embedded deployments.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, RwLock,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::generator::{ScenarioDraft, ScenarioRef, ScenarioStore, ScenarioStoreError};
use crate::job::{JobId, JobStatus, OwnerId, QueueJob, QueueStats, WorkUnit};
use crate::policy;

use super::{QueueStore, StoreError};

/// An in-memory [`QueueStore`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    jobs: Arc<RwLock<Vec<QueueJob>>>,
    id_counter: Arc<AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every job, regardless of status.
    pub fn all_jobs(&self) -> Result<Vec<QueueJob>, StoreError> {
        Ok(self
            .jobs
            .read()
            .map_err(|_| StoreError::BadState)?
            .clone())
    }

    /// Snapshot of a single job.
    pub fn job(&self, id: JobId) -> Result<QueueJob, StoreError> {
        self.jobs
            .read()
            .map_err(|_| StoreError::BadState)?
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .ok_or(StoreError::JobNotFound(id))
    }

    fn with_job<T>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut QueueJob) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::BadState)?;
        match jobs.iter_mut().find(|job| job.id == id) {
            None => Err(StoreError::JobNotFound(id)),
            Some(job) => f(job),
        }
    }
}

impl QueueJob {
    fn transition_from(&mut self, expected: JobStatus, to: JobStatus) -> Result<(), StoreError> {
        if self.status != expected {
            return Err(StoreError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn enqueue(
        &self,
        owner: &OwnerId,
        units: Vec<WorkUnit>,
        max_attempts: u16,
    ) -> Result<Vec<QueueJob>, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::BadState)?;
        let mut enqueued = Vec::with_capacity(units.len());
        for unit in units {
            if let Some(existing) = jobs
                .iter()
                .find(|job| job.owner == *owner && job.target == unit.target)
            {
                enqueued.push(existing.clone());
                continue;
            }
            let now = Utc::now();
            let job = QueueJob {
                id: self.id_counter.fetch_add(1, Ordering::SeqCst).into(),
                owner: owner.clone(),
                target: unit.target,
                status: JobStatus::Pending,
                attempts: 0,
                max_attempts,
                context: unit.context,
                last_error: None,
                result_ref: None,
                target_date: unit.target_date,
                created_at: now,
                updated_at: now,
            };
            jobs.push(job.clone());
            enqueued.push(job);
        }
        Ok(enqueued)
    }

    async fn pending_jobs(&self, limit: usize) -> Result<Vec<QueueJob>, StoreError> {
        let mut pending = self
            .jobs
            .read()
            .map_err(|_| StoreError::BadState)?
            .iter()
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect::<Vec<_>>();
        pending.sort_by(policy::selection_order);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn claim(&self, id: JobId) -> Result<Option<QueueJob>, StoreError> {
        self.with_job(id, |job| {
            if job.status != JobStatus::Pending {
                return Ok(None);
            }
            job.status = JobStatus::InProgress;
            job.attempts += 1;
            job.updated_at = Utc::now();
            Ok(Some(job.clone()))
        })
    }

    async fn release_claim(&self, id: JobId) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.transition_from(JobStatus::InProgress, JobStatus::Pending)?;
            job.attempts = job.attempts.saturating_sub(1);
            Ok(())
        })
    }

    async fn retry_later(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.transition_from(JobStatus::InProgress, JobStatus::Pending)?;
            job.last_error = Some(error.to_owned());
            Ok(())
        })
    }

    async fn mark_ready(&self, id: JobId, result_ref: ScenarioRef) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.transition_from(JobStatus::InProgress, JobStatus::Ready)?;
            job.result_ref = Some(result_ref);
            Ok(())
        })
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.transition_from(JobStatus::InProgress, JobStatus::Failed)?;
            job.last_error = Some(error.to_owned());
            Ok(())
        })
    }

    async fn mark_skipped(&self, id: JobId, reason: &str) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            let from = job.status;
            if from.is_terminal() {
                return Err(StoreError::InvalidTransition {
                    id: job.id,
                    from,
                    to: JobStatus::Skipped,
                });
            }
            job.status = JobStatus::Skipped;
            job.last_error = Some(reason.to_owned());
            job.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn stats(&self) -> Result<QueueStats, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::BadState)?;
        let mut stats = QueueStats::default();
        for job in jobs.iter() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::InProgress => stats.in_progress += 1,
                JobStatus::Ready => stats.ready += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Skipped => stats.skipped += 1,
            }
        }
        Ok(stats)
    }
}

/// An in-memory [`ScenarioStore`] that keeps persisted drafts for
/// inspection.
#[derive(Clone, Default)]
pub struct InMemoryScenarioStore {
    scenarios: Arc<RwLock<Vec<(OwnerId, ScenarioDraft)>>>,
}

impl InMemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scenarios(&self) -> Vec<(OwnerId, ScenarioDraft)> {
        self.scenarios
            .read()
            .map(|scenarios| scenarios.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ScenarioStore for InMemoryScenarioStore {
    async fn persist(
        &self,
        owner: &OwnerId,
        draft: ScenarioDraft,
    ) -> Result<ScenarioRef, ScenarioStoreError> {
        let mut scenarios = self
            .scenarios
            .write()
            .map_err(|_| ScenarioStoreError::Unavailable("scenario store poisoned".to_owned()))?;
        scenarios.push((owner.clone(), draft));
        Ok(ScenarioRef::new(format!("scenario-{}", scenarios.len())))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeDelta;
    use futures::future::join_all;

    use super::*;
    use crate::generator::GenerationContext;
    use crate::job::JobTarget;

    fn units(days: impl IntoIterator<Item = u32>) -> Vec<WorkUnit> {
        days.into_iter()
            .map(|day| WorkUnit::new(JobTarget::Day(day), GenerationContext::mock()))
            .collect()
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_per_owner_and_target() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("path-1");

        let first = store.enqueue(&owner, units(1..=3), 3).await.unwrap();
        let second = store.enqueue(&owner, units(1..=3), 3).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
        assert_eq!(store.all_jobs().unwrap().len(), 3);
        assert_eq!(
            first.iter().map(|job| job.id).collect::<Vec<_>>(),
            second.iter().map(|job| job.id).collect::<Vec<_>>(),
        );
    }

    #[tokio::test]
    async fn same_target_for_another_owner_is_a_new_job() {
        let store = InMemoryStore::new();

        store
            .enqueue(&OwnerId::new("path-1"), units([1]), 3)
            .await
            .unwrap();
        store
            .enqueue(&OwnerId::new("path-2"), units([1]), 3)
            .await
            .unwrap();

        assert_eq!(store.all_jobs().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn claim_succeeds_exactly_once() {
        let store = InMemoryStore::new();
        let jobs = store
            .enqueue(&OwnerId::new("path-1"), units([1]), 3)
            .await
            .unwrap();
        let id = jobs[0].id;

        let outcomes = join_all((0..8).map(|_| store.claim(id))).await;
        let wins = outcomes
            .into_iter()
            .filter_map(|outcome| outcome.unwrap())
            .collect::<Vec<_>>();

        assert_eq!(wins.len(), 1);
        assert_eq!(wins[0].attempts, 1);
        assert_eq!(wins[0].status, JobStatus::InProgress);
        let job = store.job(id).unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn release_claim_refunds_the_attempt() {
        let store = InMemoryStore::new();
        let jobs = store
            .enqueue(&OwnerId::new("path-1"), units([1]), 3)
            .await
            .unwrap();
        let id = jobs[0].id;

        assert!(store.claim(id).await.unwrap().is_some());
        store.release_claim(id).await.unwrap();

        let job = store.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test]
    async fn retry_later_keeps_the_attempt_and_records_the_error() {
        let store = InMemoryStore::new();
        let jobs = store
            .enqueue(&OwnerId::new("path-1"), units([1]), 3)
            .await
            .unwrap();
        let id = jobs[0].id;

        assert!(store.claim(id).await.unwrap().is_some());
        store.retry_later(id, "provider exploded").await.unwrap();

        let job = store.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("provider exploded"));
    }

    #[tokio::test]
    async fn terminal_transitions_require_a_claim() {
        let store = InMemoryStore::new();
        let jobs = store
            .enqueue(&OwnerId::new("path-1"), units([1]), 3)
            .await
            .unwrap();
        let id = jobs[0].id;

        assert_matches!(
            store.mark_ready(id, ScenarioRef::new("s1")).await,
            Err(StoreError::InvalidTransition { .. })
        );
        assert_matches!(
            store.mark_failed(id, "nope").await,
            Err(StoreError::InvalidTransition { .. })
        );
    }

    #[tokio::test]
    async fn ready_jobs_keep_their_result_ref() {
        let store = InMemoryStore::new();
        let jobs = store
            .enqueue(&OwnerId::new("path-1"), units([1]), 3)
            .await
            .unwrap();
        let id = jobs[0].id;

        assert!(store.claim(id).await.unwrap().is_some());
        store.mark_ready(id, ScenarioRef::new("s1")).await.unwrap();

        let job = store.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(job.result_ref, Some(ScenarioRef::new("s1")));
        assert!(store.claim(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skipped_jobs_cannot_be_skipped_twice() {
        let store = InMemoryStore::new();
        let jobs = store
            .enqueue(&OwnerId::new("path-1"), units([1]), 3)
            .await
            .unwrap();
        let id = jobs[0].id;

        store.mark_skipped(id, "unit removed").await.unwrap();
        assert_matches!(
            store.mark_skipped(id, "again").await,
            Err(StoreError::InvalidTransition { .. })
        );
    }

    #[tokio::test]
    async fn pending_jobs_respects_limit_and_policy_order() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("path-1");
        let today = Utc::now();
        let unit = |day: u32| {
            WorkUnit::new(JobTarget::Day(day), GenerationContext::mock())
                .with_target_date(today + TimeDelta::days(i64::from(day) - 1))
        };

        // Inserted out of order on purpose.
        store
            .enqueue(&owner, vec![unit(3), unit(1), unit(2)], 3)
            .await
            .unwrap();

        let pending = store.pending_jobs(2).await.unwrap();
        let days = pending
            .iter()
            .map(|job| job.target.clone())
            .collect::<Vec<_>>();
        assert_eq!(days, vec![JobTarget::Day(1), JobTarget::Day(2)]);
    }

    #[tokio::test]
    async fn stats_counts_every_status() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("path-1");
        let jobs = store.enqueue(&owner, units(1..=5), 3).await.unwrap();

        assert!(store.claim(jobs[0].id).await.unwrap().is_some());
        store
            .mark_ready(jobs[0].id, ScenarioRef::new("s1"))
            .await
            .unwrap();
        assert!(store.claim(jobs[1].id).await.unwrap().is_some());
        store.mark_failed(jobs[1].id, "exhausted").await.unwrap();
        assert!(store.claim(jobs[2].id).await.unwrap().is_some());
        store.mark_skipped(jobs[3].id, "unit removed").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                pending: 1,
                in_progress: 1,
                ready: 1,
                failed: 1,
                skipped: 1,
            }
        );
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let store = InMemoryStore::new();
        assert_matches!(
            store.claim(JobId::from(42)).await,
            Err(StoreError::JobNotFound(_))
        );
    }

    #[tokio::test]
    async fn scenario_store_hands_back_distinct_refs() {
        let store = InMemoryScenarioStore::new();
        let owner = OwnerId::new("path-1");

        let first = store
            .persist(&owner, ScenarioDraft::mock())
            .await
            .unwrap();
        let second = store
            .persist(&owner, ScenarioDraft::mock())
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(store.scenarios().len(), 2);
    }
}
