//! The pass orchestrator.
//!
//! Each invocation of [`QueueProcessor::process_pending`] is one bounded
//! pass: fetch up to `limit` pending jobs in selection-policy order, run
//! the executor over each sequentially, and aggregate the outcomes.
//! Sequential execution is deliberate: it bounds concurrency against the
//! generation provider, and the job volumes involved are small.

use std::time::Duration;

use tracing::instrument;

use crate::events::{Notifier, QueueEvent};
use crate::executor::{ExecutionOutcome, JobExecutor};
use crate::generator::{ScenarioGenerator, ScenarioStore};
use crate::job::{JobId, OwnerId, QueueJob, QueueStats, WorkUnit};
use crate::store::QueueStore;
use crate::QueueError;

const DEFAULT_BATCH_LIMIT: usize = 25;
const DEFAULT_MAX_ATTEMPTS: u16 = 3;
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Maximum jobs handled in one pass when the caller does not cap it.
    pub batch_limit: usize,
    /// Attempts before a job is permanently failed.
    pub max_attempts: u16,
    /// Upper bound on one generation call, so a hung provider cannot stall
    /// a pass.
    pub generation_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

impl ProcessorConfig {
    pub fn with_batch_limit(self, batch_limit: usize) -> Self {
        Self {
            batch_limit,
            ..self
        }
    }

    pub fn with_max_attempts(self, max_attempts: u16) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    pub fn with_generation_timeout(self, generation_timeout: Duration) -> Self {
        Self {
            generation_timeout,
            ..self
        }
    }
}

/// One failed job within a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub job: JobId,
    pub error: String,
}

/// Aggregate result of one pass. Partial failures are expected and
/// non-fatal; they are reported here rather than thrown.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<JobFailure>,
}

pub struct QueueProcessor<S, G, P> {
    store: S,
    executor: JobExecutor<S, G, P>,
    notifier: Notifier,
    config: ProcessorConfig,
}

impl<S, G, P> QueueProcessor<S, G, P>
where
    S: QueueStore + Clone,
    G: ScenarioGenerator,
    P: ScenarioStore,
{
    pub fn new(store: S, generator: G, scenarios: P) -> Self {
        Self::with_config(store, generator, scenarios, ProcessorConfig::default())
    }

    pub fn with_config(store: S, generator: G, scenarios: P, config: ProcessorConfig) -> Self {
        let executor = JobExecutor::new(
            store.clone(),
            generator,
            scenarios,
            config.generation_timeout,
        );
        Self {
            store,
            executor,
            notifier: Notifier::new(),
            config,
        }
    }

    /// Subscribe to post-commit events emitted by processing passes.
    pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<QueueEvent> {
        self.notifier.subscribe()
    }

    /// Provision jobs for the given curriculum units. Idempotent per
    /// `(owner, target)`.
    pub async fn enqueue(
        &self,
        owner: &OwnerId,
        units: Vec<WorkUnit>,
    ) -> Result<Vec<QueueJob>, QueueError> {
        Ok(self
            .store
            .enqueue(owner, units, self.config.max_attempts)
            .await?)
    }

    /// Runs one pass over up to `limit` pending jobs (the configured batch
    /// limit when `None`).
    ///
    /// Per-job failures are captured in the summary; only failure to fetch
    /// the candidates escalates as an error.
    #[instrument(skip(self))]
    pub async fn process_pending(
        &self,
        limit: Option<usize>,
        dry_run: bool,
    ) -> Result<PassSummary, QueueError> {
        let limit = limit.unwrap_or(self.config.batch_limit);
        let candidates = self.store.pending_jobs(limit).await?;

        let mut summary = PassSummary::default();
        for job in &candidates {
            summary.processed += 1;
            match self.executor.execute(job, dry_run).await {
                ExecutionOutcome::Ready { scenario } => {
                    summary.succeeded += 1;
                    self.notifier.notify(QueueEvent::JobReady {
                        id: job.id,
                        scenario,
                    });
                }
                ExecutionOutcome::Retrying { error } => {
                    summary.failed += 1;
                    summary.errors.push(JobFailure {
                        job: job.id,
                        error: error.clone(),
                    });
                    self.notifier.notify(QueueEvent::JobFailed {
                        id: job.id,
                        error,
                        terminal: false,
                    });
                }
                ExecutionOutcome::Failed { error } => {
                    summary.failed += 1;
                    summary.errors.push(JobFailure {
                        job: job.id,
                        error: error.clone(),
                    });
                    self.notifier.notify(QueueEvent::JobFailed {
                        id: job.id,
                        error,
                        terminal: true,
                    });
                }
                ExecutionOutcome::Skipped => summary.skipped += 1,
                ExecutionOutcome::WouldProcess => {}
            }
        }

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            dry_run,
            "Processing pass complete"
        );
        Ok(summary)
    }

    /// Marks a job skipped, e.g. when its curriculum unit was removed.
    pub async fn skip_job(&self, id: JobId, reason: &str) -> Result<(), QueueError> {
        self.store.mark_skipped(id, reason).await?;
        self.notifier.notify(QueueEvent::JobSkipped { id });
        Ok(())
    }

    /// Aggregate per-status counts for health reporting.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(self.store.stats().await?)
    }
}
