//! Per-job execution state machine.
//!
//! ```text
//! pending --claim--> in_progress --generate success--> ready
//!                               \--generate failure--> failed   (attempts exhausted)
//!                                                   \-> pending (for a later pass)
//! ```
//!
//! Every adapter and persistence error is contained here: a single job's
//! failure surfaces as an [`ExecutionOutcome`], never as an error that
//! could abort the batch.

use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use crate::generator::{GenerationError, ScenarioGenerator, ScenarioRef, ScenarioStore, ScenarioStoreError};
use crate::job::QueueJob;
use crate::store::QueueStore;

/// What happened to one job during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Generated and persisted; the job is terminal.
    Ready { scenario: ScenarioRef },
    /// The attempt failed but the job was returned to the queue.
    Retrying { error: String },
    /// The job is terminally failed, or a store write failed mid-flight.
    Failed { error: String },
    /// Another pass already claimed the job. Not an error.
    Skipped,
    /// Dry-run: the claim cycle ran, nothing was generated or persisted.
    WouldProcess,
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Scenario(#[from] ScenarioStoreError),
}

pub struct JobExecutor<S, G, P> {
    store: S,
    generator: G,
    scenarios: P,
    generation_timeout: Duration,
}

impl<S, G, P> JobExecutor<S, G, P>
where
    S: QueueStore,
    G: ScenarioGenerator,
    P: ScenarioStore,
{
    pub fn new(store: S, generator: G, scenarios: P, generation_timeout: Duration) -> Self {
        Self {
            store,
            generator,
            scenarios,
            generation_timeout,
        }
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, target = %job.target))]
    pub async fn execute(&self, job: &QueueJob, dry_run: bool) -> ExecutionOutcome {
        // Attempt accounting is based on the refreshed job the claim hands
        // back, never on the caller's snapshot: other passes may have
        // consumed attempts since the snapshot was taken.
        let claimed = match self.store.claim(job.id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                tracing::debug!(job_id = %job.id, "Job already claimed by another pass");
                return ExecutionOutcome::Skipped;
            }
            Err(error) => {
                tracing::error!(job_id = %job.id, ?error, "Failed to claim job");
                return ExecutionOutcome::Failed {
                    error: error.to_string(),
                };
            }
        };

        if dry_run {
            return self.unclaim(&claimed).await;
        }

        match self.generate_and_persist(&claimed).await {
            Ok(scenario) => match self.store.mark_ready(claimed.id, scenario.clone()).await {
                Ok(()) => {
                    tracing::debug!(job_id = %claimed.id, %scenario, "Job ready");
                    ExecutionOutcome::Ready { scenario }
                }
                Err(error) => {
                    tracing::error!(job_id = %claimed.id, ?error, "Failed to mark job ready");
                    ExecutionOutcome::Failed {
                        error: error.to_string(),
                    }
                }
            },
            Err(error) => self.handle_failure(&claimed, error).await,
        }
    }

    async fn generate_and_persist(&self, job: &QueueJob) -> Result<ScenarioRef, AttemptError> {
        let generation = self.generator.generate(job.context.clone());
        let draft = match tokio::time::timeout(self.generation_timeout, generation).await {
            Ok(Ok(draft)) => draft,
            Ok(Err(error)) => return Err(error.into()),
            Err(_elapsed) => return Err(AttemptError::Timeout(self.generation_timeout)),
        };
        Ok(self.scenarios.persist(&job.owner, draft).await?)
    }

    /// `job` is the refreshed job returned by the claim, whose `attempts`
    /// already counts this execution.
    async fn handle_failure(&self, job: &QueueJob, error: AttemptError) -> ExecutionOutcome {
        let message = error.to_string();
        if job.attempts_exhausted() {
            tracing::error!(
                job_id = %job.id,
                attempt = job.attempts,
                "Job failed and will not be retried: {message}"
            );
            match self.store.mark_failed(job.id, &message).await {
                Ok(()) => ExecutionOutcome::Failed { error: message },
                Err(error) => ExecutionOutcome::Failed {
                    error: error.to_string(),
                },
            }
        } else {
            tracing::warn!(
                job_id = %job.id,
                attempt = job.attempts,
                "Job failed and will be retried on a later pass: {message}"
            );
            match self.store.retry_later(job.id, &message).await {
                Ok(()) => ExecutionOutcome::Retrying { error: message },
                Err(error) => ExecutionOutcome::Failed {
                    error: error.to_string(),
                },
            }
        }
    }

    async fn unclaim(&self, job: &QueueJob) -> ExecutionOutcome {
        match self.store.release_claim(job.id).await {
            Ok(()) => ExecutionOutcome::WouldProcess,
            Err(error) => {
                tracing::error!(job_id = %job.id, ?error, "Failed to release dry-run claim");
                ExecutionOutcome::Failed {
                    error: error.to_string(),
                }
            }
        }
    }
}
