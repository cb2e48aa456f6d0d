use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generator::{GenerationContext, ScenarioRef};

/// Identifier of a queued generation job.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub struct JobId(i64);

impl From<i64> for JobId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<JobId> for i64 {
    fn from(value: JobId) -> Self {
        value.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

/// Identifier of the curriculum container owning a set of jobs: a learning
/// path or an adaptive week.
#[derive(Debug, Eq, PartialEq, Clone, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unit of work within the owning curriculum: a day of a learning path
/// or a seed of an adaptive week.
#[derive(Debug, Eq, PartialEq, Clone, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum JobTarget {
    Day(u32),
    Seed(String),
}

impl JobTarget {
    /// Day-1 content is user-blocking and is ordered ahead of everything
    /// else by the selection policy.
    pub fn is_day_one(&self) -> bool {
        matches!(self, Self::Day(1))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Day(_) => "day",
            Self::Seed(_) => "seed",
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::Day(day) => day.to_string(),
            Self::Seed(seed) => seed.clone(),
        }
    }

    /// Inverse of [`JobTarget::kind`]/[`JobTarget::key`], used when reading
    /// jobs back from a relational store.
    pub fn from_parts(kind: &str, key: &str) -> Option<Self> {
        match kind {
            "day" => key.parse().ok().map(Self::Day),
            "seed" => Some(Self::Seed(key.to_owned())),
            _ => None,
        }
    }
}

impl Display for JobTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

/// Status of a queued job.
///
/// Transitions only move forward except for the executor's bounded
/// retry, which releases an `InProgress` job back to `Pending`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum JobStatus {
    Pending,
    InProgress,
    Ready,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Skipped)
    }
}

/// One unit of curriculum content awaiting AI generation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueJob {
    pub id: JobId,
    pub owner: OwnerId,
    pub target: JobTarget,
    pub status: JobStatus,
    pub attempts: u16,
    pub max_attempts: u16,
    pub context: GenerationContext,
    pub last_error: Option<String>,
    pub result_ref: Option<ScenarioRef>,
    pub target_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueJob {
    pub(crate) fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Enqueue-side description of one unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub target: JobTarget,
    pub target_date: Option<DateTime<Utc>>,
    pub context: GenerationContext,
}

impl WorkUnit {
    pub fn new(target: JobTarget, context: GenerationContext) -> Self {
        Self {
            target,
            target_date: None,
            context,
        }
    }

    pub fn with_target_date(self, target_date: DateTime<Utc>) -> Self {
        Self {
            target_date: Some(target_date),
            ..self
        }
    }
}

/// Aggregate per-status counts for observability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub in_progress: usize,
    pub ready: usize,
    pub failed: usize,
    pub skipped: usize,
}
