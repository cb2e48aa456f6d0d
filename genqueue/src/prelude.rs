//! One-stop import for the common types.
//!
//! ```
//! # #![allow(unused_imports)]
//! use genqueue::prelude::*;
//! ```
pub use crate::events::{Notifier, QueueEvent};
pub use crate::executor::{ExecutionOutcome, JobExecutor};
pub use crate::generator::{
    Difficulty, GenerationContext, GenerationError, ScenarioDraft, ScenarioGenerator, ScenarioRef,
    ScenarioStore, ScenarioStoreError,
};
pub use crate::job::{JobId, JobStatus, JobTarget, OwnerId, QueueJob, QueueStats, WorkUnit};
pub use crate::processor::{JobFailure, PassSummary, ProcessorConfig, QueueProcessor};
pub use crate::store::{QueueStore, StoreError};
pub use crate::QueueError;
