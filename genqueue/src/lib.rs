//! A queued, idempotent background-job processor for AI scenario
//! generation.
//!
//! When a learner's curriculum is provisioned, each unit of content (a day
//! of a learning path, or a seed of an adaptive week) becomes a job in a
//! durable queue. A periodic trigger then runs processing passes: each
//! pass claims up to `limit` pending jobs in a deterministic priority
//! order, asks the generation adapter to synthesize a conversational
//! scenario for each, persists the results, and reports an aggregate
//! summary. Claiming is an atomic conditional transition, so overlapping
//! passes can never generate the same content twice, and retries are
//! bounded so a poisoned job cannot spin forever.
//!
//! The queue store and the generation provider are injected; the crate
//! ships an in-memory store for tests and embedding, an OpenAI-compatible
//! generation adapter, and (in `genqueue-sqlx`) a Postgres store.
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use genqueue::generator::{
//!     Difficulty, GenerationContext, GenerationError, ScenarioDraft, ScenarioGenerator,
//! };
//! use genqueue::job::{JobTarget, OwnerId, WorkUnit};
//! use genqueue::processor::QueueProcessor;
//! use genqueue::store::memory::{InMemoryScenarioStore, InMemoryStore};
//!
//! struct CannedGenerator;
//!
//! #[async_trait]
//! impl ScenarioGenerator for CannedGenerator {
//!     async fn generate(
//!         &self,
//!         context: GenerationContext,
//!     ) -> Result<ScenarioDraft, GenerationError> {
//!         Ok(ScenarioDraft {
//!             title: format!("Practice: {}", context.theme),
//!             summary: "A short conversation".to_owned(),
//!             instructions: "Order a drink and ask for the bill".to_owned(),
//!             opening_line: "いらっしゃいませ！".to_owned(),
//!             key_phrases: vec![],
//!         })
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread()
//! #     .enable_time()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(async {
//! let processor = QueueProcessor::new(
//!     InMemoryStore::new(),
//!     CannedGenerator,
//!     InMemoryScenarioStore::new(),
//! );
//!
//! let owner = OwnerId::new("path-1");
//! let units = (1..=3)
//!     .map(|day| {
//!         WorkUnit::new(
//!             JobTarget::Day(day),
//!             GenerationContext {
//!                 theme: "ordering at a cafe".to_owned(),
//!                 difficulty: Difficulty::Beginner,
//!                 language: "ja".to_owned(),
//!                 learner_profile: None,
//!             },
//!         )
//!     })
//!     .collect();
//! processor.enqueue(&owner, units).await.unwrap();
//!
//! let summary = processor.process_pending(Some(2), false).await.unwrap();
//! assert_eq!(summary.succeeded, 2);
//! # });
//! ```

pub mod events;
pub mod executor;
pub mod generator;
pub mod job;
pub mod policy;
pub mod prelude;
pub mod processor;
pub mod store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("error communicating with the queue store")]
    Store(#[from] store::StoreError),
    #[error("error encoding or decoding value")]
    EncodeError(#[from] serde_json::Error),
}
