//! The generation boundary: the adapter that turns a [`GenerationContext`]
//! into a [`ScenarioDraft`], and the collaborator that persists accepted
//! drafts.
//!
//! The adapter is treated as an unreliable, latent external dependency. It
//! performs no retries of its own; bounding attempts is the executor's
//! responsibility, which keeps this boundary a simple, stub-friendly seam.

use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::OwnerId;

pub mod openai;

/// Target difficulty of the generated scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured input to the generation adapter, validated at the boundary
/// rather than passed around as loose job metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Theme or brief for the conversation, e.g. "ordering at a cafe".
    pub theme: String,
    pub difficulty: Difficulty,
    /// Learner's target language as a BCP-47 code, e.g. "ja" or "es".
    pub language: String,
    /// Optional free-form notes about the learner (interests, goals).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_profile: Option<String>,
}

/// A generated conversational scenario, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDraft {
    pub title: String,
    pub summary: String,
    /// What the learner is asked to accomplish in the conversation.
    pub instructions: String,
    /// The AI partner's first line.
    pub opening_line: String,
    #[serde(default)]
    pub key_phrases: Vec<String>,
}

/// Reference to a persisted scenario, stored on the job once it is ready.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioRef(String);

impl ScenarioRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ScenarioRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider request failed: {0}")]
    Provider(String),
    #[error("generation provider returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("error encoding or decoding provider payload")]
    EncodeDecode(#[from] serde_json::Error),
}

/// Synthesizes a scenario draft from a generation context.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScenarioGenerator: Send + Sync {
    async fn generate(&self, context: GenerationContext) -> Result<ScenarioDraft, GenerationError>;
}

#[derive(Debug, Error)]
pub enum ScenarioStoreError {
    #[error("failed to persist scenario: {0}")]
    Unavailable(String),
    #[error("error encoding scenario draft")]
    EncodeDecode(#[from] serde_json::Error),
}

/// Persists an accepted draft and hands back the reference recorded on the
/// job as `result_ref`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    async fn persist(
        &self,
        owner: &OwnerId,
        draft: ScenarioDraft,
    ) -> Result<ScenarioRef, ScenarioStoreError>;
}
