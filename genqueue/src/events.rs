//! Post-commit queue events.
//!
//! Collaborators (analytics, notifications) subscribe to state changes
//! instead of being called from the executor's control flow, so their
//! failures can never affect a pass. Events are emitted after the store
//! transition has committed.

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::generator::ScenarioRef;
use crate::job::JobId;

#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    JobReady {
        id: JobId,
        scenario: ScenarioRef,
    },
    JobFailed {
        id: JobId,
        error: String,
        /// True once the job's attempts are exhausted; false when it was
        /// returned to the queue for another pass.
        terminal: bool,
    },
    JobSkipped {
        id: JobId,
    },
}

/// Fan-out channel for [`QueueEvent`]s.
#[derive(Clone, Default)]
pub struct Notifier {
    subscribers: Arc<RwLock<Vec<mpsc::UnboundedSender<QueueEvent>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<QueueEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.push(sender),
            Err(_) => tracing::error!("Failed to register queue event subscriber"),
        }
        receiver
    }

    pub(crate) fn notify(&self, event: QueueEvent) {
        let Ok(subscribers) = self.subscribers.read() else {
            tracing::error!(?event, "Failed to notify queue event subscribers");
            return;
        };
        for sender in subscribers.iter() {
            // Dropped receivers are fine.
            let _ = sender.send(event.clone());
        }
    }
}
