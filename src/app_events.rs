//! Application-level lifecycle notifications
//!
//! Components outside the conversation core (session lists, run pickers)
//! learn about lifecycle changes here instead of poking each other directly.

use crate::model::Session;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    SessionCreated { session: Session },
    SessionDeleted { session_id: String },
    RunStarted { run_id: String },
    RunOpened { run_id: String },
    StreamClosed { run_id: String },
}

/// Typed publish/subscribe channel for [`AppEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers that received the event
    pub fn publish(&self, event: AppEvent) -> usize {
        tracing::debug!(event = ?event, "Publishing app event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
