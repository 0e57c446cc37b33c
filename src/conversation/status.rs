//! Run lifecycle status driven by classified events

use super::event::ChatEvent;
use crate::model::ChatStatus;

/// Pure status transition
///
/// `Error` absorbs every event; only a reset or initialize leaves it.
pub fn next_status(current: ChatStatus, event: &ChatEvent) -> ChatStatus {
    match (current, event) {
        (ChatStatus::Error, _) => ChatStatus::Error,

        (_, ChatEvent::ErrorEvent { .. }) => ChatStatus::Error,

        (_, ChatEvent::StreamingDelta { .. }) => ChatStatus::Thinking,

        (
            _,
            ChatEvent::FinalizedText { .. }
            | ChatEvent::ToolCallRequest { .. }
            | ChatEvent::ToolCallResult { .. }
            | ChatEvent::TaskResultSummary { .. },
        ) => {
            if event.awaits_input() {
                ChatStatus::AwaitingInput
            } else {
                ChatStatus::Ready
            }
        }

        // Traces, memory lookups and unrecognized payloads say nothing about progress
        (
            status,
            ChatEvent::ModelCallTrace { .. }
            | ChatEvent::MemoryQueryResult { .. }
            | ChatEvent::Unclassified { .. },
        ) => status,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusMachine {
    status: ChatStatus,
}

impl StatusMachine {
    pub fn new(status: ChatStatus) -> Self {
        Self { status }
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    /// Apply an event, returning the new status when it changed
    pub fn apply(&mut self, event: &ChatEvent) -> Option<ChatStatus> {
        let next = next_status(self.status, event);
        if next == self.status {
            return None;
        }
        tracing::debug!(from = %self.status, to = %next, event = event.kind(), "Status transition");
        self.status = next;
        Some(next)
    }

    /// Adopt a run's last known status
    pub fn restore(&mut self, status: ChatStatus) {
        self.status = status;
    }

    /// The stream ended without a final event; thinking can only become ready
    pub fn settle(&mut self) -> Option<ChatStatus> {
        if self.status != ChatStatus::Thinking {
            return None;
        }
        tracing::debug!(from = %self.status, to = %ChatStatus::Ready, "Status settled at end of stream");
        self.status = ChatStatus::Ready;
        Some(ChatStatus::Ready)
    }
}
