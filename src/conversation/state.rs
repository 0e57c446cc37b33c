//! Conversation aggregate observed by the UI
//!
//! `ConversationState` is a reducer: every frame goes through
//! [`ConversationState::ingest`], which classifies it and dispatches the
//! event to the accumulator, ledger, token counters and status machine.
//! Observers subscribe to [`StateChange`] notifications.

use super::accumulator::{StreamAccumulator, StreamBuffer};
use super::classifier::classify;
use super::event::ChatEvent;
use super::ledger::{OpenOutcome, ResolveOutcome, ToolCallLedger, ToolCallRecord};
use super::status::StatusMachine;
use super::tokens::TokenStats;
use crate::config::ChatConfig;
use crate::frame::Frame;
use crate::model::{
    ChatStatus, FunctionCall, FunctionExecutionResult, Message, MessageContent, RequestUsage, Run,
};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Notification published after every observable mutation
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    MessageAppended { seq: usize },
    StreamUpdated { source: String },
    ToolCallsUpdated { source: String, message: usize },
    TokensUpdated(TokenStats),
    StatusChanged(ChatStatus),
    Reset,
    Initialized { run_id: String },
}

/// A visible message with its correlated tool calls
#[derive(Debug, Clone, Serialize)]
pub struct RenderedMessage {
    pub seq: usize,
    #[serde(flatten)]
    pub message: Message,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Render-ready copy of the whole conversation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub run_id: Option<String>,
    pub status: ChatStatus,
    pub tokens: TokenStats,
    pub messages: Vec<RenderedMessage>,
    pub streaming: Vec<StreamBuffer>,
}

#[derive(Debug)]
pub struct ConversationState {
    config: ChatConfig,
    run_id: Option<String>,
    messages: Vec<Message>,
    seen_ids: HashSet<String>,
    accumulator: StreamAccumulator,
    ledger: ToolCallLedger,
    tokens: TokenStats,
    status: StatusMachine,
    /// Bumped by every reset/initialize
    epoch: u64,
    changes: broadcast::Sender<StateChange>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(ChatConfig::default())
    }
}

impl ConversationState {
    pub fn new(config: ChatConfig) -> Self {
        let (changes, _) = broadcast::channel(config.notify_capacity.max(1));
        Self {
            config,
            run_id: None,
            messages: Vec::new(),
            seen_ids: HashSet::new(),
            accumulator: StreamAccumulator::new(),
            ledger: ToolCallLedger::new(),
            tokens: TokenStats::default(),
            status: StatusMachine::default(),
            epoch: 0,
            changes,
        }
    }

    // ==================== Lifecycle ====================

    /// Clear all sub-state before a brand-new run
    pub fn reset(&mut self) {
        self.clear();
        self.epoch += 1;
        tracing::debug!(epoch = self.epoch, "Conversation reset");
        self.notify(StateChange::Reset);
    }

    /// Reset and bind to a freshly started run
    pub fn begin_run(&mut self, run_id: impl Into<String>) {
        self.reset();
        self.run_id = Some(run_id.into());
    }

    /// Replace all sub-state with what a stored run implies
    pub fn initialize(&mut self, run: &Run) {
        self.clear();
        self.epoch += 1;
        self.run_id = Some(run.id.clone());
        for message in &run.messages {
            self.replay(message.clone());
        }
        self.status.restore(run.status);
        tracing::debug!(
            run_id = %run.id,
            messages = self.messages.len(),
            status = %run.status,
            epoch = self.epoch,
            "Conversation initialized from stored run"
        );
        self.notify(StateChange::Initialized {
            run_id: run.id.clone(),
        });
    }

    fn clear(&mut self) {
        self.run_id = None;
        self.messages.clear();
        self.seen_ids.clear();
        self.accumulator.clear();
        self.ledger.clear();
        self.tokens = TokenStats::default();
        self.status.restore(ChatStatus::Ready);
    }

    // ==================== Ingestion ====================

    /// Classify one frame and apply it
    pub fn ingest(&mut self, frame: &Frame) {
        let event = classify(frame, &self.config.default_source);
        self.dispatch(event);
    }

    fn dispatch(&mut self, event: ChatEvent) {
        if let Some(id) = event.message_id() {
            if self.seen_ids.contains(id) {
                tracing::debug!(message_id = %id, source = event.source(), "Dropping duplicate message");
                return;
            }
        }
        tracing::trace!(kind = event.kind(), source = event.source(), "Dispatching event");

        let status_change = self.status.apply(&event);

        match event {
            ChatEvent::StreamingDelta { source, delta } => {
                self.accumulator.push(&source, &delta);
                self.notify(StateChange::StreamUpdated { source });
            }
            ChatEvent::FinalizedText {
                source,
                id,
                content,
                usage,
                ..
            } => {
                // Non-streaming agents never sent deltas; their content is the message
                let text = self.accumulator.take(&source).unwrap_or(content);
                if let Some(usage) = &usage {
                    self.record_usage(usage);
                    self.notify(StateChange::TokensUpdated(self.tokens));
                }
                self.append(Message {
                    id,
                    source,
                    content: MessageContent::Text(text),
                    models_usage: usage,
                });
            }
            ChatEvent::ToolCallRequest {
                source,
                id,
                calls,
                usage,
                ..
            } => {
                let seq = self.append(Message {
                    id,
                    source: source.clone(),
                    content: MessageContent::ToolCallRequest(calls.clone()),
                    models_usage: usage,
                });
                if self.open_tool_calls(&source, seq, &calls) {
                    self.notify(StateChange::ToolCallsUpdated {
                        source,
                        message: seq,
                    });
                }
            }
            ChatEvent::ToolCallResult {
                source, id, results, ..
            } => {
                if self.resolve_tool_calls(&source, &results) {
                    if let Some(message) = self.ledger.active_trigger(&source) {
                        self.notify(StateChange::ToolCallsUpdated {
                            source: source.clone(),
                            message,
                        });
                    }
                }
                self.append(Message {
                    id,
                    source,
                    content: MessageContent::ToolCallResult(results),
                    models_usage: None,
                });
            }
            ChatEvent::TaskResultSummary {
                source, id, summary, ..
            } => {
                self.flush_streams();
                self.append(Message {
                    id,
                    source,
                    content: MessageContent::TaskResult(summary),
                    models_usage: None,
                });
            }
            ChatEvent::ModelCallTrace { source, id, trace } => {
                self.append(Message {
                    id,
                    source,
                    content: MessageContent::ModelCallTrace(trace),
                    models_usage: None,
                });
            }
            ChatEvent::MemoryQueryResult {
                source,
                id,
                memories,
            } => {
                self.append(Message {
                    id,
                    source,
                    content: MessageContent::MemoryQuery(memories),
                    models_usage: None,
                });
            }
            ChatEvent::ErrorEvent { source, message } => {
                tracing::warn!(source = %source, error = %message, "Run reported an error");
                self.flush_streams();
                self.append(Message::new(source, MessageContent::Error(message)));
            }
            ChatEvent::Unclassified { source, payload } => {
                tracing::debug!(source = %source, "Passing through unclassified payload");
                self.append(Message::new(source, MessageContent::Other(payload)));
            }
        }

        if let Some(status) = status_change {
            self.notify(StateChange::StatusChanged(status));
        }
    }

    /// The stream closed on its own: finalize dangling text and stop thinking
    pub fn end_stream(&mut self) {
        self.flush_streams();
        if let Some(status) = self.status.settle() {
            self.notify(StateChange::StatusChanged(status));
        }
    }

    /// Re-apply a stored message without touching status
    fn replay(&mut self, message: Message) {
        if message.id.as_ref().is_some_and(|id| self.seen_ids.contains(id)) {
            return;
        }
        match &message.content {
            MessageContent::Text(_) => {
                if let Some(usage) = &message.models_usage {
                    self.record_usage(usage);
                }
                self.push_message(message);
            }
            MessageContent::ToolCallRequest(calls) => {
                let calls = calls.clone();
                let source = message.source.clone();
                let seq = self.push_message(message);
                self.open_tool_calls(&source, seq, &calls);
            }
            MessageContent::ToolCallResult(results) => {
                self.resolve_tool_calls(&message.source, results);
                self.push_message(message);
            }
            MessageContent::TaskResult(_)
            | MessageContent::ModelCallTrace(_)
            | MessageContent::MemoryQuery(_)
            | MessageContent::Error(_)
            | MessageContent::Other(_) => {
                self.push_message(message);
            }
        }
    }

    /// Finalize every dangling stream buffer into a text message
    fn flush_streams(&mut self) {
        for buffer in self.accumulator.drain() {
            tracing::debug!(source = %buffer.source, "Finalizing unterminated stream");
            self.append(Message::text(buffer.source, buffer.text));
        }
    }

    fn open_tool_calls(&mut self, source: &str, seq: usize, calls: &[FunctionCall]) -> bool {
        match self.ledger.open(source, seq, calls) {
            OpenOutcome::Stale => {
                tracing::debug!(source = %source, message = seq, "Ignoring stale tool call request");
                false
            }
            OpenOutcome::Opened | OpenOutcome::Extended => true,
        }
    }

    /// Returns whether any record changed
    fn resolve_tool_calls(&mut self, source: &str, results: &[FunctionExecutionResult]) -> bool {
        let mut changed = false;
        for result in results {
            match self.ledger.resolve(source, result) {
                ResolveOutcome::Correlated => changed = true,
                ResolveOutcome::AlreadyResolved => {
                    tracing::debug!(source = %source, call_id = %result.call_id, "Tool call already resolved");
                }
                ResolveOutcome::Orphaned => {
                    tracing::debug!(source = %source, call_id = %result.call_id, "Dropping orphaned tool result");
                }
            }
        }
        changed
    }

    fn record_usage(&mut self, usage: &RequestUsage) {
        self.tokens.record(usage);
    }

    fn append(&mut self, message: Message) -> usize {
        let seq = self.push_message(message);
        self.notify(StateChange::MessageAppended { seq });
        seq
    }

    fn push_message(&mut self, message: Message) -> usize {
        if let Some(id) = &message.id {
            self.seen_ids.insert(id.clone());
        }
        self.messages.push(message);
        self.messages.len() - 1
    }

    fn notify(&self, change: StateChange) {
        // No subscribers is fine
        let _ = self.changes.send(change);
    }

    // ==================== Queries ====================

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn status(&self) -> ChatStatus {
        self.status.status()
    }

    pub fn token_stats(&self) -> TokenStats {
        self.tokens
    }

    /// Every finalized message, hidden sources included
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages to render, with hidden sources filtered out
    pub fn visible_messages(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !self.config.is_hidden(&m.source))
    }

    /// Streamed text not yet finalized
    pub fn streaming(&self) -> &[StreamBuffer] {
        self.accumulator.buffers()
    }

    pub fn pending_text(&self, source: &str) -> Option<&str> {
        self.accumulator.pending(source)
    }

    pub fn records_for(&self, source: &str, message: usize) -> &[ToolCallRecord] {
        self.ledger.records_for(source, message)
    }

    /// Tool calls still waiting for a result
    pub fn unresolved_tool_calls(&self) -> Vec<(String, FunctionCall)> {
        self.ledger
            .unresolved()
            .map(|(source, record)| (source.to_string(), record.call.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let messages = self
            .visible_messages()
            .map(|(seq, message)| RenderedMessage {
                seq,
                message: message.clone(),
                tool_calls: match message.content {
                    MessageContent::ToolCallRequest(_) => {
                        self.records_for(&message.source, seq).to_vec()
                    }
                    _ => Vec::new(),
                },
            })
            .collect();

        ConversationSnapshot {
            run_id: self.run_id.clone(),
            status: self.status(),
            tokens: self.tokens,
            messages,
            streaming: self
                .streaming()
                .iter()
                .filter(|b| !self.config.is_hidden(&b.source))
                .cloned()
                .collect(),
        }
    }
}
