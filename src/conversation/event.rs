//! Classified stream events

use crate::model::{
    FunctionCall, FunctionExecutionResult, MemoryContent, Message, MessageContent, RequestUsage,
    TaskResultSummary,
};
use serde_json::Value;

/// Exactly one of these is produced for every frame
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    StreamingDelta {
        source: String,
        delta: String,
    },
    FinalizedText {
        source: String,
        id: Option<String>,
        content: String,
        usage: Option<RequestUsage>,
        awaiting_input: bool,
    },
    ToolCallRequest {
        source: String,
        id: Option<String>,
        calls: Vec<FunctionCall>,
        usage: Option<RequestUsage>,
        awaiting_input: bool,
    },
    ToolCallResult {
        source: String,
        id: Option<String>,
        results: Vec<FunctionExecutionResult>,
        awaiting_input: bool,
    },
    TaskResultSummary {
        source: String,
        id: Option<String>,
        summary: TaskResultSummary,
        awaiting_input: bool,
    },
    ModelCallTrace {
        source: String,
        id: Option<String>,
        trace: String,
    },
    MemoryQueryResult {
        source: String,
        id: Option<String>,
        memories: Vec<MemoryContent>,
    },
    ErrorEvent {
        source: String,
        message: String,
    },
    /// Unrecognized payload, passed through for best-effort display
    Unclassified {
        source: String,
        payload: Value,
    },
}

impl ChatEvent {
    pub fn source(&self) -> &str {
        match self {
            ChatEvent::StreamingDelta { source, .. }
            | ChatEvent::FinalizedText { source, .. }
            | ChatEvent::ToolCallRequest { source, .. }
            | ChatEvent::ToolCallResult { source, .. }
            | ChatEvent::TaskResultSummary { source, .. }
            | ChatEvent::ModelCallTrace { source, .. }
            | ChatEvent::MemoryQueryResult { source, .. }
            | ChatEvent::ErrorEvent { source, .. }
            | ChatEvent::Unclassified { source, .. } => source,
        }
    }

    /// Server id of the message this event finalizes, if any
    pub fn message_id(&self) -> Option<&str> {
        match self {
            ChatEvent::FinalizedText { id, .. }
            | ChatEvent::ToolCallRequest { id, .. }
            | ChatEvent::ToolCallResult { id, .. }
            | ChatEvent::TaskResultSummary { id, .. }
            | ChatEvent::ModelCallTrace { id, .. }
            | ChatEvent::MemoryQueryResult { id, .. } => id.as_deref(),
            ChatEvent::StreamingDelta { .. }
            | ChatEvent::ErrorEvent { .. }
            | ChatEvent::Unclassified { .. } => None,
        }
    }

    /// Whether the payload asked the user for input
    pub fn awaits_input(&self) -> bool {
        match self {
            ChatEvent::FinalizedText { awaiting_input, .. }
            | ChatEvent::ToolCallRequest { awaiting_input, .. }
            | ChatEvent::ToolCallResult { awaiting_input, .. }
            | ChatEvent::TaskResultSummary { awaiting_input, .. } => *awaiting_input,
            _ => false,
        }
    }

    /// The message this event stands for when read from a stored run
    pub fn into_message(self) -> Message {
        let (id, source, content, models_usage) = match self {
            ChatEvent::StreamingDelta { source, delta } => {
                (None, source, MessageContent::Text(delta), None)
            }
            ChatEvent::FinalizedText {
                source,
                id,
                content,
                usage,
                ..
            } => (id, source, MessageContent::Text(content), usage),
            ChatEvent::ToolCallRequest {
                source,
                id,
                calls,
                usage,
                ..
            } => (id, source, MessageContent::ToolCallRequest(calls), usage),
            ChatEvent::ToolCallResult {
                source, id, results, ..
            } => (id, source, MessageContent::ToolCallResult(results), None),
            ChatEvent::TaskResultSummary {
                source, id, summary, ..
            } => (id, source, MessageContent::TaskResult(summary), None),
            ChatEvent::ModelCallTrace { source, id, trace } => {
                (id, source, MessageContent::ModelCallTrace(trace), None)
            }
            ChatEvent::MemoryQueryResult {
                source,
                id,
                memories,
            } => (id, source, MessageContent::MemoryQuery(memories), None),
            ChatEvent::ErrorEvent { source, message } => {
                (None, source, MessageContent::Error(message), None)
            }
            ChatEvent::Unclassified { source, payload } => {
                (None, source, MessageContent::Other(payload), None)
            }
        };
        Message {
            id,
            source,
            content,
            models_usage,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::StreamingDelta { .. } => "streaming_delta",
            ChatEvent::FinalizedText { .. } => "finalized_text",
            ChatEvent::ToolCallRequest { .. } => "tool_call_request",
            ChatEvent::ToolCallResult { .. } => "tool_call_result",
            ChatEvent::TaskResultSummary { .. } => "task_result_summary",
            ChatEvent::ModelCallTrace { .. } => "model_call_trace",
            ChatEvent::MemoryQueryResult { .. } => "memory_query_result",
            ChatEvent::ErrorEvent { .. } => "error",
            ChatEvent::Unclassified { .. } => "unclassified",
        }
    }
}
