//! Frame classification
//!
//! Each frame maps to exactly one [`ChatEvent`]. Envelopes run through a
//! priority-ordered chain of shape predicates and the first match wins.
//! Anything no predicate recognizes is passed through as
//! [`ChatEvent::Unclassified`].

use super::event::ChatEvent;
use crate::frame::Frame;
use crate::model::{
    FunctionCall, FunctionExecutionResult, MemoryContent, RequestUsage, TaskResultSummary,
};
use serde_json::{Map, Value};

/// Prefixes marking a text payload as a serialized model-call trace
pub const MODEL_CALL_MARKERS: [&str; 2] = [r#"{"type": "LLMCall""#, r#"{"type":"LLMCall""#];

const STREAMING_KINDS: [&str; 2] = ["ModelClientStreamingChunkEvent", "message_chunk"];
const INPUT_REQUEST_KINDS: [&str; 2] = ["input_request", "UserInputRequestedEvent"];
const AWAITING_INPUT_STATUS: &str = "awaiting_input";

static NULL: Value = Value::Null;

/// Borrowed view of an envelope's common fields
struct Envelope<'a> {
    root: &'a Map<String, Value>,
    source: String,
    id: Option<String>,
    kind: Option<&'a str>,
    content: &'a Value,
    usage: Option<RequestUsage>,
    awaiting_input: bool,
}

impl<'a> Envelope<'a> {
    fn new(root: &'a Map<String, Value>, default_source: &str) -> Self {
        let kind = root.get("type").and_then(Value::as_str);
        let awaiting_input = kind.is_some_and(|k| INPUT_REQUEST_KINDS.contains(&k))
            || root.get("status").and_then(Value::as_str) == Some(AWAITING_INPUT_STATUS)
            || root.get("awaiting_input").and_then(Value::as_bool) == Some(true);

        Self {
            root,
            source: root
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or(default_source)
                .to_string(),
            id: match root.get("id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            },
            kind,
            content: root.get("content").unwrap_or(&NULL),
            // Malformed usage counts as absent
            usage: root
                .get("models_usage")
                .filter(|v| v.is_object())
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            awaiting_input,
        }
    }
}

type Predicate = fn(&Envelope<'_>) -> Option<ChatEvent>;

/// Evaluated in order; task summaries deliberately precede plain text.
const CHAIN: [Predicate; 8] = [
    error_event,
    streaming_chunk,
    task_result_summary,
    model_call_trace,
    finalized_text,
    tool_call_request,
    tool_call_result,
    memory_query_result,
];

/// Classify one frame. Pure: identical input yields an identical event.
pub fn classify(frame: &Frame, default_source: &str) -> ChatEvent {
    match frame {
        Frame::TransportError(message) => ChatEvent::ErrorEvent {
            source: default_source.to_string(),
            message: message.clone(),
        },
        Frame::Delta { source, text } => ChatEvent::StreamingDelta {
            source: source.clone().unwrap_or_else(|| default_source.to_string()),
            delta: text.clone(),
        },
        Frame::Envelope(value) => classify_envelope(value, default_source),
    }
}

fn classify_envelope(value: &Value, default_source: &str) -> ChatEvent {
    let Some(root) = value.as_object() else {
        return ChatEvent::Unclassified {
            source: default_source.to_string(),
            payload: value.clone(),
        };
    };

    let envelope = Envelope::new(root, default_source);
    CHAIN
        .iter()
        .find_map(|predicate| predicate(&envelope))
        .unwrap_or_else(|| ChatEvent::Unclassified {
            source: envelope.source.clone(),
            payload: value.clone(),
        })
}

fn error_event(env: &Envelope<'_>) -> Option<ChatEvent> {
    let field = env.root.get("error").and_then(Value::as_str);
    if env.kind != Some("error") && field.is_none() {
        return None;
    }
    let message = field
        .map(str::to_string)
        .or_else(|| env.content.as_str().map(str::to_string))
        .unwrap_or_else(|| "Unknown error".to_string());
    Some(ChatEvent::ErrorEvent {
        source: env.source.clone(),
        message,
    })
}

fn streaming_chunk(env: &Envelope<'_>) -> Option<ChatEvent> {
    if !env.kind.is_some_and(|k| STREAMING_KINDS.contains(&k)) {
        return None;
    }
    let delta = env.content.as_str()?;
    Some(ChatEvent::StreamingDelta {
        source: env.source.clone(),
        delta: delta.to_string(),
    })
}

fn task_result_summary(env: &Envelope<'_>) -> Option<ChatEvent> {
    let holder = env
        .content
        .as_object()
        .filter(|obj| obj.get("task_result").is_some_and(Value::is_object))
        .or_else(|| Some(env.root).filter(|obj| obj.get("task_result").is_some_and(Value::is_object)))?;
    let task_result = holder.get("task_result")?;

    let summary = TaskResultSummary {
        messages: task_result
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        stop_reason: task_result
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration: holder.get("duration").and_then(Value::as_f64),
    };
    Some(ChatEvent::TaskResultSummary {
        source: env.source.clone(),
        id: env.id.clone(),
        summary,
        awaiting_input: env.awaiting_input,
    })
}

fn model_call_trace(env: &Envelope<'_>) -> Option<ChatEvent> {
    let text = env.content.as_str()?;
    let trimmed = text.trim_start();
    if !MODEL_CALL_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
        return None;
    }
    Some(ChatEvent::ModelCallTrace {
        source: env.source.clone(),
        id: env.id.clone(),
        trace: text.to_string(),
    })
}

fn finalized_text(env: &Envelope<'_>) -> Option<ChatEvent> {
    let text = env.content.as_str()?;
    Some(ChatEvent::FinalizedText {
        source: env.source.clone(),
        id: env.id.clone(),
        content: text.to_string(),
        usage: env.usage,
        awaiting_input: env.awaiting_input,
    })
}

fn tool_call_request(env: &Envelope<'_>) -> Option<ChatEvent> {
    if !env.content.is_array() {
        return None;
    }
    let calls: Vec<FunctionCall> = serde_json::from_value(env.content.clone()).ok()?;
    Some(ChatEvent::ToolCallRequest {
        source: env.source.clone(),
        id: env.id.clone(),
        calls,
        usage: env.usage,
        awaiting_input: env.awaiting_input,
    })
}

fn tool_call_result(env: &Envelope<'_>) -> Option<ChatEvent> {
    if !env.content.is_array() {
        return None;
    }
    let results: Vec<FunctionExecutionResult> = serde_json::from_value(env.content.clone()).ok()?;
    Some(ChatEvent::ToolCallResult {
        source: env.source.clone(),
        id: env.id.clone(),
        results,
        awaiting_input: env.awaiting_input,
    })
}

fn memory_query_result(env: &Envelope<'_>) -> Option<ChatEvent> {
    let list = match env.content {
        Value::Array(_) => env.content,
        Value::Object(obj) => obj.get("content").filter(|v| v.is_array())?,
        _ => return None,
    };
    let memories: Vec<MemoryContent> = serde_json::from_value(list.clone()).ok()?;
    Some(ChatEvent::MemoryQueryResult {
        source: env.source.clone(),
        id: env.id.clone(),
        memories,
    })
}
