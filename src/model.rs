//! Sessions, runs and the messages they carry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// A named container for runs against one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub agent_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// One execution of an agent in response to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub session_id: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub status: ChatStatus,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Run {
    pub fn new(session_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            task: task.into(),
            status: ChatStatus::Ready,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle status of the active run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    /// Idle, nothing streaming
    #[default]
    Ready,
    /// Streaming in progress
    Thinking,
    /// Run paused until the user answers
    AwaitingInput,
    /// Run failed; sticky until the next reset
    Error,
}

impl ChatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatStatus::Ready => "ready",
            ChatStatus::Thinking => "thinking",
            ChatStatus::AwaitingInput => "awaiting_input",
            ChatStatus::Error => "error",
        }
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage reported for one model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// A finalized conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id, used to drop duplicates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_usage: Option<RequestUsage>,
}

impl Message {
    pub fn new(source: impl Into<String>, content: MessageContent) -> Self {
        Self {
            id: None,
            source: source.into(),
            content,
            models_usage: None,
        }
    }

    pub fn text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source, MessageContent::Text(text.into()))
    }

    #[must_use]
    pub fn with_usage(mut self, usage: RequestUsage) -> Self {
        self.models_usage = Some(usage);
        self
    }
}

/// What a message says
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    ToolCallRequest(Vec<FunctionCall>),
    ToolCallResult(Vec<FunctionExecutionResult>),
    TaskResult(TaskResultSummary),
    ModelCallTrace(String),
    MemoryQuery(Vec<MemoryContent>),
    Error(String),
    /// Payload the classifier did not recognize, kept verbatim
    Other(Value),
}

impl MessageContent {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageContent::Text(_) => "text",
            MessageContent::ToolCallRequest(_) => "tool_call_request",
            MessageContent::ToolCallResult(_) => "tool_call_result",
            MessageContent::TaskResult(_) => "task_result",
            MessageContent::ModelCallTrace(_) => "model_call_trace",
            MessageContent::MemoryQuery(_) => "memory_query",
            MessageContent::Error(_) => "error",
            MessageContent::Other(_) => "other",
        }
    }
}

/// A tool invocation requested by an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments
    #[serde(default, deserialize_with = "json_as_string")]
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Output of a tool invocation, matched to its call by `call_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionExecutionResult {
    pub call_id: String,
    #[serde(deserialize_with = "json_as_string")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FunctionExecutionResult {
    pub fn new(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: None,
            name: None,
        }
    }
}

/// Summary emitted when a team finishes its task
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskResultSummary {
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Wall-clock duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// One retrieved memory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryContent {
    pub content: Value,
    pub mime_type: String,
}

/// Accept either a JSON string or any other JSON value, which is re-encoded.
fn json_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
