//! Agent Chat streaming core
//!
//! Turns the event stream of an agent run into an ordered, de-duplicated
//! conversation: finalized messages, in-flight streamed text, correlated
//! tool calls, token usage and a run status.

// Public API surface of a library; these pedantic lints only add noise here
#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod app_events;
pub mod config;
pub mod conversation;
pub mod frame;
pub mod model;
pub mod runtime;
pub mod transport;

pub use app_events::{AppEvent, EventBus};
pub use config::ChatConfig;
pub use conversation::{ChatEvent, ConversationSnapshot, ConversationState, StateChange};
pub use frame::Frame;
pub use model::{ChatStatus, Message, MessageContent, Run, Session};
pub use runtime::{ChatController, ChatError};
pub use transport::{FileTransport, RunTransport, TransportError};
