//! Chat streaming state machine
//!
//! Frames from a run's event stream are classified into [`ChatEvent`]s and
//! reduced into a [`ConversationState`].

mod accumulator;
pub mod classifier;
pub mod event;
pub mod ledger;
mod state;
pub mod status;
mod tokens;

#[cfg(test)]
mod proptests;

pub use accumulator::{StreamAccumulator, StreamBuffer};
pub use classifier::classify;
pub use event::ChatEvent;
pub use ledger::{ToolCallLedger, ToolCallRecord};
pub use state::{ConversationSnapshot, ConversationState, RenderedMessage, StateChange};
pub use status::{next_status, StatusMachine};
pub use tokens::TokenStats;
