//! Runtime driving a conversation from a live transport
//!
//! One [`ChatController`] per UI surface. It owns the conversation state,
//! pumps frames from the transport and serializes every lifecycle change
//! (start, open, reset, cancel) so a superseded stream never touches the
//! next run.

mod controller;

#[cfg(test)]
pub mod testing;

pub use controller::ChatController;

use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}
