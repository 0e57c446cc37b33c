//! Boundary to the surrounding application's run transport
//!
//! The core never parses connection framing. A transport hands over
//! already-split frames and serves stored runs.

mod file;

pub use file::FileTransport;

use crate::frame::Frame;
use crate::model::Run;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Run not found: {0}")]
    RunNotFound(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode run: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Stream aborted")]
    Aborted,
}

/// Frames of one run, in arrival order
pub type FrameStream = BoxStream<'static, Result<Frame, TransportError>>;

/// Identifies a live stream so it can be aborted
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub run_id: String,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop accepting frames from this stream
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// A started stream: its handle plus the frames it yields
pub struct ActiveStream {
    pub handle: StreamHandle,
    pub frames: FrameStream,
}

/// Operations the core requires from the surrounding application
#[async_trait]
pub trait RunTransport: Send + Sync {
    /// Open the event stream of a run
    async fn start_stream(&self, run_id: &str) -> Result<ActiveStream, TransportError>;

    /// Ask the transport to stop delivering frames for a stream
    async fn abort(&self, handle: &StreamHandle);

    /// Load a stored run
    async fn fetch_run(&self, run_id: &str) -> Result<Run, TransportError>;
}

#[async_trait]
impl<T: RunTransport + ?Sized> RunTransport for Arc<T> {
    async fn start_stream(&self, run_id: &str) -> Result<ActiveStream, TransportError> {
        (**self).start_stream(run_id).await
    }

    async fn abort(&self, handle: &StreamHandle) {
        (**self).abort(handle).await;
    }

    async fn fetch_run(&self, run_id: &str) -> Result<Run, TransportError> {
        (**self).fetch_run(run_id).await
    }
}
