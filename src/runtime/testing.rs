//! Mock transport for testing
//!
//! Frames are fed through channels so tests control exactly when each one
//! arrives.

use crate::frame::Frame;
use crate::model::Run;
use crate::transport::{ActiveStream, RunTransport, StreamHandle, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub type FrameSender = mpsc::UnboundedSender<Result<Frame, TransportError>>;

/// Transport whose streams and stored runs are scripted by the test
#[derive(Default)]
pub struct MockTransport {
    streams: Mutex<HashMap<String, mpsc::UnboundedReceiver<Result<Frame, TransportError>>>>,
    runs: Mutex<HashMap<String, Run>>,
    /// Run ids of every aborted stream, in order
    pub aborted: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream for `run_id` and return its feeding end
    pub fn feed(&self, run_id: &str) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().insert(run_id.to_string(), rx);
        tx
    }

    pub fn with_run(self, run: Run) -> Self {
        self.runs.lock().unwrap().insert(run.id.clone(), run);
        self
    }

    pub fn aborted_runs(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunTransport for MockTransport {
    async fn start_stream(&self, run_id: &str) -> Result<ActiveStream, TransportError> {
        let rx = self
            .streams
            .lock()
            .unwrap()
            .remove(run_id)
            .ok_or_else(|| TransportError::RunNotFound(run_id.to_string()))?;
        Ok(ActiveStream {
            handle: StreamHandle::new(run_id),
            frames: UnboundedReceiverStream::new(rx).boxed(),
        })
    }

    async fn abort(&self, handle: &StreamHandle) {
        self.aborted.lock().unwrap().push(handle.run_id.clone());
    }

    async fn fetch_run(&self, run_id: &str) -> Result<Run, TransportError> {
        self.runs
            .lock()
            .unwrap()
            .get(run_id)
            .cloned()
            .ok_or_else(|| TransportError::RunNotFound(run_id.to_string()))
    }
}

// ============================================================================
// Controller Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_events::AppEvent;
    use crate::config::ChatConfig;
    use crate::conversation::StateChange;
    use crate::model::{ChatStatus, Message, MessageContent};
    use crate::runtime::{ChatController, ChatError};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn controller(transport: MockTransport) -> (Arc<MockTransport>, ChatController<MockTransport>) {
        let transport = Arc::new(transport);
        let controller = ChatController::new(Arc::clone(&transport), ChatConfig::default());
        (transport, controller)
    }

    fn text(source: &str, content: &str) -> Frame {
        Frame::Envelope(json!({"source": source, "content": content}))
    }

    #[tokio::test]
    async fn test_stream_to_completion() {
        let (transport, controller) = controller(MockTransport::new());
        let tx = transport.feed("r1");

        controller.start_run("r1").await.unwrap();
        tx.send(Ok(Frame::delta("agent", "Hel"))).unwrap();
        tx.send(Ok(Frame::delta("agent", "lo"))).unwrap();
        tx.send(Ok(text("agent", "Hello"))).unwrap();
        drop(tx);
        controller.wait().await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.run_id.as_deref(), Some("r1"));
        assert_eq!(snapshot.status, ChatStatus::Ready);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(
            snapshot.messages[0].message.content,
            MessageContent::Text("Hello".to_string())
        );
        assert!(snapshot.streaming.is_empty());
    }

    #[tokio::test]
    async fn test_stream_ending_mid_message() {
        let (transport, controller) = controller(MockTransport::new());
        let tx = transport.feed("r1");

        controller.start_run("r1").await.unwrap();
        tx.send(Ok(Frame::delta("agent", "half a sent"))).unwrap();
        drop(tx);
        controller.wait().await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, ChatStatus::Ready);
        assert!(snapshot.streaming.is_empty());
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(
            snapshot.messages[0].message.content,
            MessageContent::Text("half a sent".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancel_while_another_task_waits() {
        let (transport, controller) = controller(MockTransport::new());
        let controller = Arc::new(controller);
        let tx = transport.feed("r1");
        controller.start_run("r1").await.unwrap();

        let waiter = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.wait().await }
        });
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(2), controller.cancel())
            .await
            .expect("cancel must not wait for the stream to end");
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter must wake once the stream is cancelled")
            .unwrap();

        assert!(tx.is_closed());
        // Cancelled, not ended: nothing gets settled
        assert_eq!(controller.snapshot().await.status, ChatStatus::Ready);
    }

    #[tokio::test]
    async fn test_superseded_stream_is_cancelled() {
        let (transport, controller) = controller(MockTransport::new());
        let mut changes = Box::pin(controller.changes().await);
        let old = transport.feed("r1");
        let _new = transport.feed("r2");

        controller.start_run("r1").await.unwrap();
        old.send(Ok(Frame::delta("agent", "stale"))).unwrap();
        // Wait until the delta has been applied
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(change) = changes.next().await {
                if matches!(change, StateChange::StreamUpdated { .. }) {
                    break;
                }
            }
        })
        .await
        .unwrap();

        controller.start_run("r2").await.unwrap();

        // The old pump is gone, so its channel is closed
        assert!(old.is_closed());
        assert!(old.send(Ok(Frame::delta("agent", "late"))).is_err());
        assert_eq!(transport.aborted_runs(), vec!["r1".to_string()]);

        let state = controller.state();
        let state = state.lock().await;
        assert_eq!(state.run_id(), Some("r2"));
        assert!(state.pending_text("agent").is_none());
        assert!(state.messages().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_ingestion() {
        let (transport, controller) = controller(MockTransport::new());
        let tx = transport.feed("r1");

        controller.start_run("r1").await.unwrap();
        controller.cancel().await;

        assert!(tx.send(Ok(text("agent", "too late"))).is_err());
        assert!(controller.snapshot().await.messages.is_empty());
        assert_eq!(transport.aborted_runs(), vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let (transport, controller) = controller(MockTransport::new());
        let tx = transport.feed("r1");

        controller.start_run("r1").await.unwrap();
        tx.send(Ok(Frame::delta("agent", "partial"))).unwrap();
        tx.send(Err(TransportError::Connection("reset".to_string())))
            .unwrap();
        controller.wait().await;

        // Anything after the failure is never read
        assert!(tx.send(Ok(text("agent", "after"))).is_err());

        let state = controller.state();
        let state = state.lock().await;
        assert_eq!(state.status(), ChatStatus::Error);
        let contents: Vec<&MessageContent> = state.messages().iter().map(|m| &m.content).collect();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0], &MessageContent::Text("partial".to_string()));
        assert!(matches!(contents[1], MessageContent::Error(msg) if msg.contains("reset")));
    }

    #[tokio::test]
    async fn test_start_failure_shown_inline() {
        let (_transport, controller) = controller(MockTransport::new());

        let err = controller.start_run("missing").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Transport(TransportError::RunNotFound(ref id)) if id == "missing"
        ));

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, ChatStatus::Error);
        assert_eq!(snapshot.messages.len(), 1);
        assert!(matches!(
            snapshot.messages[0].message.content,
            MessageContent::Error(_)
        ));
    }

    #[tokio::test]
    async fn test_open_run_initializes() {
        let mut run = Run::new("s1", "summarize");
        run.id = "r7".to_string();
        run.status = ChatStatus::AwaitingInput;
        run.messages = vec![
            Message::text("user", "summarize"),
            Message::text("agent", "Done"),
        ];
        let (transport, controller) = controller(MockTransport::new().with_run(run));
        let mut events = controller.events().subscribe();

        // A live stream is dropped when a stored run is opened
        let tx = transport.feed("r1");
        controller.start_run("r1").await.unwrap();
        controller.open_run("r7").await.unwrap();
        assert!(tx.is_closed());

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.run_id.as_deref(), Some("r7"));
        assert_eq!(snapshot.status, ChatStatus::AwaitingInput);
        assert_eq!(snapshot.messages.len(), 2);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&AppEvent::RunOpened {
            run_id: "r7".to_string()
        }));
        assert!(seen.contains(&AppEvent::StreamClosed {
            run_id: "r1".to_string()
        }));
    }

    #[tokio::test]
    async fn test_open_missing_run() {
        let (_transport, controller) = controller(MockTransport::new());
        assert!(controller.open_run("gone").await.is_err());
        assert_eq!(controller.snapshot().await.status, ChatStatus::Error);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (transport, controller) = controller(MockTransport::new());
        let mut events = controller.events().subscribe();

        let tx = transport.feed("r1");
        controller.start_run("r1").await.unwrap();
        let session = controller.new_session("agent-1", "Research").await;
        assert!(tx.is_closed());
        assert_eq!(controller.current_session().await, Some(session.clone()));
        assert!(controller.snapshot().await.run_id.is_none());

        controller.delete_session(&session.id).await;
        assert!(controller.current_session().await.is_none());

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&AppEvent::SessionCreated {
            session: session.clone()
        }));
        assert_eq!(
            seen.last(),
            Some(&AppEvent::SessionDeleted {
                session_id: session.id.clone()
            })
        );
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let (transport, controller) = controller(MockTransport::new());
        let tx = transport.feed("r1");
        controller.start_run("r1").await.unwrap();
        tx.send(Ok(text("agent", "hi"))).unwrap();
        drop(tx);
        controller.wait().await;
        assert_eq!(controller.snapshot().await.messages.len(), 1);

        controller.reset().await;
        let snapshot = controller.snapshot().await;
        assert!(snapshot.messages.is_empty());
        assert!(snapshot.run_id.is_none());
        assert_eq!(snapshot.status, ChatStatus::Ready);
    }
}
