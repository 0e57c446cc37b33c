//! Single stream consumer for one UI surface

use super::ChatError;
use crate::app_events::{AppEvent, EventBus};
use crate::config::ChatConfig;
use crate::conversation::{ConversationSnapshot, ConversationState, StateChange};
use crate::frame::Frame;
use crate::model::Session;
use crate::transport::{ActiveStream, FrameStream, RunTransport, StreamHandle};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

/// A spawned task feeding one stream into the state
struct Pump {
    handle: StreamHandle,
    task: JoinHandle<()>,
    /// Cancelled once the task is done, however it ends
    done: CancellationToken,
}

/// Everything a lifecycle operation replaces, guarded as one unit
#[derive(Default)]
struct Lifecycle {
    pump: Option<Pump>,
    session: Option<Session>,
}

pub struct ChatController<T: RunTransport> {
    transport: Arc<T>,
    state: Arc<Mutex<ConversationState>>,
    lifecycle: Mutex<Lifecycle>,
    events: EventBus,
}

impl<T: RunTransport + 'static> ChatController<T> {
    pub fn new(transport: Arc<T>, config: ChatConfig) -> Self {
        let events = EventBus::new(config.notify_capacity);
        Self {
            transport,
            state: Arc::new(Mutex::new(ConversationState::new(config))),
            lifecycle: Mutex::new(Lifecycle::default()),
            events,
        }
    }

    /// Share an application-wide bus instead of a private one
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    // ==================== Sessions ====================

    /// Create a session and make it current; the conversation starts empty
    pub async fn new_session(
        &self,
        agent_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Session {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop(&mut lifecycle).await;
        self.state.lock().await.reset();

        let session = Session::new(agent_id, name);
        tracing::info!(session_id = %session.id, agent_id = %session.agent_id, "Session created");
        lifecycle.session = Some(session.clone());
        self.events.publish(AppEvent::SessionCreated {
            session: session.clone(),
        });
        session
    }

    /// Forget a session; clears the conversation if it was current
    pub async fn delete_session(&self, session_id: &str) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle
            .session
            .as_ref()
            .is_some_and(|s| s.id == session_id)
        {
            self.stop(&mut lifecycle).await;
            self.state.lock().await.reset();
            lifecycle.session = None;
        }
        tracing::info!(session_id = %session_id, "Session deleted");
        self.events.publish(AppEvent::SessionDeleted {
            session_id: session_id.to_string(),
        });
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.lifecycle.lock().await.session.clone()
    }

    // ==================== Runs ====================

    /// Start streaming a freshly created run
    ///
    /// A transport failure is also shown inline as an error message.
    pub async fn start_run(&self, run_id: &str) -> Result<StreamHandle, ChatError> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop(&mut lifecycle).await;

        let epoch = {
            let mut state = self.state.lock().await;
            state.begin_run(run_id);
            state.epoch()
        };

        let ActiveStream { handle, frames } = match self.transport.start_stream(run_id).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to start stream");
                self.state
                    .lock()
                    .await
                    .ingest(&Frame::TransportError(e.to_string()));
                return Err(e.into());
            }
        };

        tracing::info!(run_id = %run_id, epoch, "Stream started");
        let done = CancellationToken::new();
        let task = tokio::spawn(pump(
            Arc::clone(&self.state),
            handle.clone(),
            frames,
            epoch,
            self.events.clone(),
            done.clone(),
        ));
        lifecycle.pump = Some(Pump {
            handle: handle.clone(),
            task,
            done,
        });
        self.events.publish(AppEvent::RunStarted {
            run_id: run_id.to_string(),
        });
        Ok(handle)
    }

    /// Load a stored run, replacing whatever is on screen
    pub async fn open_run(&self, run_id: &str) -> Result<(), ChatError> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop(&mut lifecycle).await;

        match self.transport.fetch_run(run_id).await {
            Ok(run) => {
                self.state.lock().await.initialize(&run);
                tracing::info!(run_id = %run_id, messages = run.messages.len(), "Run opened");
                self.events.publish(AppEvent::RunOpened {
                    run_id: run_id.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to fetch run");
                let mut state = self.state.lock().await;
                state.begin_run(run_id);
                state.ingest(&Frame::TransportError(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Cancel the active stream, if any
    pub async fn cancel(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop(&mut lifecycle).await;
    }

    /// Cancel the active stream and clear the conversation
    pub async fn reset(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop(&mut lifecycle).await;
        self.state.lock().await.reset();
    }

    /// Wait until the active stream ends, on its own or by cancellation
    ///
    /// The lifecycle stays free meanwhile, so another task may cancel or
    /// replace the stream.
    pub async fn wait(&self) {
        let done = match &self.lifecycle.lock().await.pump {
            Some(pump) => pump.done.clone(),
            None => return,
        };
        done.cancelled().await;
    }

    // Cancellation is linearized here: the pump has exited before any caller
    // goes on to reset or initialize.
    async fn stop(&self, lifecycle: &mut Lifecycle) {
        let Some(pump) = lifecycle.pump.take() else {
            return;
        };
        tracing::debug!(run_id = %pump.handle.run_id, "Cancelling stream");
        pump.handle.cancel();
        self.transport.abort(&pump.handle).await;
        join(pump).await;
    }

    // ==================== Observation ====================

    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.state.lock().await.snapshot()
    }

    pub fn state(&self) -> Arc<Mutex<ConversationState>> {
        Arc::clone(&self.state)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// State-change notifications; lagged notifications are skipped
    pub async fn changes(&self) -> impl Stream<Item = StateChange> + Send + 'static {
        let rx = self.state.lock().await.subscribe();
        BroadcastStream::new(rx).filter_map(|change| async move { change.ok() })
    }
}

async fn join(pump: Pump) {
    if let Err(e) = pump.task.await {
        tracing::warn!(run_id = %pump.handle.run_id, error = %e, "Stream pump ended abnormally");
    }
}

async fn pump(
    state: Arc<Mutex<ConversationState>>,
    handle: StreamHandle,
    mut frames: FrameStream,
    epoch: u64,
    events: EventBus,
    done: CancellationToken,
) {
    // Fires on every exit path, panics included
    let _done = done.drop_guard();
    let token = handle.token();
    let mut ingested = 0usize;
    let mut ended = false;

    loop {
        let frame = tokio::select! {
            biased;
            () = token.cancelled() => break,
            next = frames.next() => match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    tracing::warn!(run_id = %handle.run_id, error = %e, "Transport failed mid-stream");
                    Frame::TransportError(e.to_string())
                }
                None => {
                    ended = true;
                    break;
                }
            },
        };
        let terminal = matches!(frame, Frame::TransportError(_));

        {
            let mut state = state.lock().await;
            if token.is_cancelled() || state.epoch() != epoch {
                tracing::debug!(run_id = %handle.run_id, "Discarding frame from superseded stream");
                break;
            }
            state.ingest(&frame);
        }
        ingested += 1;

        if terminal {
            break;
        }
    }

    if ended {
        let mut state = state.lock().await;
        if !token.is_cancelled() && state.epoch() == epoch {
            state.end_stream();
        }
    }

    tracing::info!(
        run_id = %handle.run_id,
        frames = ingested,
        cancelled = token.is_cancelled(),
        "Stream closed"
    );
    events.publish(AppEvent::StreamClosed {
        run_id: handle.run_id.clone(),
    });
}
