//! Directory-backed transport
//!
//! `<dir>/<run_id>.jsonl` holds a recorded event stream, one frame per line.
//! `<dir>/<run_id>.json` holds a stored [`Run`]. Its messages may be in this
//! crate's own shape (`{"content": {"kind": ..., "data": ...}}`) or in the
//! wire envelope shape (`{"source": ..., "content": ...}`), which is read the
//! same way a live frame would be.

use super::{ActiveStream, RunTransport, StreamHandle, TransportError};
use crate::config::DEFAULT_SOURCE;
use crate::conversation::classify;
use crate::frame::Frame;
use crate::model::{Message, Run};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;

pub struct FileTransport {
    dir: PathBuf,
}

impl FileTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, run_id: &str, extension: &str) -> Result<PathBuf, TransportError> {
        // Run ids name files directly; refuse anything that could escape the directory
        if matches!(run_id, "" | "." | "..") || run_id.contains(['/', '\\']) {
            return Err(TransportError::RunNotFound(run_id.to_string()));
        }
        Ok(self.dir.join(format!("{run_id}.{extension}")))
    }
}

fn not_found_or_io(err: std::io::Error, run_id: &str) -> TransportError {
    if err.kind() == ErrorKind::NotFound {
        TransportError::RunNotFound(run_id.to_string())
    } else {
        TransportError::Io(err)
    }
}

#[async_trait]
impl RunTransport for FileTransport {
    async fn start_stream(&self, run_id: &str) -> Result<ActiveStream, TransportError> {
        let path = self.path_for(run_id, "jsonl")?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, run_id))?;
        tracing::info!(run_id = %run_id, path = %path.display(), "Replaying recorded stream");

        let handle = StreamHandle::new(run_id);
        let frames = LinesStream::new(BufReader::new(file).lines())
            .take_until(handle.token().cancelled_owned())
            .filter_map(|line| async move {
                match line {
                    Ok(line) if line.trim().is_empty() => None,
                    Ok(line) => Some(Ok(Frame::from_text(&line))),
                    Err(e) => Some(Err(TransportError::Io(e))),
                }
            })
            .boxed();

        Ok(ActiveStream { handle, frames })
    }

    async fn abort(&self, handle: &StreamHandle) {
        tracing::debug!(run_id = %handle.run_id, "Aborting recorded stream");
        handle.cancel();
    }

    async fn fetch_run(&self, run_id: &str) -> Result<Run, TransportError> {
        let path = self.path_for(run_id, "json")?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| not_found_or_io(e, run_id))?;
        decode_run(&raw)
    }
}

fn decode_run(raw: &str) -> Result<Run, TransportError> {
    let mut value: Value = serde_json::from_str(raw)?;
    let messages = value.as_object_mut().and_then(|run| run.remove("messages"));
    let mut run: Run = serde_json::from_value(value)?;
    run.messages = match messages {
        Some(Value::Array(items)) => items.into_iter().map(decode_message).collect(),
        Some(other) => serde_json::from_value(other)?,
        None => Vec::new(),
    };
    Ok(run)
}

fn decode_message(item: Value) -> Message {
    match Message::deserialize(&item) {
        Ok(message) => message,
        Err(_) => classify(&Frame::Envelope(item), DEFAULT_SOURCE).into_message(),
    }
}
