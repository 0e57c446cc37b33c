//! In-flight streamed text, one buffer per source

use serde::Serialize;

/// Text received for a source but not yet finalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamBuffer {
    pub source: String,
    pub text: String,
}

/// Buffers for the active run, in first-delta order
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    buffers: Vec<StreamBuffer>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta to the source's buffer, opening one if needed
    pub fn push(&mut self, source: &str, delta: &str) {
        if let Some(buffer) = self.buffers.iter_mut().find(|b| b.source == source) {
            buffer.text.push_str(delta);
        } else {
            self.buffers.push(StreamBuffer {
                source: source.to_string(),
                text: delta.to_string(),
            });
        }
    }

    /// Remove and return the source's buffered text
    pub fn take(&mut self, source: &str) -> Option<String> {
        let index = self.buffers.iter().position(|b| b.source == source)?;
        Some(self.buffers.remove(index).text)
    }

    /// Remove every buffer, oldest first
    pub fn drain(&mut self) -> Vec<StreamBuffer> {
        std::mem::take(&mut self.buffers)
    }

    pub fn pending(&self, source: &str) -> Option<&str> {
        self.buffers
            .iter()
            .find(|b| b.source == source)
            .map(|b| b.text.as_str())
    }

    pub fn buffers(&self) -> &[StreamBuffer] {
        &self.buffers
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}
