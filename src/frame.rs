//! Units delivered by the transport to the conversation pipeline

use serde_json::Value;

/// One decoded unit from a run's event stream
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Raw text fragment that is not a JSON envelope
    Delta {
        source: Option<String>,
        text: String,
    },
    /// Decoded JSON envelope `{source, content, models_usage?, ...}`
    Envelope(Value),
    /// The connection failed mid-stream
    TransportError(String),
}

impl Frame {
    /// Decode one text chunk. JSON objects become envelopes, everything else
    /// is treated as a text delta for the default source.
    pub fn from_text(chunk: &str) -> Self {
        if chunk.trim_start().starts_with('{') {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(chunk) {
                return Frame::Envelope(value);
            }
        }
        Frame::Delta {
            source: None,
            text: chunk.to_string(),
        }
    }

    pub fn delta(source: impl Into<String>, text: impl Into<String>) -> Self {
        Frame::Delta {
            source: Some(source.into()),
            text: text.into(),
        }
    }
}
