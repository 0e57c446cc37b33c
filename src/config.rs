//! Runtime configuration

use std::path::PathBuf;

/// Source assigned to raw text deltas and transport failures
pub const DEFAULT_SOURCE: &str = "assistant";

/// Sources excluded from the rendered conversation
pub const DEFAULT_HIDDEN_SOURCES: [&str; 2] = ["system", "proxy"];

const DEFAULT_NOTIFY_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub default_source: String,
    pub hidden_sources: Vec<String>,
    /// Buffer size of the state-change broadcast channel
    pub notify_capacity: usize,
    /// Directory read by the file transport
    pub run_dir: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_source: DEFAULT_SOURCE.to_string(),
            hidden_sources: DEFAULT_HIDDEN_SOURCES.iter().map(ToString::to_string).collect(),
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
            run_dir: PathBuf::from("."),
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or invalid values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            default_source: lookup("AGENTCHAT_DEFAULT_SOURCE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_source),
            hidden_sources: lookup("AGENTCHAT_HIDDEN_SOURCES")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.hidden_sources),
            notify_capacity: lookup("AGENTCHAT_NOTIFY_CAPACITY")
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.notify_capacity),
            run_dir: lookup("AGENTCHAT_RUN_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.run_dir),
        }
    }

    pub fn is_hidden(&self, source: &str) -> bool {
        self.hidden_sources.iter().any(|s| s == source)
    }
}
