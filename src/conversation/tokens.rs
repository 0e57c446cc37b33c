//! Running token counters for the active run

use crate::model::RequestUsage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenStats {
    pub total: u64,
    pub input: u64,
    pub output: u64,
}

impl TokenStats {
    /// Fold one usage report into the counters
    pub fn record(&mut self, usage: &RequestUsage) {
        self.input = self.input.saturating_add(usage.prompt_tokens);
        self.output = self.output.saturating_add(usage.completion_tokens);
        self.total = self
            .total
            .saturating_add(usage.prompt_tokens)
            .saturating_add(usage.completion_tokens);
    }

    pub fn is_zero(&self) -> bool {
        self.total == 0 && self.input == 0 && self.output == 0
    }
}
