//! Tool-call correlation
//!
//! Requests open a scope keyed by (source, triggering message). Results from
//! the same source resolve records in that source's active scope only; a new
//! triggering message seals the previous scope instead of merging into it.

use crate::model::{FunctionCall, FunctionExecutionResult};
use serde::Serialize;
use std::collections::HashMap;

/// A tool call paired with its result, once one arrives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallRecord {
    pub call: FunctionCall,
    pub result: Option<FunctionExecutionResult>,
}

impl ToolCallRecord {
    pub fn pending(call: FunctionCall) -> Self {
        Self { call, result: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }
}

/// Outcome of registering a request message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Fresh scope built for this message
    Opened,
    /// Same triggering message seen again; only unseen call ids were added
    Extended,
    /// Older than the active scope; ignored
    Stale,
}

/// Outcome of applying one result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Correlated,
    /// Record already had a result; left untouched
    AlreadyResolved,
    /// No request known for this call id
    Orphaned,
}

#[derive(Debug, Clone)]
struct Scope {
    trigger: usize,
    records: Vec<ToolCallRecord>,
    by_id: HashMap<String, usize>,
}

impl Scope {
    fn new(trigger: usize) -> Self {
        Self {
            trigger,
            records: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    fn insert(&mut self, call: &FunctionCall) {
        if self.by_id.contains_key(&call.id) {
            return;
        }
        self.by_id.insert(call.id.clone(), self.records.len());
        self.records.push(ToolCallRecord::pending(call.clone()));
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolCallLedger {
    active: HashMap<String, Scope>,
    sealed: HashMap<(String, usize), Vec<ToolCallRecord>>,
}

impl ToolCallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calls of request message `trigger` from `source`
    pub fn open(&mut self, source: &str, trigger: usize, calls: &[FunctionCall]) -> OpenOutcome {
        let outcome = match self.active.get(source) {
            Some(scope) if scope.trigger > trigger => return OpenOutcome::Stale,
            Some(scope) if scope.trigger == trigger => OpenOutcome::Extended,
            _ => OpenOutcome::Opened,
        };

        if outcome == OpenOutcome::Opened {
            if let Some(previous) = self.active.insert(source.to_string(), Scope::new(trigger)) {
                self.sealed
                    .insert((source.to_string(), previous.trigger), previous.records);
            }
        }

        if let Some(scope) = self.active.get_mut(source) {
            for call in calls {
                scope.insert(call);
            }
        }
        outcome
    }

    /// Attach a result to the matching record in the source's active scope
    pub fn resolve(&mut self, source: &str, result: &FunctionExecutionResult) -> ResolveOutcome {
        let Some(scope) = self.active.get_mut(source) else {
            return ResolveOutcome::Orphaned;
        };
        let Some(&index) = scope.by_id.get(&result.call_id) else {
            return ResolveOutcome::Orphaned;
        };
        let record = &mut scope.records[index];
        if record.result.is_some() {
            return ResolveOutcome::AlreadyResolved;
        }
        record.result = Some(result.clone());
        ResolveOutcome::Correlated
    }

    /// Records for a request message, in the order the calls were requested
    pub fn records_for(&self, source: &str, message: usize) -> &[ToolCallRecord] {
        if let Some(scope) = self.active.get(source).filter(|s| s.trigger == message) {
            return &scope.records;
        }
        self.sealed
            .get(&(source.to_string(), message))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Triggering message of the source's active scope
    pub fn active_trigger(&self, source: &str) -> Option<usize> {
        self.active.get(source).map(|s| s.trigger)
    }

    /// Calls in active scopes still waiting for a result
    pub fn unresolved(&self) -> impl Iterator<Item = (&str, &ToolCallRecord)> {
        self.active.iter().flat_map(|(source, scope)| {
            scope
                .records
                .iter()
                .filter(|r| !r.is_resolved())
                .map(move |r| (source.as_str(), r))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.active.values().all(|s| s.records.is_empty())
            && self.sealed.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.sealed.clear();
    }
}
