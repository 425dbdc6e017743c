//! Bounded, insertion-ordered id history.

use serde::{Deserialize, Serialize};

/// Maximum ids kept per history list.
pub const HISTORY_CAP: usize = 100;

/// Most-recent-first list of ids.
///
/// Ordering is by insertion only; reads never reorder. Re-inserting an id that
/// is already present adds a second slot for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryIndex(Vec<String>);

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `id`, then drop whatever no longer fits under `cap` (oldest first).
    /// Returns the evicted ids.
    pub fn record(&mut self, id: impl Into<String>, cap: usize) -> Vec<String> {
        self.0.insert(0, id.into());
        if self.0.len() > cap {
            self.0.split_off(cap)
        } else {
            Vec::new()
        }
    }

    /// Up to `limit` most recent ids.
    pub fn recent(&self, limit: usize) -> &[String] {
        &self.0[..limit.min(self.0.len())]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
