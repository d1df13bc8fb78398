//! Bounded undo/redo history of notebook snapshots.
//!
//! Recording a new snapshot discards any redo states past the cursor. Once
//! [`HISTORY_CAPACITY`] snapshots are held, the oldest is dropped.

use std::collections::VecDeque;

use crate::notebook::Notebook;

/// Maximum number of snapshots kept.
pub const HISTORY_CAPACITY: usize = 30;

/// Linear edit history with a cursor.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    states: VecDeque<Notebook>,
    /// Index of the current snapshot in `states`. Meaningless when empty.
    cursor: usize,
}

impl EditHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new current snapshot.
    pub fn record(&mut self, snapshot: Notebook) {
        if !self.states.is_empty() {
            self.states.truncate(self.cursor.saturating_add(1));
        }
        self.states.push_back(snapshot);
        while self.states.len() > HISTORY_CAPACITY {
            self.states.pop_front();
        }
        self.cursor = self.states.len().saturating_sub(1);
    }

    /// Step back one snapshot and return it.
    pub fn undo(&mut self) -> Option<&Notebook> {
        if !self.can_undo() {
            return None;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.states.get(self.cursor)
    }

    /// Step forward one snapshot and return it.
    pub fn redo(&mut self) -> Option<&Notebook> {
        if !self.can_redo() {
            return None;
        }
        self.cursor = self.cursor.saturating_add(1);
        self.states.get(self.cursor)
    }

    /// Returns `true` if there is an earlier snapshot.
    pub fn can_undo(&self) -> bool {
        !self.states.is_empty() && self.cursor > 0
    }

    /// Returns `true` if there is a later snapshot.
    pub fn can_redo(&self) -> bool {
        self.cursor.saturating_add(1) < self.states.len()
    }

    /// Number of snapshots held.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forget all snapshots.
    pub fn clear(&mut self) {
        self.states.clear();
        self.cursor = 0;
    }
}
