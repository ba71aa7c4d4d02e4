//! Linear undo/redo history of full scene snapshots.
//!
//! `entries[index]` is always the snapshot matching the live scene after the
//! last commit, undo, or redo. Committing after an undo discards the redo
//! branch. When the capacity is exceeded the oldest entry is dropped and the
//! pointer shifts with it.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use crate::consts::HISTORY_CAPACITY;
use crate::scene::SceneRecord;

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<SceneRecord>,
    index: usize,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A history keeping at most `capacity` snapshots (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::new(), index: 0, capacity: capacity.max(1) }
    }

    /// Truncate the redo branch, append `snapshot`, and point at it.
    pub fn commit(&mut self, snapshot: SceneRecord) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(snapshot);
        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
        }
        self.index = self.entries.len() - 1;
    }

    /// Step back one snapshot. `None` at the floor.
    pub fn undo(&mut self) -> Option<&SceneRecord> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    /// Step forward one snapshot. `None` at the end.
    pub fn redo(&mut self) -> Option<&SceneRecord> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    #[must_use]
    pub fn current(&self) -> Option<&SceneRecord> {
        self.entries.get(self.index)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
