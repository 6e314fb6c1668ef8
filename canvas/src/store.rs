//! Shape store: the client's replica of a room's shape list plus linear,
//! snapshot-based undo/redo.
//!
//! Every mutation copies the whole list onto the history stack. The stack is
//! linear: mutating after an undo discards the redo tail. History is capped;
//! once full, the oldest snapshot is dropped and the cursor stays on the
//! newest entry.
//!
//! Remote changes come in two flavours. Incremental peer additions use
//! [`ShapeStore::append`]; wholesale replacements (a peer's clear, a
//! value-based erase) use [`ShapeStore::restore_from_remote`], which applies
//! even while the local cursor is mid-stack. A fresh join uses
//! [`ShapeStore::load`], which also resets history.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use protocol::Shape;

use crate::consts::HISTORY_LIMIT;

/// Local shape list with snapshot history.
#[derive(Debug, Clone)]
pub struct ShapeStore {
    shapes: Vec<Shape>,
    history: Vec<Vec<Shape>>,
    cursor: usize,
    limit: usize,
}

impl ShapeStore {
    /// Empty store with the default history cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    /// Empty store keeping at most `limit` snapshots (at least one).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { shapes: Vec::new(), history: vec![Vec::new()], cursor: 0, limit: limit.max(1) }
    }

    // --- Mutations ---

    /// Add a shape on top and snapshot.
    pub fn append(&mut self, shape: Shape) {
        self.shapes.push(shape);
        self.commit();
    }

    /// Empty the list. Recorded like any other edit, so it can be undone.
    pub fn clear_all(&mut self) {
        self.shapes.clear();
        self.commit();
    }

    /// Replace the list with what a peer reported and snapshot it.
    pub fn restore_from_remote(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
        self.commit();
    }

    /// Start over from a replayed room: `shapes` becomes the only history
    /// entry and the cursor sits at 0.
    pub fn load(&mut self, shapes: Vec<Shape>) {
        self.history = vec![shapes.clone()];
        self.shapes = shapes;
        self.cursor = 0;
    }

    /// Remove every copy of `shape`. Returns how many were removed; nothing
    /// is recorded when none matched.
    pub fn erase(&mut self, shape: &Shape) -> usize {
        self.erase_many(std::slice::from_ref(shape))
    }

    /// Remove every copy of each target as a single undoable edit.
    pub fn erase_many(&mut self, targets: &[Shape]) -> usize {
        let before = self.shapes.len();
        self.shapes.retain(|s| !targets.contains(s));
        let removed = before - self.shapes.len();
        if removed > 0 {
            self.commit();
        }
        removed
    }

    /// Step back one snapshot. Returns `false` at the oldest entry.
    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.shapes.clone_from(&self.history[self.cursor]);
        true
    }

    /// Step forward one snapshot. Returns `false` at the newest entry.
    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.history.len() {
            return false;
        }
        self.cursor += 1;
        self.shapes.clone_from(&self.history[self.cursor]);
        true
    }

    fn commit(&mut self) {
        self.history.truncate(self.cursor + 1);
        self.history.push(self.shapes.clone());
        if self.history.len() > self.limit {
            self.history.remove(0);
        } else {
            self.cursor += 1;
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    /// Live shapes in draw order (bottom first).
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Number of snapshots currently kept.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Index of the snapshot the live list mirrors.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Default for ShapeStore {
    fn default() -> Self {
        Self::new()
    }
}
