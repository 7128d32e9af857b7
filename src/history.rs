//! Bounded undo/redo stacks
//!
//! Generic over the saved state; [`Doc`](crate::doc::Doc) stores rope snapshots.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::rope::Rope;

/// Undo/redo tracker holding at most `max_size` undo states
pub struct History<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    max_size: usize,
}

/// Snapshot history used by documents
pub type RopeHistory = History<Arc<Rope>>;

impl<T> History<T> {
    pub fn new() -> Self {
        Self::with_max_size(100)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_size,
        }
    }

    /// Record the state before an edit; clears redo
    pub fn checkpoint(&mut self, item: T) {
        if self.max_size == 0 {
            return;
        }
        self.undo.push_back(item);
        self.redo.clear();

        if self.undo.len() > self.max_size {
            self.undo.pop_front();
        }
    }

    /// Swap `current` for the last checkpoint
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Swap `current` for the last undone state
    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn peek_undo(&self) -> Option<&T> {
        self.undo.back()
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_cycle() {
        let mut history = History::new();
        history.checkpoint(1);
        history.checkpoint(2);

        assert_eq!(history.undo(3), Some(2));
        assert_eq!(history.undo(2), Some(1));
        assert_eq!(history.undo(1), None);
        assert!(history.can_redo());

        assert_eq!(history.redo(1), Some(2));
        assert_eq!(history.redo(2), Some(3));
        assert_eq!(history.redo(3), None);
    }

    #[test]
    fn test_checkpoint_clears_redo() {
        let mut history = History::new();
        history.checkpoint("a");
        history.undo("b");
        assert!(history.can_redo());

        history.checkpoint("c");
        assert!(!history.can_redo());
        assert_eq!(history.peek_undo(), Some(&"c"));
    }

    #[test]
    fn test_max_size_drops_oldest() {
        let mut history = History::with_max_size(2);
        for i in 0..5 {
            history.checkpoint(i);
        }
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo(5), Some(4));
        assert_eq!(history.undo(4), Some(3));
        assert_eq!(history.undo(3), None);
    }

    #[test]
    fn test_zero_depth_keeps_nothing() {
        let mut history = History::with_max_size(0);
        history.checkpoint(1);
        assert!(!history.can_undo());
    }
}
