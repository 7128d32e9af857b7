//! Shared document with RCU (Read-Copy-Update) snapshots
//!
//! Readers load the current rope without locking. Writers buffer edits in a
//! lock-free queue; a flush applies them to a copy of the snapshot and
//! publishes the result atomically.
//!
//! The copy duplicates every tree node, so a flush costs O(nodes) on top of
//! the edits themselves. Leaf text on the heap is shared with the old
//! snapshot and only copied when an edit touches it. Batching keeps that
//! cost to one copy per flush rather than one per keystroke.

use arc_swap::ArcSwap;
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use std::ops::Range;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RopeConfig;
use crate::dim::Unit;
use crate::error::{Result, RopeError};
use crate::history::RopeHistory;
use crate::rope::Rope;

/// Edit operations, in byte offsets
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    Insert { pos: usize, text: String },
    Delete { range: Range<usize> },
    Replace { range: Range<usize>, text: String },
}

impl Edit {
    pub fn apply(&self, rope: &mut Rope) -> Result<()> {
        match self {
            Edit::Insert { pos, text } => rope.insert(Unit::Byte, *pos, text),
            Edit::Delete { range } => rope.delete(Unit::Byte, range.clone()),
            Edit::Replace { range, text } => rope.replace(Unit::Byte, range.clone(), text),
        }
    }
}

pub struct Doc {
    /// Current immutable snapshot for readers
    snapshot: ArcSwap<Rope>,
    /// Buffered edits waiting to be applied
    pending: SegQueue<Edit>,
    /// Approximate count of pending edits for auto-flush
    pending_count: AtomicUsize,
    /// Bumped on every publish
    version: AtomicU64,
    /// Past snapshots; the lock also serializes writers
    history: Mutex<RopeHistory>,
    flush_threshold: usize,
}

impl Doc {
    pub fn new() -> Self {
        Self::with_config(&RopeConfig::default())
    }

    pub fn with_config(config: &RopeConfig) -> Self {
        Self::from_rope(Rope::with_config(config), config)
    }

    pub fn from_rope(rope: Rope, config: &RopeConfig) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(rope),
            pending: SegQueue::new(),
            pending_count: AtomicUsize::new(0),
            version: AtomicU64::new(0),
            history: Mutex::new(RopeHistory::with_max_size(config.history_depth)),
            flush_threshold: config.flush_threshold.max(1),
        }
    }

    /// Current snapshot; never blocks
    pub fn read(&self) -> Arc<Rope> {
        self.snapshot.load_full()
    }

    /// Buffer an edit, flushing once enough are queued
    pub fn edit(&self, edit: Edit) -> Result<()> {
        self.pending.push(edit);
        let count = self.pending_count.fetch_add(1, Ordering::Relaxed) + 1;

        if count >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Apply all pending edits as one batch
    ///
    /// If any edit fails the whole batch is dropped and the published
    /// snapshot stays as it was. Copying the snapshot is linear in its node
    /// count; untouched heap text is not copied.
    pub fn flush(&self) -> Result<()> {
        let mut history = self.history.lock();

        let mut edits = Vec::new();
        while let Some(edit) = self.pending.pop() {
            edits.push(edit);
        }
        if edits.is_empty() {
            return Ok(());
        }
        self.pending_count.store(0, Ordering::Relaxed);

        let current = self.snapshot.load_full();
        let mut next = Rope::clone(&current);
        for (index, edit) in edits.iter().enumerate() {
            if let Err(err) = edit.apply(&mut next) {
                warn!(%err, index, batch = edits.len(), "rejected flush, snapshot unchanged");
                return Err(err);
            }
        }

        history.checkpoint(current);
        self.publish(next);
        debug!(edits = edits.len(), version = self.version(), "flushed edits");
        Ok(())
    }

    /// Publish a whole new rope as one undoable step
    pub fn replace_tree(&self, rope: Rope) -> Result<()> {
        self.flush()?;
        let mut history = self.history.lock();
        history.checkpoint(self.snapshot.load_full());
        self.publish(rope);
        Ok(())
    }

    /// Restore the previous snapshot; false when there is none
    pub fn undo(&self) -> Result<bool> {
        self.flush()?;
        let mut history = self.history.lock();
        match history.undo(self.snapshot.load_full()) {
            Some(previous) => {
                self.publish_arc(previous);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&self) -> Result<bool> {
        self.flush()?;
        let mut history = self.history.lock();
        match history.redo(self.snapshot.load_full()) {
            Some(next) => {
                self.publish_arc(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.lock().can_redo()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Approximate number of buffered edits
    pub fn pending(&self) -> usize {
        self.pending_count.load(Ordering::Relaxed)
    }

    fn publish(&self, rope: Rope) {
        self.publish_arc(Arc::new(rope));
    }

    fn publish_arc(&self, rope: Arc<Rope>) {
        self.snapshot.store(rope);
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for Doc {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Doc {
    type Err = RopeError;

    fn from_str(text: &str) -> Result<Self> {
        Ok(Self::from_rope(text.parse()?, &RopeConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edits_buffer_until_flush() {
        let doc: Doc = "hello".parse().unwrap();
        doc.edit(Edit::Insert {
            pos: 5,
            text: " world".to_string(),
        })
        .unwrap();

        assert_eq!(doc.read().to_string(), "hello");
        assert_eq!(doc.pending(), 1);

        doc.flush().unwrap();
        assert_eq!(doc.read().to_string(), "hello world");
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.pending(), 0);
    }

    #[test]
    fn test_auto_flush_at_threshold() {
        let config = RopeConfig {
            flush_threshold: 3,
            ..RopeConfig::default()
        };
        let doc = Doc::with_config(&config);
        for _ in 0..3 {
            doc.edit(Edit::Insert {
                pos: 0,
                text: "x".to_string(),
            })
            .unwrap();
        }
        assert_eq!(doc.read().to_string(), "xxx");
    }

    #[test]
    fn test_failed_flush_keeps_snapshot() {
        let doc: Doc = "abc".parse().unwrap();
        doc.edit(Edit::Delete { range: 0..1 }).unwrap();
        doc.edit(Edit::Delete { range: 5..9 }).unwrap();

        assert!(matches!(doc.flush(), Err(RopeError::OutOfBounds { .. })));
        assert_eq!(doc.read().to_string(), "abc");
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_undo_redo() {
        let doc: Doc = "one".parse().unwrap();
        doc.edit(Edit::Replace {
            range: 0..3,
            text: "two".to_string(),
        })
        .unwrap();
        doc.flush().unwrap();

        assert!(doc.undo().unwrap());
        assert_eq!(doc.read().to_string(), "one");
        assert!(!doc.undo().unwrap());

        assert!(doc.redo().unwrap());
        assert_eq!(doc.read().to_string(), "two");
        assert!(!doc.can_redo());
    }

    #[test]
    fn test_flush_shares_untouched_text() {
        let text = "0123456789abcdef".repeat(256);
        let doc = Doc::from_rope(text.parse().unwrap(), &RopeConfig::default());
        let before = doc.read();

        doc.edit(Edit::Insert {
            pos: 0,
            text: "x".to_string(),
        })
        .unwrap();
        doc.flush().unwrap();
        let after = doc.read();

        let old_tail = before.chunks().last().unwrap();
        let new_tail = after.chunks().last().unwrap();
        assert!(!old_tail.is_inline());
        assert_eq!(old_tail.as_bytes().as_ptr(), new_tail.as_bytes().as_ptr());
        assert_eq!(after.len(Unit::Byte), text.len() + 1);
    }

    #[test]
    fn test_old_snapshot_survives_edits() {
        let doc: Doc = "stable".parse().unwrap();
        let before = doc.read();
        doc.edit(Edit::Insert {
            pos: 0,
            text: "un".to_string(),
        })
        .unwrap();
        doc.flush().unwrap();

        assert_eq!(before.to_string(), "stable");
        assert_eq!(doc.read().to_string(), "unstable");
    }
}
