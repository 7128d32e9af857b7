//! The rope handle: construction, editing and queries by any unit

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use tracing::{debug, error};

use crate::config::RopeConfig;
use crate::cursor::{CursorId, Cursors};
use crate::dim::{Summary, Unit, FIELD_MAX};
use crate::error::{Result, RopeError};
use crate::node::{Arena, Direction, NodeId, RopeNode};
use crate::rope_str::{is_boundary, RopeStr, SplitMode, INLINE_CAP};
use crate::seek::Seek;
use crate::tree::chunk_text;

/// Height-balanced tree of text fragments
///
/// Single writer, no internal locking. Cloning copies the nodes while heap
/// text stays shared, so a clone works as a cheap snapshot. Cursors are
/// cloned along with the tree.
#[derive(Clone)]
pub struct Rope {
    pub(crate) arena: Arena,
    pub(crate) root: NodeId,
    pub(crate) cursors: Cursors,
    chunk_size: usize,
    compact_interval: usize,
    edits_since_compact: usize,
}

impl Rope {
    pub fn new() -> Self {
        Self::with_config(&RopeConfig::default())
    }

    /// Empty rope; `chunk_size` is clamped into what one leaf can hold
    pub fn with_config(config: &RopeConfig) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc_leaf(RopeStr::empty());
        Self {
            arena,
            root,
            cursors: Cursors::default(),
            chunk_size: config.chunk_size.clamp(INLINE_CAP + 1, FIELD_MAX),
            compact_interval: config.compact_interval,
            edits_since_compact: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(bytes, &RopeConfig::default())
    }

    pub fn from_bytes_with_config(bytes: &[u8], config: &RopeConfig) -> Result<Self> {
        simdutf8::compat::from_utf8(bytes)?;
        let mut rope = Self::with_config(config);
        let chunks = chunk_text(bytes, rope.chunk_size, 0)?;
        if let Some(root) = rope.arena.build_balanced(chunks)? {
            rope.adopt(root);
        }
        Ok(rope)
    }

    // === Queries ===

    pub fn len(&self, unit: Unit) -> usize {
        self.summary().get(unit)
    }

    pub fn is_empty(&self) -> bool {
        self.len(Unit::Byte) == 0
    }

    pub fn summary(&self) -> Summary {
        healthy(self.try_summary())
    }

    pub fn try_summary(&self) -> Result<Summary> {
        self.arena.summary(self.root)
    }

    pub fn depth(&self) -> u32 {
        healthy(self.arena.depth(self.root))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Read-only access to a node, for layout inspection
    pub fn node(&self, id: NodeId) -> Result<&RopeNode> {
        self.arena.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn seek(&self, unit: Unit, target: usize) -> Result<Seek> {
        self.arena.seek(self.root, unit, target)
    }

    /// Byte offset of the `index`-th `unit`
    pub fn to_byte(&self, unit: Unit, index: usize) -> Result<usize> {
        if unit == Unit::Byte {
            let len = self.len(Unit::Byte);
            if index > len {
                return Err(RopeError::OutOfBounds { index, len });
            }
            return Ok(index);
        }
        Ok(self.seek(unit, index)?.byte_index)
    }

    /// Number of `unit`s before a byte offset
    pub fn byte_to(&self, unit: Unit, byte: usize) -> Result<usize> {
        self.arena.byte_to_unit(self.root, unit, byte)
    }

    pub fn line_to_byte(&self, line: usize) -> Result<usize> {
        self.to_byte(Unit::Line, line)
    }

    pub fn byte_to_line(&self, byte: usize) -> Result<usize> {
        self.byte_to(Unit::Line, byte)
    }

    /// Offset of the first `\n` at or after `byte`
    pub fn find_next_newline(&self, byte: usize) -> Result<Option<usize>> {
        let line = self.byte_to_line(byte)?;
        if line >= self.len(Unit::Line) {
            return Ok(None);
        }
        Ok(Some(self.line_to_byte(line + 1)? - 1))
    }

    /// Offset of the last `\n` before `byte`
    pub fn find_prev_newline(&self, byte: usize) -> Result<Option<usize>> {
        match self.byte_to_line(byte)? {
            0 => Ok(None),
            line => Ok(Some(self.line_to_byte(line)? - 1)),
        }
    }

    // === Editing ===

    pub fn insert(&mut self, unit: Unit, index: usize, text: &str) -> Result<()> {
        let byte = self.to_byte(unit, index)?;
        self.insert_at(byte, text.as_bytes(), None, None)
    }

    pub fn insert_bytes(&mut self, byte: usize, bytes: &[u8]) -> Result<()> {
        simdutf8::compat::from_utf8(bytes)?;
        self.insert_at(byte, bytes, None, None)
    }

    /// Insert text whose leaves carry `tags`; it never fuses with other tags
    pub fn insert_tagged(&mut self, unit: Unit, index: usize, text: &str, tags: u64) -> Result<()> {
        let byte = self.to_byte(unit, index)?;
        self.insert_at(byte, text.as_bytes(), Some(tags), None)
    }

    pub fn delete(&mut self, unit: Unit, range: Range<usize>) -> Result<()> {
        let range = self.byte_range(unit, range)?;
        self.delete_bytes(range)
    }

    pub fn delete_bytes(&mut self, range: Range<usize>) -> Result<()> {
        self.check_range(&range)?;
        self.check_boundary(range.start)?;
        self.check_boundary(range.end)?;
        if range.is_empty() {
            return Ok(());
        }

        let (head, rest) = self.arena.split_tree(self.root, range.start, SplitMode::Char)?;
        let rest = rest.ok_or_else(|| RopeError::corrupt("delete range vanished during split"))?;
        let (middle, tail) = self.arena.split_tree(rest, range.len(), SplitMode::Char)?;
        if let Some(middle) = middle {
            self.arena.free_subtree(middle);
        }

        let root = self.arena.join_opt(head, tail)?;
        self.set_root(root);
        self.cursors.deleted(range);
        self.after_edit()
    }

    pub fn replace(&mut self, unit: Unit, range: Range<usize>, text: &str) -> Result<()> {
        let range = self.byte_range(unit, range)?;
        self.check_range(&range)?;
        self.check_boundary(range.start)?;
        self.check_boundary(range.end)?;

        let start = range.start;
        self.delete_bytes(range)?;
        self.insert_at(start, text.as_bytes(), None, None)
    }

    /// Insert and shift cursors; `origin` is the cursor typing the text
    pub(crate) fn insert_at(
        &mut self,
        byte: usize,
        bytes: &[u8],
        tags: Option<u64>,
        origin: Option<CursorId>,
    ) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.splice_in(byte, bytes, tags)?;
        self.cursors.inserted(byte, bytes.len(), origin);
        self.after_edit()
    }

    fn splice_in(&mut self, byte: usize, bytes: &[u8], tags: Option<u64>) -> Result<()> {
        let seek = self.seek(Unit::Byte, byte)?;
        let leaf = self.arena.leaf(seek.leaf)?;
        if !is_boundary(leaf.as_bytes(), seek.offset) {
            return Err(RopeError::BoundaryError { offset: byte });
        }
        let leaf_tags = leaf.tags();

        if tags.map_or(true, |t| t == leaf_tags) && leaf.len() + bytes.len() <= self.chunk_size {
            match self.arena.leaf_mut(seek.leaf)?.insert_raw(seek.offset, bytes) {
                Ok(()) => return self.arena.update_ancestors(seek.leaf),
                // Too big for the leaf after all: chunk it below
                Err(RopeError::Overflow { .. }) | Err(RopeError::OutOfRange { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        let chunks = chunk_text(bytes, self.chunk_size, tags.unwrap_or(leaf_tags))?;
        let count = chunks.len();
        let middle = self.arena.build_balanced(chunks)?;

        let (head, tail) = self.arena.split_tree(self.root, byte, SplitMode::Char)?;
        let left = self.arena.join_opt(head, middle)?;
        let root = self.arena.join_opt(left, tail)?;
        self.set_root(root);

        debug!(byte, len = bytes.len(), chunks = count, "chunked insert");
        Ok(())
    }

    // === Reading ===

    pub fn slice(&self, unit: Unit, range: Range<usize>) -> Result<String> {
        let range = self.byte_range(unit, range)?;
        let bytes = self.slice_bytes(range)?;
        String::from_utf8(bytes).map_err(|err| RopeError::InvalidEncoding {
            valid_up_to: err.utf8_error().valid_up_to(),
        })
    }

    pub fn slice_bytes(&self, range: Range<usize>) -> Result<Vec<u8>> {
        self.check_range(&range)?;
        let mut out = Vec::with_capacity(range.len());
        if range.is_empty() {
            return Ok(out);
        }

        let seek = self.seek(Unit::Byte, range.start)?;
        let mut leaf = seek.leaf;
        let mut skip = seek.offset;
        let mut needed = range.len();
        loop {
            let bytes = &self.arena.leaf(leaf)?.as_bytes()[skip..];
            let take = needed.min(bytes.len());
            out.extend_from_slice(&bytes[..take]);
            needed -= take;
            if needed == 0 {
                return Ok(out);
            }
            skip = 0;
            leaf = self
                .arena
                .neighbour(leaf, Direction::Right)?
                .ok_or_else(|| RopeError::corrupt("slice ran past the last leaf"))?;
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len(Unit::Byte));
        for chunk in self.chunks() {
            out.extend_from_slice(chunk.as_bytes());
        }
        out
    }

    /// Like `to_bytes`, but a corrupt tree is an error instead of short text
    pub fn try_to_bytes(&self) -> Result<Vec<u8>> {
        let len = self.try_summary()?.bytes;
        let mut out = Vec::with_capacity(len);
        for chunk in self.chunks_in(0..len, 0)? {
            out.extend_from_slice(chunk?);
        }
        Ok(out)
    }

    /// Materialize only leaves carrying every bit of `mask`
    pub fn to_string_tagged(&self, mask: u64) -> String {
        let bytes: Vec<u8> = self
            .chunks()
            .filter(|chunk| chunk.tags() & mask == mask)
            .flat_map(|chunk| chunk.as_bytes().iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Leaves in document order
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            arena: &self.arena,
            next: healthy(self.arena.edge_leaf(self.root, Direction::Left).map(Some)),
        }
    }

    // === Structure ===

    /// Split the leaf holding a position in place; the text is unchanged
    ///
    /// Returns the leaves on either side of the cut.
    pub fn split_at(
        &mut self,
        unit: Unit,
        index: usize,
        mode: SplitMode,
    ) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let seek = self.seek(unit, index)?;
        self.arena.split_leaf(seek.leaf, seek.offset, mode)
    }

    /// Keep `[0, index)` and return the rest as a new rope
    pub fn split_off(&mut self, unit: Unit, index: usize) -> Result<Rope> {
        let byte = self.to_byte(unit, index)?;
        let len = self.len(Unit::Byte);
        let (head, tail) = self.arena.split_tree(self.root, byte, SplitMode::Char)?;
        self.set_root(head);
        self.cursors.deleted(byte..len);

        let mut rest = self.empty_like();
        if let Some(tail) = tail {
            let root = rest.arena.import(&self.arena, tail)?;
            self.arena.free_subtree(tail);
            rest.adopt(root);
        }
        Ok(rest)
    }

    pub fn append(&mut self, other: Rope) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        let imported = self.arena.import(&other.arena, other.root)?;
        let root = self.arena.join(self.root, imported)?;
        self.set_root(Some(root));
        self.after_edit()
    }

    pub fn concat(left: Rope, right: Rope) -> Result<Rope> {
        let mut rope = left;
        rope.append(right)?;
        Ok(rope)
    }

    /// Collapse fragmented subtrees into single leaves
    pub fn compact(&mut self) -> Result<()> {
        let before = self.arena.len();
        self.root = self.arena.compact(self.root, self.chunk_size)?;
        self.edits_since_compact = 0;
        debug!(nodes_before = before, nodes_after = self.arena.len(), "compacted rope");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.cursors.deleted(0..self.len(Unit::Byte));
        self.arena.clear();
        self.root = self.arena.alloc_leaf(RopeStr::empty());
        self.edits_since_compact = 0;
    }

    /// Validate every structural invariant of the tree
    pub fn check_invariants(&self) -> Result<()> {
        self.arena.check_subtree(self.root, None)?;

        let mut reachable = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            reachable += 1;
            if let Some(children) = self.arena.get(id)?.children() {
                stack.extend(children);
            }
        }
        if reachable != self.arena.len() {
            return Err(RopeError::corrupt(format!(
                "{} nodes allocated but {} reachable",
                self.arena.len(),
                reachable
            )));
        }
        Ok(())
    }

    // === Internal ===

    fn empty_like(&self) -> Rope {
        let mut arena = Arena::new();
        let root = arena.alloc_leaf(RopeStr::empty());
        Rope {
            arena,
            root,
            cursors: Cursors::default(),
            chunk_size: self.chunk_size,
            compact_interval: self.compact_interval,
            edits_since_compact: 0,
        }
    }

    /// Replace the current tree with `root`, freeing the old one
    fn adopt(&mut self, root: NodeId) {
        self.arena.free_subtree(self.root);
        self.set_root(Some(root));
    }

    fn set_root(&mut self, root: Option<NodeId>) {
        self.root = match root {
            Some(root) => root,
            None => self.arena.alloc_leaf(RopeStr::empty()),
        };
        if let Ok(node) = self.arena.get_mut(self.root) {
            node.parent = None;
        }
    }

    fn after_edit(&mut self) -> Result<()> {
        self.edits_since_compact += 1;
        if self.compact_interval > 0 && self.edits_since_compact >= self.compact_interval {
            self.compact()?;
        }
        Ok(())
    }

    pub(crate) fn byte_range(&self, unit: Unit, range: Range<usize>) -> Result<Range<usize>> {
        Ok(self.to_byte(unit, range.start)?..self.to_byte(unit, range.end)?)
    }

    pub(crate) fn check_range(&self, range: &Range<usize>) -> Result<()> {
        let len = self.len(Unit::Byte);
        if range.start > range.end {
            return Err(RopeError::OutOfBounds {
                index: range.start,
                len: range.end,
            });
        }
        if range.end > len {
            return Err(RopeError::OutOfBounds {
                index: range.end,
                len,
            });
        }
        Ok(())
    }

    fn check_boundary(&self, byte: usize) -> Result<()> {
        let seek = self.seek(Unit::Byte, byte)?;
        if is_boundary(self.arena.leaf(seek.leaf)?.as_bytes(), seek.offset) {
            Ok(())
        } else {
            Err(RopeError::BoundaryError { offset: byte })
        }
    }
}

impl Default for Rope {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Rope {
    type Err = RopeError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_bytes(text.as_bytes())
    }
}

impl PartialEq for Rope {
    fn eq(&self, other: &Self) -> bool {
        self.summary() == other.summary() && self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Rope {}

impl fmt::Display for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.try_to_bytes().map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&bytes))
    }
}

impl fmt::Debug for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rope")
            .field("summary", &self.summary())
            .field("depth", &self.depth())
            .field("nodes", &self.arena.len())
            .finish()
    }
}

/// Value of a query that cannot fail on a well-formed tree
///
/// A corrupt tree trips a debug assertion and reads as empty in release.
fn healthy<T: Default>(result: Result<T>) -> T {
    result.unwrap_or_else(|err| {
        error!(%err, "query on a corrupt rope");
        debug_assert!(false, "query on a corrupt rope: {err}");
        T::default()
    })
}

/// Iterator over a rope's leaves, following parent links between them
pub struct Chunks<'a> {
    arena: &'a Arena,
    next: Option<NodeId>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a RopeStr;

    fn next(&mut self) -> Option<&'a RopeStr> {
        let arena = self.arena;
        loop {
            let id = self.next?;
            let step = arena
                .leaf(id)
                .and_then(|text| Ok(Some((text, arena.neighbour(id, Direction::Right)?))));
            let Some((text, after)) = healthy(step) else {
                self.next = None;
                return None;
            };
            self.next = after;
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
}
