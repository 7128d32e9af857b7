//! Cursors and ranges that follow the text through edits
//!
//! A cursor is a byte position owned by the rope. Every insert or delete
//! shifts the cursors behind it, so a handle keeps pointing at the same
//! text. Text inserted exactly at a cursor lands after it, unless the insert
//! goes through that cursor, which then moves past the new text.

use std::ops::Range;
use std::sync::Arc;

use crate::dim::Unit;
use crate::error::{Result, RopeError};
use crate::node::{Arena, Direction, NodeId};
use crate::rope::Rope;
use crate::seek::absolute;

/// Called with the cursor and its new byte offset after an edit moved it
pub type CursorCallback = Arc<dyn Fn(CursorId, usize) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorId(u32);

impl CursorId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Two cursors bounding a span of text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CursorRange {
    pub start: CursorId,
    pub end: CursorId,
}

#[derive(Clone)]
struct Slot {
    byte: usize,
    on_move: Option<CursorCallback>,
}

/// Slot table of live cursors
#[derive(Clone, Default)]
pub(crate) struct Cursors {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,
}

impl Cursors {
    pub(crate) fn add(&mut self, byte: usize) -> CursorId {
        let slot = Some(Slot {
            byte,
            on_move: None,
        });
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                CursorId(index)
            }
            None => {
                self.slots.push(slot);
                CursorId((self.slots.len() - 1) as u32)
            }
        }
    }

    pub(crate) fn remove(&mut self, id: CursorId) -> Result<()> {
        self.slot(id)?;
        self.slots[id.index()] = None;
        self.free.push(id.0);
        Ok(())
    }

    pub(crate) fn get(&self, id: CursorId) -> Result<usize> {
        Ok(self.slot(id)?.byte)
    }

    /// Place a cursor explicitly; callbacks only hear about edits
    pub(crate) fn set(&mut self, id: CursorId, byte: usize) -> Result<()> {
        self.slot_mut(id)?.byte = byte;
        Ok(())
    }

    pub(crate) fn set_callback(&mut self, id: CursorId, callback: Option<CursorCallback>) -> Result<()> {
        self.slot_mut(id)?.on_move = callback;
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// `len` bytes were inserted at `at`; `origin` moves past them
    pub(crate) fn inserted(&mut self, at: usize, len: usize, origin: Option<CursorId>) {
        self.shift(|id, byte| {
            if byte > at || Some(id) == origin {
                byte + len
            } else {
                byte
            }
        });
    }

    /// `range` was removed; cursors inside it collapse to its start
    pub(crate) fn deleted(&mut self, range: Range<usize>) {
        self.shift(|_, byte| {
            if byte >= range.end {
                byte - range.len()
            } else if byte > range.start {
                range.start
            } else {
                byte
            }
        });
    }

    fn shift(&mut self, mut moved: impl FnMut(CursorId, usize) -> usize) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(slot) = slot else {
                continue;
            };
            let id = CursorId(index as u32);
            let byte = moved(id, slot.byte);
            if byte != slot.byte {
                slot.byte = byte;
                if let Some(callback) = &slot.on_move {
                    callback(id, byte);
                }
            }
        }
    }

    fn slot(&self, id: CursorId) -> Result<&Slot> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(RopeError::UnknownCursor { id: id.0 })
    }

    fn slot_mut(&mut self, id: CursorId) -> Result<&mut Slot> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(RopeError::UnknownCursor { id: id.0 })
    }
}

impl Rope {
    // === Cursors ===

    /// New cursor at the `index`-th `unit`
    pub fn add_cursor(&mut self, unit: Unit, index: usize) -> Result<CursorId> {
        let byte = self.to_byte(unit, index)?;
        Ok(self.cursors.add(byte))
    }

    pub fn remove_cursor(&mut self, id: CursorId) -> Result<()> {
        self.cursors.remove(id)
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Call `callback` whenever an edit moves the cursor
    pub fn set_cursor_callback(
        &mut self,
        id: CursorId,
        callback: impl Fn(CursorId, usize) + Send + Sync + 'static,
    ) -> Result<()> {
        self.cursors.set_callback(id, Some(Arc::new(callback)))
    }

    pub fn clear_cursor_callback(&mut self, id: CursorId) -> Result<()> {
        self.cursors.set_callback(id, None)
    }

    /// Cursor position in `unit`s
    pub fn cursor_index(&self, id: CursorId, unit: Unit) -> Result<usize> {
        let byte = self.cursors.get(id)?;
        self.byte_to(unit, byte)
    }

    /// Cursor position counting only leaves that carry every bit of `mask`
    pub fn cursor_index_tagged(&self, id: CursorId, unit: Unit, mask: u64) -> Result<usize> {
        let byte = self.cursors.get(id)?;
        self.count_tagged(unit, byte, mask)
    }

    pub fn move_to(&mut self, id: CursorId, unit: Unit, index: usize) -> Result<()> {
        let byte = self.to_byte(unit, index)?;
        self.cursors.set(id, byte)
    }

    /// Move by a signed number of `unit`s, stopping at the start of the text
    pub fn move_by(&mut self, id: CursorId, unit: Unit, offset: isize) -> Result<()> {
        let current = self.cursor_index(id, unit)?;
        self.move_to(id, unit, current.saturating_add_signed(offset))
    }

    /// Insert at the cursor, which ends up after the new text
    pub fn cursor_insert(&mut self, id: CursorId, text: &str) -> Result<()> {
        let byte = self.cursors.get(id)?;
        self.insert_at(byte, text.as_bytes(), None, Some(id))
    }

    pub fn cursor_insert_tagged(&mut self, id: CursorId, text: &str, tags: u64) -> Result<()> {
        let byte = self.cursors.get(id)?;
        self.insert_at(byte, text.as_bytes(), Some(tags), Some(id))
    }

    /// Delete `count` `unit`s following the cursor
    pub fn cursor_delete(&mut self, id: CursorId, unit: Unit, count: usize) -> Result<()> {
        let start = self.cursors.get(id)?;
        let first = self.byte_to(unit, start)?;
        let end = self.to_byte(unit, first + count)?;
        self.delete_bytes(start..end)
    }

    // === Ranges ===

    pub fn add_range(&mut self, unit: Unit, range: Range<usize>) -> Result<CursorRange> {
        let bytes = self.byte_range(unit, range)?;
        self.check_range(&bytes)?;
        Ok(CursorRange {
            start: self.cursors.add(bytes.start),
            end: self.cursors.add(bytes.end),
        })
    }

    pub fn remove_range(&mut self, range: CursorRange) -> Result<()> {
        self.cursors.remove(range.start)?;
        self.cursors.remove(range.end)
    }

    /// Byte span of a range; an end before the start reads as empty
    pub fn range_bytes(&self, range: CursorRange) -> Result<Range<usize>> {
        let start = self.cursors.get(range.start)?;
        let end = self.cursors.get(range.end)?;
        Ok(start..end.max(start))
    }

    pub fn range_size(&self, range: CursorRange, unit: Unit) -> Result<usize> {
        let bytes = self.range_bytes(range)?;
        Ok(self.byte_to(unit, bytes.end)? - self.byte_to(unit, bytes.start)?)
    }

    pub fn range_delete(&mut self, range: CursorRange) -> Result<()> {
        let bytes = self.range_bytes(range)?;
        self.cursors.set(range.end, bytes.end)?;
        self.delete_bytes(bytes)
    }

    /// Replace the range's text; afterwards the range spans the new text
    pub fn range_replace(&mut self, range: CursorRange, text: &str) -> Result<()> {
        self.range_delete(range)?;
        self.cursor_insert(range.end, text)
    }

    /// Text of the range taken from leaves carrying every bit of `mask`
    pub fn range_to_string(&self, range: CursorRange, mask: u64) -> Result<String> {
        let mut out = Vec::with_capacity(self.range_bytes(range)?.len());
        for chunk in self.range_chunks(range, mask)? {
            out.extend_from_slice(chunk?);
        }
        String::from_utf8(out).map_err(|err| RopeError::InvalidEncoding {
            valid_up_to: err.utf8_error().valid_up_to(),
        })
    }

    /// Insert a copy of the range at `target`, tagged with `tags`
    pub fn range_copy_to(&mut self, range: CursorRange, target: CursorId, tags: u64) -> Result<()> {
        let text = self.range_to_string(range, 0)?;
        self.cursor_insert_tagged(target, &text, tags)
    }

    /// Move one end onto the other; `Left` keeps the start
    pub fn range_collapse(&mut self, range: CursorRange, dir: Direction) -> Result<()> {
        let bytes = self.range_bytes(range)?;
        let at = match dir {
            Direction::Left => bytes.start,
            Direction::Right => bytes.end,
        };
        self.cursors.set(range.start, at)?;
        self.cursors.set(range.end, at)
    }

    pub fn range_chunks(&self, range: CursorRange, mask: u64) -> Result<RangeChunks<'_>> {
        let bytes = self.range_bytes(range)?;
        self.chunks_in(bytes, mask)
    }

    /// Leaf slices covering `range`, skipping leaves without every bit of `mask`
    pub fn chunks_in(&self, range: Range<usize>, mask: u64) -> Result<RangeChunks<'_>> {
        self.check_range(&range)?;
        let start = if range.is_empty() {
            None
        } else {
            Some(self.seek(Unit::Byte, range.start)?)
        };
        Ok(RangeChunks {
            arena: &self.arena,
            next: start.map(|seek| seek.leaf),
            skip: start.map_or(0, |seek| seek.offset),
            remaining: range.len(),
            mask,
        })
    }

    fn count_tagged(&self, unit: Unit, byte: usize, mask: u64) -> Result<usize> {
        let target = self.seek(Unit::Byte, byte)?;
        let mut count = 0;
        let mut leaf = Some(self.arena.edge_leaf(self.root, Direction::Left)?);
        while let Some(id) = leaf {
            let text = self.arena.leaf(id)?;
            let matches = text.tags() & mask == mask;
            if id == target.leaf {
                if matches {
                    count += text
                        .byte_to_unit(unit, target.offset)
                        .map_err(|err| absolute(err, byte))?;
                }
                return Ok(count);
            }
            if matches {
                count += text.summary().get(unit);
            }
            leaf = self.arena.neighbour(id, Direction::Right)?;
        }
        Err(RopeError::corrupt("cursor leaf unreachable from the first leaf"))
    }
}

/// Trimmed leaf slices of a byte range, in document order
pub struct RangeChunks<'a> {
    arena: &'a Arena,
    next: Option<NodeId>,
    skip: usize,
    remaining: usize,
    mask: u64,
}

impl<'a> Iterator for RangeChunks<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Result<&'a [u8]>> {
        let arena = self.arena;
        while self.remaining > 0 {
            let Some(id) = self.next else {
                self.remaining = 0;
                return Some(Err(RopeError::corrupt("range ran past the last leaf")));
            };
            let step = arena
                .leaf(id)
                .and_then(|text| Ok((text, arena.neighbour(id, Direction::Right)?)));
            let (text, after) = match step {
                Ok(step) => step,
                Err(err) => {
                    self.remaining = 0;
                    return Some(Err(err));
                }
            };

            let bytes = &text.as_bytes()[self.skip.min(text.len())..];
            let take = bytes.len().min(self.remaining);
            self.remaining -= take;
            self.skip = 0;
            self.next = after;

            if take > 0 && text.tags() & self.mask == self.mask {
                return Some(Ok(&bytes[..take]));
            }
        }
        None
    }
}
