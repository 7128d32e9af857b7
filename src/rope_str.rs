//! Leaf payload with a small-string optimization
//!
//! Text up to [`INLINE_CAP`] bytes lives inside the node. Longer text sits in
//! a shared heap buffer; clones and slices bump the reference count, and the
//! first mutation through a shared or windowed handle copies the window out.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::dim::{stray_weight, Dim, Segment, Segments, Summary, Unit, FIELD_MAX};
use crate::error::{Result, RopeError};

/// Largest text kept inline
pub const INLINE_CAP: usize = 16;

/// How strictly a split offset is checked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitMode {
    /// Reject offsets inside a multi-byte character
    Char,
    /// Split at any byte; the halves may hold partial sequences
    Byte,
}

/// Ownership state of a [`RopeStr`], as reported by [`RopeStr::flags`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrFlags(u8);

impl StrFlags {
    pub const INLINE: StrFlags = StrFlags(1 << 0);
    pub const HEAP: StrFlags = StrFlags(1 << 1);
    pub const SHARED: StrFlags = StrFlags(1 << 2);

    pub fn contains(self, other: StrFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

#[derive(Clone)]
#[repr(C, u8)]
enum Storage {
    Inline([u8; INLINE_CAP]),
    Heap {
        buf: Arc<Vec<u8>>,
        start: usize,
        len: usize,
    },
}

#[derive(Clone)]
#[repr(C)]
pub struct RopeStr {
    dim: Dim,
    storage: Storage,
    tags: u64,
}

impl RopeStr {
    pub fn empty() -> Self {
        Self {
            dim: Dim::EMPTY,
            storage: Storage::Inline([0; INLINE_CAP]),
            tags: 0,
        }
    }

    /// Validate and copy `bytes` into a new leaf string
    pub fn new(bytes: &[u8]) -> Result<Self> {
        simdutf8::compat::from_utf8(bytes)?;
        Self::from_raw(bytes, 0)
    }

    /// Build without UTF-8 validation; counters still follow the lenient scan
    pub(crate) fn from_raw(bytes: &[u8], tags: u64) -> Result<Self> {
        if bytes.len() > FIELD_MAX {
            return Err(RopeError::OutOfRange {
                field: "bytes",
                value: bytes.len(),
                max: FIELD_MAX,
            });
        }

        let dim = Dim::scan(bytes)?;
        let storage = if bytes.len() <= INLINE_CAP {
            Storage::Inline(inline_from(&[bytes]))
        } else {
            Storage::Heap {
                buf: Arc::new(bytes.to_vec()),
                start: 0,
                len: bytes.len(),
            }
        };

        Ok(Self { dim, storage, tags })
    }

    pub fn with_tags(mut self, tags: u64) -> Self {
        self.tags = tags;
        self
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Inline(data) => &data[..self.dim.bytes()],
            Storage::Heap { buf, start, len } => &buf[*start..*start + *len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dim.bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn dim(&self) -> Dim {
        self.dim
    }

    /// Exact counters; rescans when the packed last-char size saturated
    #[inline]
    pub fn summary(&self) -> Summary {
        if self.dim.is_saturated() {
            return Summary::scan(self.as_bytes());
        }
        self.dim.decode()
    }

    #[inline]
    pub fn tags(&self) -> u64 {
        self.tags
    }

    pub fn set_tags(&mut self, tags: u64) {
        self.tags = tags;
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }

    /// True when another handle references the same heap buffer
    pub fn is_shared(&self) -> bool {
        match &self.storage {
            Storage::Inline(_) => false,
            Storage::Heap { buf, .. } => Arc::strong_count(buf) > 1,
        }
    }

    pub fn flags(&self) -> StrFlags {
        if self.is_inline() {
            StrFlags::INLINE
        } else if self.is_shared() {
            StrFlags(StrFlags::HEAP.0 | StrFlags::SHARED.0)
        } else {
            StrFlags::HEAP
        }
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.insert(self.len(), bytes)
    }

    /// Insert valid UTF-8 at a byte offset
    pub fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        simdutf8::compat::from_utf8(bytes)?;
        self.check_offset(offset, SplitMode::Char)?;
        self.insert_raw(offset, bytes)
    }

    /// Insert without validating `bytes` or the offset's character boundary
    pub(crate) fn insert_raw(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        if offset > self.len() {
            return Err(RopeError::OutOfBounds {
                index: offset,
                len: self.len(),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        // Field-wise bound first so a too-large edit never touches storage
        self.dim.combine(Dim::scan(bytes)?)?;

        let new_len = self.len() + bytes.len();
        if new_len <= INLINE_CAP {
            let current = self.as_bytes();
            let data = inline_from(&[&current[..offset], bytes, &current[offset..]]);
            self.dim = Dim::scan(&data[..new_len])?;
            self.storage = Storage::Inline(data);
            return Ok(());
        }

        let old_dim = self.dim;
        let mut owned = self.take_bytes();
        owned.splice(offset..offset, bytes.iter().copied());
        match Dim::scan(&owned) {
            Ok(dim) => {
                self.commit(owned, dim);
                Ok(())
            }
            Err(err) => {
                owned.drain(offset..offset + bytes.len());
                self.commit(owned, old_dim);
                Err(err)
            }
        }
    }

    /// Shorten to `len` bytes; relocates inline once the text fits
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        self.check_offset(len, SplitMode::Char)?;
        self.truncate_raw(len)
    }

    /// Copy of a byte range; heap text shares the buffer
    pub fn slice(&self, range: Range<usize>) -> Result<RopeStr> {
        if range.start > range.end {
            return Err(RopeError::OutOfBounds {
                index: range.start,
                len: range.end,
            });
        }
        self.check_offset(range.start, SplitMode::Char)?;
        self.check_offset(range.end, SplitMode::Char)?;
        self.slice_raw(range)
    }

    /// Keep `[0, offset)` and return `[offset, len)`
    pub fn split_off(&mut self, offset: usize, mode: SplitMode) -> Result<RopeStr> {
        self.check_offset(offset, mode)?;
        let tail = self.slice_raw(offset..self.len())?;
        self.truncate_raw(offset)?;
        Ok(tail)
    }

    /// Byte offset of the `index`-th unit inside this string
    pub fn unit_to_byte(&self, unit: Unit, index: usize) -> Result<usize> {
        let total = self.dim.get(unit);
        if index > total {
            return Err(RopeError::OutOfBounds { index, len: total });
        }

        let bytes = self.as_bytes();
        match unit {
            Unit::Byte => Ok(index),
            Unit::Line => Ok(line_start(bytes, index)),
            _ => {
                let mut seen = 0;
                let mut found = None;
                walk_units(bytes, unit, |start, _, weight| {
                    // Stray continuation bytes belong to the previous leaf's character
                    if seen == index && weight > 0 {
                        found = Some(Ok(start));
                        return false;
                    }
                    if seen + weight > index {
                        found = Some(Err(RopeError::BoundaryError { offset: index }));
                        return false;
                    }
                    seen += weight;
                    true
                });
                found.unwrap_or(Ok(bytes.len()))
            }
        }
    }

    /// Number of `unit`s in the first `byte` bytes
    pub fn byte_to_unit(&self, unit: Unit, byte: usize) -> Result<usize> {
        let bytes = self.as_bytes();
        if byte > bytes.len() {
            return Err(RopeError::OutOfBounds {
                index: byte,
                len: bytes.len(),
            });
        }

        match unit {
            Unit::Byte => Ok(byte),
            Unit::Line => Ok(bytecount::count(&bytes[..byte], b'\n')),
            _ if !is_boundary(bytes, byte) => Err(RopeError::BoundaryError { offset: byte }),
            _ => {
                let mut count = 0;
                let mut result = Ok(0);
                walk_units(bytes, unit, |start, len, weight| {
                    if start + len <= byte {
                        count += weight;
                        return true;
                    }
                    if start < byte {
                        result = Err(RopeError::BoundaryError { offset: byte });
                    }
                    false
                });
                result.map(|_| count)
            }
        }
    }

    // === Internal ===

    pub(crate) fn check_offset(&self, offset: usize, mode: SplitMode) -> Result<()> {
        let bytes = self.as_bytes();
        if offset > bytes.len() {
            return Err(RopeError::OutOfBounds {
                index: offset,
                len: bytes.len(),
            });
        }
        if mode == SplitMode::Char && !is_boundary(bytes, offset) {
            return Err(RopeError::BoundaryError { offset });
        }
        Ok(())
    }

    fn slice_raw(&self, range: Range<usize>) -> Result<RopeStr> {
        let bytes = &self.as_bytes()[range.clone()];
        let dim = Dim::scan(bytes)?;
        let storage = match &self.storage {
            Storage::Heap { buf, start, .. } if bytes.len() > INLINE_CAP => Storage::Heap {
                buf: Arc::clone(buf),
                start: start + range.start,
                len: bytes.len(),
            },
            _ => Storage::Inline(inline_from(&[bytes])),
        };
        Ok(RopeStr {
            dim,
            storage,
            tags: self.tags,
        })
    }

    fn truncate_raw(&mut self, new_len: usize) -> Result<()> {
        let dim = Dim::scan(&self.as_bytes()[..new_len])?;
        if new_len <= INLINE_CAP {
            let data = inline_from(&[&self.as_bytes()[..new_len]]);
            self.storage = Storage::Inline(data);
        } else if let Storage::Heap { len, .. } = &mut self.storage {
            *len = new_len;
        }
        self.dim = dim;
        Ok(())
    }

    /// Move the text out as an owned buffer, copying only if shared or windowed
    fn take_bytes(&mut self) -> Vec<u8> {
        let len = self.len();
        match std::mem::replace(&mut self.storage, Storage::Inline([0; INLINE_CAP])) {
            Storage::Inline(data) => {
                let mut owned = Vec::with_capacity(INLINE_CAP * 2);
                owned.extend_from_slice(&data[..len]);
                owned
            }
            Storage::Heap { buf, start, len } => match Arc::try_unwrap(buf) {
                Ok(mut owned) => {
                    owned.truncate(start + len);
                    owned.drain(..start);
                    owned
                }
                Err(shared) => shared[start..start + len].to_vec(),
            },
        }
    }

    fn commit(&mut self, bytes: Vec<u8>, dim: Dim) {
        self.storage = if bytes.len() <= INLINE_CAP {
            Storage::Inline(inline_from(&[&bytes]))
        } else {
            let len = bytes.len();
            Storage::Heap {
                buf: Arc::new(bytes),
                start: 0,
                len,
            }
        };
        self.dim = dim;
    }
}

impl Default for RopeStr {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for RopeStr {
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for RopeStr {}

impl fmt::Debug for RopeStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RopeStr")
            .field("text", &String::from_utf8_lossy(self.as_bytes()))
            .field("dim", &self.dim)
            .field("tags", &self.tags)
            .field("flags", &self.flags())
            .finish()
    }
}

/// True unless `offset` points at a UTF-8 continuation byte
#[inline]
pub fn is_boundary(bytes: &[u8], offset: usize) -> bool {
    match bytes.get(offset) {
        None => offset == bytes.len(),
        Some(&b) => b & 0xC0 != 0x80,
    }
}

/// Byte offset just past the `line`-th newline (0 for line 0)
pub(crate) fn line_start(bytes: &[u8], line: usize) -> usize {
    if line == 0 {
        return 0;
    }
    memchr::memchr_iter(b'\n', bytes)
        .nth(line - 1)
        .map_or(bytes.len(), |pos| pos + 1)
}

/// Visit each `unit` in order as `(start, byte_len, weight)` until `visit` returns false
pub(crate) fn walk_units(
    bytes: &[u8],
    unit: Unit,
    mut visit: impl FnMut(usize, usize, usize) -> bool,
) {
    let mut base = 0;
    for segment in Segments::new(bytes) {
        match segment {
            Segment::Text(text) => {
                let more = match unit {
                    Unit::Char => text
                        .grapheme_indices(true)
                        .all(|(i, g)| visit(base + i, g.len(), 1)),
                    Unit::Utf16 => text
                        .char_indices()
                        .all(|(i, c)| visit(base + i, c.len_utf8(), c.len_utf16())),
                    Unit::Byte => text
                        .char_indices()
                        .all(|(i, c)| visit(base + i, c.len_utf8(), c.len_utf8())),
                    Unit::Codepoint | Unit::Line => text
                        .char_indices()
                        .all(|(i, c)| visit(base + i, c.len_utf8(), 1)),
                };
                if !more {
                    return;
                }
                base += text.len();
            }
            Segment::Invalid(byte) => {
                if !visit(base, 1, stray_weight(byte, unit)) {
                    return;
                }
                base += 1;
            }
        }
    }
}

fn inline_from(parts: &[&[u8]]) -> [u8; INLINE_CAP] {
    let mut data = [0; INLINE_CAP];
    let mut at = 0;
    for part in parts {
        data[at..at + part.len()].copy_from_slice(part);
        at += part.len();
    }
    data
}
