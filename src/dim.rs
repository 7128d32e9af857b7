//! Packed dimension vectors and the wide per-subtree summary
//!
//! Every leaf carries a [`Dim`]: six counters packed into one `u64` so
//! external tooling can read a node's size with plain shifts and masks.
//!
//! | bits  | field          |
//! |-------|----------------|
//! | 0-11  | bytes          |
//! | 12-23 | chars          |
//! | 24-35 | codepoints     |
//! | 36-47 | newlines       |
//! | 48-59 | utf16 units    |
//! | 60-64 | last char size |
//!
//! Branches aggregate whole subtrees and quickly outgrow 12 bits, so they
//! cache a [`Summary`] with the same fields and combination rules.

use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Result, RopeError};

/// Width of each counter field
pub const FIELD_BITS: u32 = 12;

/// Largest value a counter field can hold (4095)
pub const FIELD_MAX: usize = (1 << FIELD_BITS) - 1;

const FIELD_MASK: u64 = FIELD_MAX as u64;

/// Bit offset of the last-char-size field
pub const LAST_CHAR_SHIFT: u32 = 60;

/// Declared width of the last-char-size field
pub const LAST_CHAR_BITS: u32 = 5;

const LAST_CHAR_MASK: u64 = (1 << LAST_CHAR_BITS) - 1;

/// Largest last-char-size the word can store; bit 64 does not exist
pub const LAST_CHAR_MAX: usize = (u64::MAX >> LAST_CHAR_SHIFT) as usize;

const SHIFTS: [u32; 5] = [0, 12, 24, 36, 48];

const FIELD_NAMES: [&str; 5] = ["bytes", "chars", "codepoints", "newlines", "utf16_units"];

const _: () = assert!(SHIFTS[4] + FIELD_BITS == LAST_CHAR_SHIFT);
const _: () = assert!(LAST_CHAR_MAX == 15);

/// A dimension to measure offsets in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    Byte,
    /// Extended grapheme clusters
    Char,
    Codepoint,
    /// Newline count; as an index, the line number
    Line,
    Utf16,
}

impl Unit {
    pub const ALL: [Unit; 5] = [
        Unit::Byte,
        Unit::Char,
        Unit::Codepoint,
        Unit::Line,
        Unit::Utf16,
    ];

    #[inline]
    fn slot(self) -> usize {
        match self {
            Unit::Byte => 0,
            Unit::Char => 1,
            Unit::Codepoint => 2,
            Unit::Line => 3,
            Unit::Utf16 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        FIELD_NAMES[self.slot()]
    }
}

/// Wide aggregate of the six dimensions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Summary {
    pub bytes: usize,
    pub chars: usize,
    pub codepoints: usize,
    pub newlines: usize,
    pub utf16_units: usize,
    /// Byte length of the final grapheme cluster
    pub last_char_size: usize,
}

impl Summary {
    /// Measure a byte run in one pass
    ///
    /// Bytes left behind by a byte-level split are weighed so that both
    /// halves of a character add up to the whole: a lead byte counts as the
    /// full codepoint and continuation bytes count as nothing.
    pub fn scan(bytes: &[u8]) -> Self {
        let mut sum = Summary {
            bytes: bytes.len(),
            newlines: bytecount::count(bytes, b'\n'),
            ..Summary::default()
        };

        let mut base = 0;
        let mut last_start = 0;
        for segment in Segments::new(bytes) {
            match segment {
                Segment::Text(text) => {
                    for (i, _) in text.grapheme_indices(true) {
                        sum.chars += 1;
                        last_start = base + i;
                    }
                    sum.codepoints += bytecount::num_chars(text.as_bytes());
                    sum.utf16_units += text.chars().map(char::len_utf16).sum::<usize>();
                    base += text.len();
                }
                Segment::Invalid(byte) => {
                    let weight = stray_weight(byte, Unit::Codepoint);
                    if weight > 0 {
                        last_start = base;
                    }
                    sum.chars += weight;
                    sum.codepoints += weight;
                    sum.utf16_units += stray_weight(byte, Unit::Utf16);
                    base += 1;
                }
            }
        }

        sum.last_char_size = bytes.len() - last_start;
        sum
    }

    /// Aggregate two adjacent runs; `last_char_size` comes from `rhs` unless it is empty
    #[inline]
    pub fn combine(self, rhs: Summary) -> Summary {
        Summary {
            bytes: self.bytes + rhs.bytes,
            chars: self.chars + rhs.chars,
            codepoints: self.codepoints + rhs.codepoints,
            newlines: self.newlines + rhs.newlines,
            utf16_units: self.utf16_units + rhs.utf16_units,
            last_char_size: if rhs.bytes == 0 {
                self.last_char_size
            } else {
                rhs.last_char_size
            },
        }
    }

    #[inline]
    pub fn get(&self, unit: Unit) -> usize {
        self.fields()[unit.slot()]
    }

    #[inline]
    fn fields(&self) -> [usize; 5] {
        [
            self.bytes,
            self.chars,
            self.codepoints,
            self.newlines,
            self.utf16_units,
        ]
    }
}

/// Six counters packed into one `u64`
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Dim(u64);

impl Dim {
    pub const EMPTY: Dim = Dim(0);

    pub fn encode(
        bytes: usize,
        chars: usize,
        codepoints: usize,
        newlines: usize,
        utf16_units: usize,
        last_char_size: usize,
    ) -> Result<Dim> {
        let values = [bytes, chars, codepoints, newlines, utf16_units];
        let mut bits = 0u64;
        for (slot, value) in values.into_iter().enumerate() {
            if value > FIELD_MAX {
                return Err(RopeError::OutOfRange {
                    field: FIELD_NAMES[slot],
                    value,
                    max: FIELD_MAX,
                });
            }
            bits |= (value as u64) << SHIFTS[slot];
        }

        if last_char_size > LAST_CHAR_MAX {
            return Err(RopeError::OutOfRange {
                field: "last_char_size",
                value: last_char_size,
                max: LAST_CHAR_MAX,
            });
        }
        bits |= (last_char_size as u64) << LAST_CHAR_SHIFT;

        Ok(Dim(bits))
    }

    /// Pack a summary; a last char longer than the field saturates at
    /// [`LAST_CHAR_MAX`] and readers rescan the text for the exact size
    pub fn from_summary(sum: &Summary) -> Result<Dim> {
        Dim::encode(
            sum.bytes,
            sum.chars,
            sum.codepoints,
            sum.newlines,
            sum.utf16_units,
            sum.last_char_size.min(LAST_CHAR_MAX),
        )
    }

    /// True when the packed last-char size may be smaller than the real one
    #[inline]
    pub fn is_saturated(self) -> bool {
        self.last_char_size() == LAST_CHAR_MAX
    }

    /// Scan text and pack the result
    pub fn scan(bytes: &[u8]) -> Result<Dim> {
        Dim::from_summary(&Summary::scan(bytes))
    }

    pub fn decode(self) -> Summary {
        Summary {
            bytes: self.field(0),
            chars: self.field(1),
            codepoints: self.field(2),
            newlines: self.field(3),
            utf16_units: self.field(4),
            last_char_size: self.last_char_size(),
        }
    }

    /// Field-wise sum; `last_char_size` is taken from `other` unless it is empty
    pub fn combine(self, other: Dim) -> Result<Dim> {
        let mut bits = 0u64;
        for slot in 0..SHIFTS.len() {
            let sum = self.field(slot) + other.field(slot);
            if sum > FIELD_MAX {
                return Err(RopeError::Overflow {
                    field: FIELD_NAMES[slot],
                });
            }
            bits |= (sum as u64) << SHIFTS[slot];
        }
        let last = if other.bytes() == 0 { self } else { other };
        bits |= (last.last_char_size() as u64) << LAST_CHAR_SHIFT;
        Ok(Dim(bits))
    }

    #[inline]
    pub fn get(self, unit: Unit) -> usize {
        self.field(unit.slot())
    }

    #[inline]
    pub fn bytes(self) -> usize {
        self.field(0)
    }

    #[inline]
    pub fn chars(self) -> usize {
        self.field(1)
    }

    #[inline]
    pub fn codepoints(self) -> usize {
        self.field(2)
    }

    #[inline]
    pub fn newlines(self) -> usize {
        self.field(3)
    }

    #[inline]
    pub fn utf16_units(self) -> usize {
        self.field(4)
    }

    #[inline]
    pub fn last_char_size(self) -> usize {
        ((self.0 >> LAST_CHAR_SHIFT) & LAST_CHAR_MASK) as usize
    }

    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u64) -> Dim {
        Dim(bits)
    }

    #[inline]
    fn field(self, slot: usize) -> usize {
        ((self.0 >> SHIFTS[slot]) & FIELD_MASK) as usize
    }
}

impl fmt::Debug for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dim")
            .field("bytes", &self.bytes())
            .field("chars", &self.chars())
            .field("codepoints", &self.codepoints())
            .field("newlines", &self.newlines())
            .field("utf16_units", &self.utf16_units())
            .field("last_char_size", &self.last_char_size())
            .finish()
    }
}

// === Lenient UTF-8 segmentation ===

pub(crate) enum Segment<'a> {
    Text(&'a str),
    /// A single byte that does not start a valid sequence
    Invalid(u8),
}

/// Weight of a stray byte in `unit`
///
/// A lead byte carries its whole codepoint (two UTF-16 units for a
/// four-byte lead); continuation bytes weigh nothing.
#[inline]
pub(crate) fn stray_weight(byte: u8, unit: Unit) -> usize {
    match unit {
        Unit::Byte => 1,
        _ if byte & 0xC0 == 0x80 => 0,
        Unit::Utf16 if byte >= 0xF0 => 2,
        _ => 1,
    }
}

/// Splits bytes into maximal valid runs and single invalid bytes
pub(crate) struct Segments<'a> {
    rest: &'a [u8],
}

impl<'a> Segments<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        if self.rest.is_empty() {
            return None;
        }

        match simdutf8::compat::from_utf8(self.rest) {
            Ok(text) => {
                self.rest = &[];
                Some(Segment::Text(text))
            }
            Err(err) if err.valid_up_to() > 0 => {
                let (head, tail) = self.rest.split_at(err.valid_up_to());
                self.rest = tail;
                // SAFETY: simdutf8 validated every byte before valid_up_to
                Some(Segment::Text(unsafe { std::str::from_utf8_unchecked(head) }))
            }
            Err(_) => {
                let byte = self.rest[0];
                self.rest = &self.rest[1..];
                Some(Segment::Invalid(byte))
            }
        }
    }
}
