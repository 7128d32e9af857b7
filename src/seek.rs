//! Locating positions by any dimension
//!
//! Descent compares the target against the left child's cached counter, so
//! a lookup touches one node per level.

use crate::dim::Unit;
use crate::error::{Result, RopeError};
use crate::node::{Arena, NodeId, NodeKind};

/// Where a unit position lives in the tree
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seek {
    pub leaf: NodeId,
    /// Byte offset inside `leaf`
    pub offset: usize,
    /// Byte offset from the start of the tree
    pub byte_index: usize,
}

impl Arena {
    /// Find the leaf and byte position of the `target`-th `unit`
    ///
    /// For [`Unit::Line`] the target is a line index and the result is the
    /// first byte of that line.
    pub fn seek(&self, root: NodeId, unit: Unit, target: usize) -> Result<Seek> {
        let total = self.summary(root)?.get(unit);
        if target > total {
            return Err(RopeError::OutOfBounds {
                index: target,
                len: total,
            });
        }

        let mut node = root;
        let mut remaining = target;
        let mut byte_base = 0;
        loop {
            match &self.get(node)?.kind {
                NodeKind::Branch { children, .. } => {
                    let left = self.summary(children[0])?;
                    let count = left.get(unit);
                    // A line starts after its newline, which may end the left subtree
                    let go_left = match unit {
                        Unit::Line => remaining <= count,
                        _ => remaining < count,
                    };
                    if go_left {
                        node = children[0];
                    } else {
                        remaining -= count;
                        byte_base += left.bytes;
                        node = children[1];
                    }
                }
                NodeKind::Leaf(text) => {
                    if remaining > text.dim().get(unit) {
                        return Err(RopeError::corrupt(format!(
                            "seek for {} {} overran leaf {}",
                            unit.name(),
                            target,
                            node.index()
                        )));
                    }
                    let offset = text
                        .unit_to_byte(unit, remaining)
                        .map_err(|err| absolute(err, target))?;
                    return Ok(Seek {
                        leaf: node,
                        offset,
                        byte_index: byte_base + offset,
                    });
                }
            }
        }
    }

    /// Count the `unit`s before a byte offset
    pub fn byte_to_unit(&self, root: NodeId, unit: Unit, byte: usize) -> Result<usize> {
        let total = self.summary(root)?.bytes;
        if byte > total {
            return Err(RopeError::OutOfBounds {
                index: byte,
                len: total,
            });
        }

        let mut node = root;
        let mut remaining = byte;
        let mut count = 0;
        loop {
            match &self.get(node)?.kind {
                NodeKind::Branch { children, .. } => {
                    let left = self.summary(children[0])?;
                    if remaining < left.bytes {
                        node = children[0];
                    } else {
                        remaining -= left.bytes;
                        count += left.get(unit);
                        node = children[1];
                    }
                }
                NodeKind::Leaf(text) => {
                    let within = text
                        .byte_to_unit(unit, remaining)
                        .map_err(|err| absolute(err, byte))?;
                    return Ok(count + within);
                }
            }
        }
    }
}

/// Report a leaf-relative boundary error at the caller's position
pub(crate) fn absolute(err: RopeError, position: usize) -> RopeError {
    match err {
        RopeError::BoundaryError { .. } => RopeError::BoundaryError { offset: position },
        other => other,
    }
}
