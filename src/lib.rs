//! Balanced rope with packed multi-dimensional leaf summaries
//!
//! Text lives in AVL-balanced binary trees whose leaves carry a small-string
//! optimized payload and a packed count of bytes, chars, codepoints,
//! newlines and UTF-16 units. Positions can be addressed in any of them.

pub mod config;
pub mod cursor;
pub mod dim;
pub mod doc;
pub mod error;
pub mod history;
pub mod node;
pub mod rope;
pub mod rope_str;
pub mod seek;
pub mod tree;

// Re-export core types
pub use config::{ConfigError, RopeConfig};
pub use cursor::{CursorCallback, CursorId, CursorRange, RangeChunks};
pub use dim::{Dim, Summary, Unit};
pub use doc::{Doc, Edit};
pub use error::{Result, RopeError};
pub use history::History;
pub use node::{Arena, Direction, NodeId, NodeKind, RopeNode};
pub use rope::{Chunks, Rope};
pub use rope_str::{RopeStr, SplitMode, StrFlags, INLINE_CAP};
pub use seek::Seek;
