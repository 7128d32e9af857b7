//! Structural operations on the node arena
//!
//! Rotation, rebalancing, split and join. Every operation here leaves the
//! tree AVL balanced and refreshes `depth` and `dim` on each branch it
//! touches. Rotations keep the rotated node's id on top, so a root id stays
//! valid across rebalancing.

use tracing::{debug, trace};

use crate::dim::{Dim, Summary, Unit};
use crate::error::{Result, RopeError};
use crate::node::{Arena, Direction, NodeId, NodeKind, RopeNode};
use crate::rope_str::{is_boundary, RopeStr, SplitMode, INLINE_CAP};

impl Arena {
    pub(crate) fn new_branch(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let id = self.alloc(RopeNode {
            parent: None,
            kind: NodeKind::Branch {
                depth: 1,
                children: [left, right],
                dim: Summary::default(),
            },
        });
        self.set_parent(left, Some(id))?;
        self.set_parent(right, Some(id))?;
        self.update(id)?;
        Ok(id)
    }

    /// Recompute `depth` and `dim` of a branch from its children
    pub(crate) fn update(&mut self, id: NodeId) -> Result<()> {
        let [left, right] = self.children(id)?;
        let (l, r) = (self.get(left)?, self.get(right)?);
        let new_depth = 1 + l.depth().max(r.depth());
        let new_dim = l.summary().combine(r.summary());

        if let NodeKind::Branch { depth, dim, .. } = &mut self.get_mut(id)?.kind {
            *depth = new_depth;
            *dim = new_dim;
        }
        Ok(())
    }

    fn set_child(&mut self, id: NodeId, dir: Direction, child: NodeId) -> Result<()> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Branch { children, .. } => children[dir.index()] = child,
            NodeKind::Leaf(_) => {
                return Err(RopeError::corrupt(format!(
                    "cannot attach a child to leaf {}",
                    id.index()
                )))
            }
        }
        self.set_parent(child, Some(id))
    }

    /// Refresh summaries above a leaf edited in place
    pub(crate) fn update_ancestors(&mut self, id: NodeId) -> Result<()> {
        let mut node = self.parent(id)?;
        while let Some(branch) = node {
            self.update(branch)?;
            node = self.parent(branch)?;
        }
        Ok(())
    }

    pub(crate) fn root_of(&self, mut id: NodeId) -> Result<NodeId> {
        while let Some(parent) = self.parent(id)? {
            id = parent;
        }
        Ok(id)
    }

    fn balance(&self, id: NodeId) -> Result<i64> {
        let [left, right] = self.children(id)?;
        Ok(self.depth(right)? as i64 - self.depth(left)? as i64)
    }

    /// Rotate the subtree at `id` toward `dir`
    ///
    /// The child on the opposite side rises, but `id` keeps the top slot:
    /// the risen child's id is reused for the node that sinks.
    pub(crate) fn rotate(&mut self, id: NodeId, dir: Direction) -> Result<()> {
        let rising = dir.flip();
        let pivot = self.child(id, rising)?;
        let outer = self.child(id, dir)?;
        let inner = self.child(pivot, dir)?;
        let far = self.child(pivot, rising)?;

        self.set_child(pivot, dir, outer)?;
        self.set_child(pivot, rising, inner)?;
        self.update(pivot)?;

        self.set_child(id, dir, pivot)?;
        self.set_child(id, rising, far)?;
        self.update(id)?;

        trace!(node = id.index(), ?dir, "rotated");
        Ok(())
    }

    /// Restore the AVL condition at `id`, assuming its subtrees are balanced
    pub(crate) fn rebalance(&mut self, id: NodeId) -> Result<()> {
        if self.get(id)?.is_leaf() {
            return Ok(());
        }
        self.update(id)?;

        let balance = self.balance(id)?;
        if balance.abs() <= 1 {
            return Ok(());
        }

        let heavy = if balance > 0 {
            Direction::Right
        } else {
            Direction::Left
        };
        let child = self.child(id, heavy)?;
        let inner = self.child(child, heavy.flip())?;
        let outer = self.child(child, heavy)?;
        if self.depth(inner)? > self.depth(outer)? {
            self.rotate(child, heavy)?;
        }
        self.rotate(id, heavy.flip())
    }

    /// Rebalance from `id` up to the root
    pub(crate) fn balance_up(&mut self, id: NodeId) -> Result<()> {
        let mut node = Some(id);
        while let Some(current) = node {
            self.rebalance(current)?;
            node = self.parent(current)?;
        }
        Ok(())
    }

    /// Split a leaf in place at a byte offset, turning it into a branch
    ///
    /// Returns the leaves on either side of the cut. At a leaf edge nothing
    /// is created and the existing neighbour is reported instead.
    pub fn split_leaf(
        &mut self,
        leaf: NodeId,
        offset: usize,
        mode: SplitMode,
    ) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let text = self.leaf(leaf)?;
        text.check_offset(offset, mode)?;
        let len = text.len();

        if offset == 0 {
            return Ok((self.neighbour(leaf, Direction::Left)?, Some(leaf)));
        }
        if offset == len {
            return Ok((Some(leaf), self.neighbour(leaf, Direction::Right)?));
        }

        let tail = self.leaf_mut(leaf)?.split_off(offset, mode)?;
        let head = std::mem::take(self.leaf_mut(leaf)?);
        let left = self.alloc_leaf(head);
        let right = self.alloc_leaf(tail);

        self.get_mut(leaf)?.kind = NodeKind::Branch {
            depth: 1,
            children: [left, right],
            dim: Summary::default(),
        };
        self.set_parent(left, Some(leaf))?;
        self.set_parent(right, Some(leaf))?;
        self.balance_up(leaf)?;

        debug!(node = leaf.index(), offset, "split leaf");
        Ok((Some(left), Some(right)))
    }

    /// Concatenate two detached trees; returns the new root
    pub fn join(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        if self.summary(left)?.bytes == 0 {
            self.free_subtree(left);
            return Ok(right);
        }
        if self.summary(right)?.bytes == 0 {
            self.free_subtree(right);
            return Ok(left);
        }

        let Some(right) = self.fuse_seam(left, right)? else {
            return Ok(left);
        };

        let (dl, dr) = (self.depth(left)?, self.depth(right)?);
        if dl > dr + 1 {
            let spine = self.descend_spine(left, Direction::Right, dr + 1)?;
            let parent = self
                .parent(spine)?
                .ok_or_else(|| RopeError::corrupt("join spine lost its parent"))?;
            let branch = self.new_branch(spine, right)?;
            self.set_child(parent, Direction::Right, branch)?;
            self.balance_up(parent)?;
            Ok(left)
        } else if dr > dl + 1 {
            let spine = self.descend_spine(right, Direction::Left, dl + 1)?;
            let parent = self
                .parent(spine)?
                .ok_or_else(|| RopeError::corrupt("join spine lost its parent"))?;
            let branch = self.new_branch(left, spine)?;
            self.set_child(parent, Direction::Left, branch)?;
            self.balance_up(parent)?;
            Ok(right)
        } else {
            self.new_branch(left, right)
        }
    }

    pub(crate) fn join_opt(
        &mut self,
        left: Option<NodeId>,
        right: Option<NodeId>,
    ) -> Result<Option<NodeId>> {
        match (left, right) {
            (Some(left), Some(right)) => self.join(left, right).map(Some),
            (left, None) => Ok(left),
            (None, right) => Ok(right),
        }
    }

    fn descend_spine(&self, mut id: NodeId, dir: Direction, max_depth: u32) -> Result<NodeId> {
        while self.depth(id)? > max_depth {
            id = self.child(id, dir)?;
        }
        Ok(id)
    }

    /// Merge the two leaves meeting at the seam when they are small enough
    ///
    /// Returns what remains of `right`, or `None` if it was absorbed.
    fn fuse_seam(&mut self, left: NodeId, right: NodeId) -> Result<Option<NodeId>> {
        let a = self.edge_leaf(left, Direction::Right)?;
        let b = self.edge_leaf(right, Direction::Left)?;
        let (ta, tb) = (self.leaf(a)?, self.leaf(b)?);
        if ta.tags() != tb.tags() || ta.len() + tb.len() > INLINE_CAP {
            return Ok(Some(right));
        }

        let at = ta.len();
        let moved = tb.clone();
        self.leaf_mut(a)?.insert_raw(at, moved.as_bytes())?;
        self.update_ancestors(a)?;
        trace!(left = a.index(), right = b.index(), "fused seam leaves");
        self.remove_leaf(b)
    }

    /// Unlink and free a leaf; its sibling takes the parent's place
    ///
    /// Returns the root of what remains.
    pub(crate) fn remove_leaf(&mut self, leaf: NodeId) -> Result<Option<NodeId>> {
        let Some(parent) = self.parent(leaf)? else {
            self.free(leaf);
            return Ok(None);
        };
        let sibling = self
            .sibling(leaf)?
            .ok_or_else(|| RopeError::corrupt("leaf with a parent has no sibling"))?;
        let grand = self.parent(parent)?;
        let side = self.which(parent)?;

        self.free(leaf);
        self.free(parent);

        match (grand, side) {
            (Some(grand), Some(dir)) => {
                self.set_child(grand, dir, sibling)?;
                self.balance_up(grand)?;
                self.root_of(grand).map(Some)
            }
            _ => {
                self.set_parent(sibling, None)?;
                Ok(Some(sibling))
            }
        }
    }

    /// Build a balanced subtree over leaves in order; empty strings are dropped
    pub fn build_balanced(&mut self, leaves: Vec<RopeStr>) -> Result<Option<NodeId>> {
        let ids: Vec<NodeId> = leaves
            .into_iter()
            .filter(|text| !text.is_empty())
            .map(|text| self.alloc_leaf(text))
            .collect();
        if ids.is_empty() {
            return Ok(None);
        }
        self.build_from(&ids).map(Some)
    }

    fn build_from(&mut self, ids: &[NodeId]) -> Result<NodeId> {
        match ids {
            [] => Err(RopeError::corrupt("balanced build over no leaves")),
            [only] => Ok(*only),
            _ => {
                let (left, right) = ids.split_at(ids.len() / 2);
                let left = self.build_from(left)?;
                let right = self.build_from(right)?;
                self.new_branch(left, right)
            }
        }
    }

    /// Split a detached tree at a byte offset into two balanced trees
    pub fn split_tree(
        &mut self,
        root: NodeId,
        at: usize,
        mode: SplitMode,
    ) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let total = self.summary(root)?.bytes;
        if at > total {
            return Err(RopeError::OutOfBounds {
                index: at,
                len: total,
            });
        }

        // Validate the cut before anything is detached
        let seek = self.seek(root, Unit::Byte, at)?;
        let leaf = self.leaf(seek.leaf)?;
        if mode == SplitMode::Char && !is_boundary(leaf.as_bytes(), seek.offset) {
            return Err(RopeError::BoundaryError { offset: at });
        }

        let halves = self.split_detached(root, at, mode)?;
        debug!(at, "split tree");
        Ok(halves)
    }

    fn split_detached(
        &mut self,
        id: NodeId,
        at: usize,
        mode: SplitMode,
    ) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let Some([left, right]) = self.get(id)?.children() else {
            let len = self.leaf(id)?.len();
            if at == 0 {
                return Ok((None, Some(id)));
            }
            if at >= len {
                return Ok((Some(id), None));
            }
            let tail = self.leaf_mut(id)?.split_off(at, mode)?;
            let right = self.alloc_leaf(tail);
            return Ok((Some(id), Some(right)));
        };

        let left_bytes = self.summary(left)?.bytes;
        self.free(id);
        self.set_parent(left, None)?;
        self.set_parent(right, None)?;

        if at == left_bytes {
            Ok((Some(left), Some(right)))
        } else if at < left_bytes {
            let (head, rest) = self.split_detached(left, at, mode)?;
            Ok((head, self.join_opt(rest, Some(right))?))
        } else {
            let (rest, tail) = self.split_detached(right, at - left_bytes, mode)?;
            Ok((self.join_opt(Some(left), rest)?, tail))
        }
    }

    /// Collapse every subtree that fits one leaf of uniform tags
    ///
    /// Returns the id now rooting the tree.
    pub fn compact(&mut self, root: NodeId, limit: usize) -> Result<NodeId> {
        let (root, _) = self.compact_node(root, limit)?;
        self.set_parent(root, None)?;
        Ok(root)
    }

    fn compact_node(&mut self, id: NodeId, limit: usize) -> Result<(NodeId, bool)> {
        let node = self.get(id)?;
        let (Some([left, right]), bytes) = (node.children(), node.summary().bytes) else {
            return Ok((id, false));
        };

        if bytes <= limit {
            if let Some(tags) = self.uniform_tags(id)? {
                self.collapse(id, tags, bytes)?;
                return Ok((id, true));
            }
        }

        let (left, left_changed) = self.compact_node(left, limit)?;
        let (right, right_changed) = self.compact_node(right, limit)?;
        if !left_changed && !right_changed {
            return Ok((id, false));
        }

        // Collapsed children can leave any height difference; rejoin them
        self.free(id);
        self.set_parent(left, None)?;
        self.set_parent(right, None)?;
        Ok((self.join(left, right)?, true))
    }

    fn uniform_tags(&self, id: NodeId) -> Result<Option<u64>> {
        let mut tags = None;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match &self.get(id)?.kind {
                NodeKind::Branch { children, .. } => stack.extend(children),
                NodeKind::Leaf(text) => match tags {
                    None => tags = Some(text.tags()),
                    Some(seen) if seen != text.tags() => return Ok(None),
                    Some(_) => {}
                },
            }
        }
        Ok(tags)
    }

    fn collapse(&mut self, id: NodeId, tags: u64, bytes: usize) -> Result<()> {
        let mut buf = Vec::with_capacity(bytes);
        self.collect_bytes(id, &mut buf)?;
        let text = RopeStr::from_raw(&buf, tags)?;

        let [left, right] = self.children(id)?;
        self.free_subtree(left);
        self.free_subtree(right);
        self.get_mut(id)?.kind = NodeKind::Leaf(text);
        trace!(node = id.index(), bytes, "collapsed subtree");
        Ok(())
    }

    /// Append the text under `id` to `out`, in order
    pub(crate) fn collect_bytes(&self, id: NodeId, out: &mut Vec<u8>) -> Result<()> {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match &self.get(id)?.kind {
                NodeKind::Leaf(text) => out.extend_from_slice(text.as_bytes()),
                NodeKind::Branch { children, .. } => {
                    stack.push(children[1]);
                    stack.push(children[0]);
                }
            }
        }
        Ok(())
    }

    /// Copy a subtree out of another arena; heap text stays shared
    pub fn import(&mut self, other: &Arena, id: NodeId) -> Result<NodeId> {
        match other.get(id)?.children() {
            None => Ok(self.alloc_leaf(other.leaf(id)?.clone())),
            Some([left, right]) => {
                let left = self.import(other, left)?;
                let right = self.import(other, right)?;
                self.new_branch(left, right)
            }
        }
    }

    /// Recursively validate links, summaries, depths and balance
    ///
    /// Returns the subtree's summary and depth.
    pub fn check_subtree(&self, id: NodeId, parent: Option<NodeId>) -> Result<(Summary, u32)> {
        let node = self.get(id)?;
        if node.parent != parent {
            return Err(RopeError::corrupt(format!(
                "node {} points at parent {:?}, expected {:?}",
                id.index(),
                node.parent,
                parent
            )));
        }

        match &node.kind {
            NodeKind::Leaf(text) => {
                if text.is_empty() && parent.is_some() {
                    return Err(RopeError::corrupt(format!("empty leaf {}", id.index())));
                }
                if text.dim() != Dim::scan(text.as_bytes())? {
                    return Err(RopeError::corrupt(format!("stale dim on leaf {}", id.index())));
                }
                if text.is_inline() != (text.len() <= INLINE_CAP) {
                    return Err(RopeError::corrupt(format!(
                        "leaf {} has wrong storage for {} bytes",
                        id.index(),
                        text.len()
                    )));
                }
                Ok((text.summary(), 0))
            }
            NodeKind::Branch {
                depth,
                children,
                dim,
            } => {
                let (depth, children, dim) = (*depth, *children, *dim);
                let (left, left_depth) = self.check_subtree(children[0], Some(id))?;
                let (right, right_depth) = self.check_subtree(children[1], Some(id))?;

                if left.combine(right) != dim {
                    return Err(RopeError::corrupt(format!(
                        "branch {} caches a stale dim",
                        id.index()
                    )));
                }
                if depth != 1 + left_depth.max(right_depth) {
                    return Err(RopeError::corrupt(format!(
                        "branch {} has depth {depth}, children {left_depth}/{right_depth}",
                        id.index()
                    )));
                }
                if left_depth.abs_diff(right_depth) > 1 {
                    return Err(RopeError::corrupt(format!(
                        "branch {} is unbalanced ({left_depth}/{right_depth})",
                        id.index()
                    )));
                }
                Ok((dim, depth))
            }
        }
    }
}

/// Cut valid text into leaves of at most `chunk_size` bytes at codepoint boundaries
pub(crate) fn chunk_text(bytes: &[u8], chunk_size: usize, tags: u64) -> Result<Vec<RopeStr>> {
    let mut chunks = Vec::with_capacity(bytes.len() / chunk_size + 1);
    let mut pos = 0;
    while pos < bytes.len() {
        let limit = (pos + chunk_size).min(bytes.len());
        let mut end = limit;
        while end > pos && !is_boundary(bytes, end) {
            end -= 1;
        }
        if end == pos {
            end = limit;
        }
        chunks.push(RopeStr::from_raw(&bytes[pos..end], tags)?);
        pos = end;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(arena: &mut Arena, parts: &[&str]) -> NodeId {
        let leaves = parts
            .iter()
            .map(|part| RopeStr::new(part.as_bytes()).unwrap())
            .collect();
        arena.build_balanced(leaves).unwrap().unwrap()
    }

    fn text(arena: &Arena, root: NodeId) -> String {
        let mut out = Vec::new();
        arena.collect_bytes(root, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    const WORDS: [&str; 8] = [
        "alpha alpha alpha ",
        "bravo bravo bravo ",
        "charlie charlie ch",
        "delta delta delta ",
        "echo echo echo ech",
        "foxtrot foxtrot fo",
        "golf golf golf gol",
        "hotel hotel hotel ",
    ];

    #[test]
    fn test_build_balanced() {
        let mut arena = Arena::new();
        let root = build(&mut arena, &WORDS[..5]);
        let (sum, depth) = arena.check_subtree(root, None).unwrap();
        assert_eq!(depth, 3);
        assert_eq!(sum.bytes, 5 * 18);
        assert_eq!(text(&arena, root), WORDS[..5].concat());
    }

    #[test]
    fn test_rotate_keeps_order_and_top_id() {
        let mut arena = Arena::new();
        let root = build(&mut arena, &WORDS[..4]);
        let before = text(&arena, root);

        arena.rotate(root, Direction::Left).unwrap();
        assert_eq!(arena.parent(root).unwrap(), None);
        assert_eq!(text(&arena, root), before);
        assert_eq!(arena.summary(root).unwrap().bytes, 4 * 18);

        arena.rotate(root, Direction::Right).unwrap();
        arena.check_subtree(root, None).unwrap();
    }

    #[test]
    fn test_join_uneven_heights() {
        let mut arena = Arena::new();
        let tall = build(&mut arena, &WORDS);
        let short = build(&mut arena, &["a leaf that is long"]);

        let root = arena.join(tall, short).unwrap();
        arena.check_subtree(root, None).unwrap();
        assert!(text(&arena, root).ends_with("a leaf that is long"));

        let short = build(&mut arena, &["another long leaf"]);
        let root = arena.join(short, root).unwrap();
        arena.check_subtree(root, None).unwrap();
        assert!(text(&arena, root).starts_with("another long leaf"));
    }

    #[test]
    fn test_join_fuses_small_leaves() {
        let mut arena = Arena::new();
        let left = build(&mut arena, &["abc"]);
        let right = build(&mut arena, &["def"]);
        let root = arena.join(left, right).unwrap();
        assert!(arena.get(root).unwrap().is_leaf());
        assert_eq!(text(&arena, root), "abcdef");
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_join_keeps_differently_tagged_leaves() {
        let mut arena = Arena::new();
        let left = arena.alloc_leaf(RopeStr::new(b"abc").unwrap().with_tags(1));
        let right = arena.alloc_leaf(RopeStr::new(b"def").unwrap().with_tags(2));
        let root = arena.join(left, right).unwrap();
        assert!(!arena.get(root).unwrap().is_leaf());
        assert_eq!(text(&arena, root), "abcdef");
    }

    #[test]
    fn test_split_leaf_in_place() {
        let mut arena = Arena::new();
        let root = build(&mut arena, &["héllo\nworld"]);
        let (left, right) = arena.split_leaf(root, 7, SplitMode::Char).unwrap();
        let (left, right) = (left.unwrap(), right.unwrap());

        assert_eq!(arena.leaf(left).unwrap().as_bytes(), "héllo\n".as_bytes());
        assert_eq!(arena.leaf(left).unwrap().dim().newlines(), 1);
        assert_eq!(arena.leaf(right).unwrap().as_bytes(), b"world");
        assert_eq!(arena.leaf(right).unwrap().dim().newlines(), 0);

        let (sum, depth) = arena.check_subtree(root, None).unwrap();
        assert_eq!(depth, 1);
        assert_eq!(sum, Summary::scan("héllo\nworld".as_bytes()));

        assert_eq!(
            arena.split_leaf(left, 2, SplitMode::Char),
            Err(RopeError::BoundaryError { offset: 2 })
        );
    }

    #[test]
    fn test_split_leaf_at_edge_reports_neighbours() {
        let mut arena = Arena::new();
        let root = build(&mut arena, &WORDS[..2]);
        let [a, b] = arena.children(root).unwrap();

        assert_eq!(
            arena.split_leaf(b, 0, SplitMode::Char).unwrap(),
            (Some(a), Some(b))
        );
        assert_eq!(
            arena.split_leaf(b, 18, SplitMode::Char).unwrap(),
            (Some(b), None)
        );
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_split_tree_everywhere() {
        let joined = WORDS.concat();
        for at in (0..=joined.len()).step_by(7) {
            let mut arena = Arena::new();
            let root = build(&mut arena, &WORDS);
            let (left, right) = arena.split_tree(root, at, SplitMode::Char).unwrap();

            let left_text = left.map_or(String::new(), |id| text(&arena, id));
            let right_text = right.map_or(String::new(), |id| text(&arena, id));
            assert_eq!(left_text, joined[..at]);
            assert_eq!(right_text, joined[at..]);
            if let Some(id) = left {
                arena.check_subtree(id, None).unwrap();
            }
            if let Some(id) = right {
                arena.check_subtree(id, None).unwrap();
            }
        }
    }

    #[test]
    fn test_split_tree_rejects_mid_char() {
        let mut arena = Arena::new();
        let root = build(&mut arena, &["héllo"]);
        assert_eq!(
            arena.split_tree(root, 2, SplitMode::Char),
            Err(RopeError::BoundaryError { offset: 2 })
        );
        arena.check_subtree(root, None).unwrap();
    }

    #[test]
    fn test_remove_leaf() {
        let mut arena = Arena::new();
        let root = build(&mut arena, &WORDS[..3]);
        let first = arena.edge_leaf(root, Direction::Left).unwrap();
        let root = arena.remove_leaf(first).unwrap().unwrap();
        arena.check_subtree(root, None).unwrap();
        assert_eq!(text(&arena, root), WORDS[1..3].concat());
    }

    #[test]
    fn test_compact_collapses_fragments() {
        let mut arena = Arena::new();
        let root = build(&mut arena, &WORDS);
        let root = arena.compact(root, 1024).unwrap();
        assert!(arena.get(root).unwrap().is_leaf());
        assert_eq!(text(&arena, root), WORDS.concat());
        assert_eq!(arena.len(), 1);

        let mut arena = Arena::new();
        let root = build(&mut arena, &WORDS);
        let root = arena.compact(root, 40).unwrap();
        arena.check_subtree(root, None).unwrap();
        assert_eq!(text(&arena, root), WORDS.concat());
        assert!(arena.len() < 15);
    }

    #[test]
    fn test_import_shares_heap_text() {
        let mut source = Arena::new();
        let root = build(&mut source, &WORDS[..3]);
        let mut target = Arena::new();
        let copy = target.import(&source, root).unwrap();
        target.check_subtree(copy, None).unwrap();
        assert_eq!(text(&target, copy), text(&source, root));

        let leaf = target.edge_leaf(copy, Direction::Left).unwrap();
        assert!(target.leaf(leaf).unwrap().is_shared());
    }

    #[test]
    fn test_chunk_text_respects_codepoints() {
        let text = "ééééé".repeat(10);
        let chunks = chunk_text(text.as_bytes(), 17, 0).unwrap();
        assert!(chunks.iter().all(|c| c.len() <= 17 && c.len() % 2 == 0));
        let rebuilt: Vec<u8> = chunks.iter().flat_map(|c| c.as_bytes().to_vec()).collect();
        assert_eq!(rebuilt, text.as_bytes());
    }
}
