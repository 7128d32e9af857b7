//! Tree nodes and the arena that owns them
//!
//! Nodes reference each other through [`NodeId`] indices into an [`Arena`].
//! Ownership runs parent to child; the `parent` index is a back-reference
//! used for upward walks only.

use crate::dim::Summary;
use crate::error::{Result, RopeError};
use crate::rope_str::RopeStr;

/// Index of a node slot in an [`Arena`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
        }
    }

    #[inline]
    pub fn flip(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

#[derive(Clone, Debug)]
#[repr(C)]
pub struct RopeNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
}

#[derive(Clone, Debug)]
#[repr(C, u8)]
pub enum NodeKind {
    Leaf(RopeStr),
    Branch {
        depth: u32,
        children: [NodeId; 2],
        dim: Summary,
    },
}

impl RopeNode {
    pub fn leaf(text: RopeStr) -> Self {
        Self {
            parent: None,
            kind: NodeKind::Leaf(text),
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        match &self.kind {
            NodeKind::Leaf(_) => 0,
            NodeKind::Branch { depth, .. } => *depth,
        }
    }

    #[inline]
    pub fn summary(&self) -> Summary {
        match &self.kind {
            NodeKind::Leaf(text) => text.summary(),
            NodeKind::Branch { dim, .. } => *dim,
        }
    }

    pub fn as_leaf(&self) -> Option<&RopeStr> {
        match &self.kind {
            NodeKind::Leaf(text) => Some(text),
            NodeKind::Branch { .. } => None,
        }
    }

    pub fn children(&self) -> Option<[NodeId; 2]> {
        match &self.kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Branch { children, .. } => Some(*children),
        }
    }
}

/// Slot storage for nodes, with a free list for reuse
#[derive(Clone, Debug, Default)]
pub struct Arena {
    slots: Vec<Option<RopeNode>>,
    free: Vec<NodeId>,
    live: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: RopeNode) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(node);
            return id;
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        id
    }

    pub fn alloc_leaf(&mut self, text: RopeStr) -> NodeId {
        self.alloc(RopeNode::leaf(text))
    }

    /// Vacate a slot; children are not touched
    pub fn free(&mut self, id: NodeId) -> Option<RopeNode> {
        let node = self.slots.get_mut(id.index())?.take()?;
        self.live -= 1;
        self.free.push(id);
        Some(node)
    }

    /// Free a node and everything below it
    pub fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.free(id) {
                if let Some(children) = node.children() {
                    stack.extend(children);
                }
            }
        }
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Result<&RopeNode> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| RopeError::corrupt(format!("vacant slot {}", id.index())))
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut RopeNode> {
        match self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => Ok(node),
            None => Err(RopeError::corrupt(format!("vacant slot {}", id.index()))),
        }
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(id)?.parent)
    }

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<()> {
        self.get_mut(id)?.parent = parent;
        Ok(())
    }

    pub fn child(&self, id: NodeId, dir: Direction) -> Result<NodeId> {
        match &self.get(id)?.kind {
            NodeKind::Branch { children, .. } => Ok(children[dir.index()]),
            NodeKind::Leaf(_) => Err(RopeError::corrupt(format!(
                "leaf {} has no children",
                id.index()
            ))),
        }
    }

    pub fn children(&self, id: NodeId) -> Result<[NodeId; 2]> {
        Ok([
            self.child(id, Direction::Left)?,
            self.child(id, Direction::Right)?,
        ])
    }

    /// Which side of its parent `id` hangs on; `None` for a root
    pub fn which(&self, id: NodeId) -> Result<Option<Direction>> {
        let Some(parent) = self.parent(id)? else {
            return Ok(None);
        };
        let [left, right] = self.children(parent)?;
        if left == id {
            Ok(Some(Direction::Left))
        } else if right == id {
            Ok(Some(Direction::Right))
        } else {
            Err(RopeError::corrupt(format!(
                "node {} not listed by parent {}",
                id.index(),
                parent.index()
            )))
        }
    }

    pub fn sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        match (self.parent(id)?, self.which(id)?) {
            (Some(parent), Some(dir)) => Ok(Some(self.child(parent, dir.flip())?)),
            _ => Ok(None),
        }
    }

    #[inline]
    pub fn depth(&self, id: NodeId) -> Result<u32> {
        Ok(self.get(id)?.depth())
    }

    #[inline]
    pub fn summary(&self, id: NodeId) -> Result<Summary> {
        Ok(self.get(id)?.summary())
    }

    pub fn leaf(&self, id: NodeId) -> Result<&RopeStr> {
        self.get(id)?
            .as_leaf()
            .ok_or_else(|| RopeError::corrupt(format!("node {} is not a leaf", id.index())))
    }

    pub fn leaf_mut(&mut self, id: NodeId) -> Result<&mut RopeStr> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Leaf(text) => Ok(text),
            NodeKind::Branch { .. } => Err(RopeError::corrupt(format!(
                "node {} is not a leaf",
                id.index()
            ))),
        }
    }

    /// First (`Left`) or last (`Right`) leaf under `id`
    pub fn edge_leaf(&self, mut id: NodeId, dir: Direction) -> Result<NodeId> {
        while let NodeKind::Branch { children, .. } = &self.get(id)?.kind {
            id = children[dir.index()];
        }
        Ok(id)
    }

    /// Adjacent leaf in document order, found through parent links
    pub fn neighbour(&self, leaf: NodeId, dir: Direction) -> Result<Option<NodeId>> {
        let mut node = leaf;
        loop {
            let Some(parent) = self.parent(node)? else {
                return Ok(None);
            };
            if self.which(node)? == Some(dir.flip()) {
                let across = self.child(parent, dir)?;
                return self.edge_leaf(across, dir.flip()).map(Some);
            }
            node = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(arena: &mut Arena, text: &str) -> NodeId {
        arena.alloc_leaf(RopeStr::new(text.as_bytes()).unwrap())
    }

    fn branch(arena: &mut Arena, left: NodeId, right: NodeId) -> NodeId {
        let dim = arena
            .summary(left)
            .unwrap()
            .combine(arena.summary(right).unwrap());
        let depth = 1 + arena.depth(left).unwrap().max(arena.depth(right).unwrap());
        let id = arena.alloc(RopeNode {
            parent: None,
            kind: NodeKind::Branch {
                depth,
                children: [left, right],
                dim,
            },
        });
        arena.set_parent(left, Some(id)).unwrap();
        arena.set_parent(right, Some(id)).unwrap();
        id
    }

    #[test]
    fn test_alloc_reuses_freed_slots() {
        let mut arena = Arena::new();
        let a = leaf(&mut arena, "a");
        let b = leaf(&mut arena, "b");
        assert_eq!(arena.len(), 2);

        arena.free(a);
        assert_eq!(arena.len(), 1);
        assert!(matches!(arena.get(a), Err(RopeError::CorruptTree(_))));

        let c = leaf(&mut arena, "c");
        assert_eq!(c, a);
        assert_eq!(arena.leaf(b).unwrap().as_bytes(), b"b");
    }

    #[test]
    fn test_navigation() {
        let mut arena = Arena::new();
        let a = leaf(&mut arena, "a");
        let b = leaf(&mut arena, "b");
        let c = leaf(&mut arena, "c");
        let ab = branch(&mut arena, a, b);
        let root = branch(&mut arena, ab, c);

        assert_eq!(arena.which(a).unwrap(), Some(Direction::Left));
        assert_eq!(arena.which(c).unwrap(), Some(Direction::Right));
        assert_eq!(arena.which(root).unwrap(), None);
        assert_eq!(arena.sibling(ab).unwrap(), Some(c));

        assert_eq!(arena.edge_leaf(root, Direction::Left).unwrap(), a);
        assert_eq!(arena.edge_leaf(root, Direction::Right).unwrap(), c);

        assert_eq!(arena.neighbour(a, Direction::Right).unwrap(), Some(b));
        assert_eq!(arena.neighbour(b, Direction::Right).unwrap(), Some(c));
        assert_eq!(arena.neighbour(c, Direction::Left).unwrap(), Some(b));
        assert_eq!(arena.neighbour(c, Direction::Right).unwrap(), None);
        assert_eq!(arena.neighbour(a, Direction::Left).unwrap(), None);

        assert_eq!(arena.depth(root).unwrap(), 2);
        assert_eq!(arena.summary(root).unwrap().bytes, 3);
    }

    #[test]
    fn test_free_subtree() {
        let mut arena = Arena::new();
        let a = leaf(&mut arena, "a");
        let b = leaf(&mut arena, "b");
        let root = branch(&mut arena, a, b);
        arena.free_subtree(root);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_parent_mismatch_is_corrupt() {
        let mut arena = Arena::new();
        let a = leaf(&mut arena, "a");
        let b = leaf(&mut arena, "b");
        let stray = leaf(&mut arena, "x");
        let root = branch(&mut arena, a, b);
        arena.set_parent(stray, Some(root)).unwrap();
        assert!(matches!(arena.which(stray), Err(RopeError::CorruptTree(_))));
    }
}
