//! Index-addressed node storage for trees decoded from a blob.
//!
//! Loading knows the node count up front, so all nodes live in one vector
//! and refer to their children and triangle ranges by index. Dropping the
//! tree frees the whole arena at once.

use std::fmt;

use crate::Plane3D;

/// Index of a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct ArenaNode {
    plane: Plane3D,
    partitioned: bool,
    first: u32,
    count: u32,
    front: Option<NodeId>,
    back: Option<NodeId>,
}

/// Node allocator for loaded trees.
///
/// Nodes reference their triangle subset as a range of a shared index
/// buffer rather than owning a vector each.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<ArenaNode>,
    indices: Vec<u32>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocates room for `nodes` nodes and `indices` triangle indices.
    pub fn with_capacity(nodes: usize, indices: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            indices: Vec::with_capacity(indices),
        }
    }

    /// Appends a childless node and returns its id.
    pub fn push(&mut self, plane: Plane3D, partitioned: bool, triangles: &[u32]) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let first = self.indices.len() as u32;
        self.indices.extend_from_slice(triangles);
        self.nodes.push(ArenaNode {
            plane,
            partitioned,
            first,
            count: triangles.len() as u32,
            front: None,
            back: None,
        });
        id
    }

    pub fn set_front(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].front = Some(child);
    }

    pub fn set_back(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].back = Some(child);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The first node pushed, if any.
    pub fn root(&self) -> Option<ArenaRef<'_>> {
        self.get(NodeId(0))
    }

    pub fn get(&self, id: NodeId) -> Option<ArenaRef<'_>> {
        (id.index() < self.nodes.len()).then_some(ArenaRef { arena: self, id })
    }

    /// Handle to a node this arena returned from [`NodeArena::push`].
    pub(crate) fn node(&self, id: NodeId) -> ArenaRef<'_> {
        ArenaRef { arena: self, id }
    }
}

/// A borrowed handle to one node of a [`NodeArena`].
#[derive(Clone, Copy)]
pub struct ArenaRef<'a> {
    arena: &'a NodeArena,
    id: NodeId,
}

impl<'a> ArenaRef<'a> {
    #[inline]
    fn node(&self) -> &'a ArenaNode {
        &self.arena.nodes[self.id.index()]
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn plane(&self) -> &'a Plane3D {
        &self.node().plane
    }

    #[inline]
    pub fn is_partitioned(&self) -> bool {
        self.node().partitioned
    }

    pub fn triangle_indices(&self) -> &'a [u32] {
        let node = self.node();
        let start = node.first as usize;
        &self.arena.indices[start..start + node.count as usize]
    }

    pub fn front(&self) -> Option<ArenaRef<'a>> {
        self.node().front.map(|id| ArenaRef {
            arena: self.arena,
            id,
        })
    }

    pub fn back(&self) -> Option<ArenaRef<'a>> {
        self.node().back.map(|id| ArenaRef {
            arena: self.arena,
            id,
        })
    }
}

impl fmt::Debug for ArenaRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaRef")
            .field("id", &self.id)
            .field("partitioned", &self.is_partitioned())
            .field("triangles", &self.triangle_indices().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn push_and_link() {
        let mut arena = NodeArena::with_capacity(3, 4);
        let plane = Plane3D::new(Vector3::new(0.0, 1.0, 0.0), 0.0);

        let root = arena.push(plane, true, &[0]);
        let front = arena.push(Plane3D::unpartitioned(), false, &[1, 2]);
        let back = arena.push(Plane3D::unpartitioned(), false, &[3]);
        arena.set_front(root, front);
        arena.set_back(root, back);

        assert_eq!(arena.len(), 3);
        let r = arena.root().unwrap();
        assert!(r.is_partitioned());
        assert_eq!(r.triangle_indices(), &[0]);
        assert_eq!(r.front().unwrap().triangle_indices(), &[1, 2]);
        assert_eq!(r.back().unwrap().triangle_indices(), &[3]);
        assert!(r.front().unwrap().front().is_none());
    }

    #[test]
    fn empty_arena_has_no_root() {
        let arena = NodeArena::new();
        assert!(arena.is_empty());
        assert!(arena.root().is_none());
    }
}
