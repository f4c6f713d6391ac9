//! Read-only access to tree nodes, independent of how they are stored.
//!
//! Constructed trees own boxed [`BspNode`]s while loaded trees live in a
//! [`NodeArena`]. Queries, the writer and the debugging helpers only need
//! to read nodes, so they are written once against [`NodeView`].

use crate::Plane3D;

use super::arena::ArenaRef;
use super::node::BspNode;

/// A cheap, copyable handle to a node borrowed for `'a`.
pub trait NodeView<'a>: Copy {
    fn plane(self) -> Plane3D;
    fn is_partitioned(self) -> bool;
    fn triangle_indices(self) -> &'a [u32];
    fn front(self) -> Option<Self>;
    fn back(self) -> Option<Self>;

    /// Returns the child on the given side of the plane.
    #[inline]
    fn child(self, back: bool) -> Option<Self> {
        if back { self.back() } else { self.front() }
    }
}

impl<'a> NodeView<'a> for &'a BspNode {
    #[inline]
    fn plane(self) -> Plane3D {
        *BspNode::plane(self)
    }

    #[inline]
    fn is_partitioned(self) -> bool {
        BspNode::is_partitioned(self)
    }

    #[inline]
    fn triangle_indices(self) -> &'a [u32] {
        BspNode::triangle_indices(self)
    }

    #[inline]
    fn front(self) -> Option<Self> {
        BspNode::front(self)
    }

    #[inline]
    fn back(self) -> Option<Self> {
        BspNode::back(self)
    }
}

impl<'a> NodeView<'a> for ArenaRef<'a> {
    #[inline]
    fn plane(self) -> Plane3D {
        *ArenaRef::plane(&self)
    }

    #[inline]
    fn is_partitioned(self) -> bool {
        ArenaRef::is_partitioned(&self)
    }

    #[inline]
    fn triangle_indices(self) -> &'a [u32] {
        ArenaRef::triangle_indices(&self)
    }

    #[inline]
    fn front(self) -> Option<Self> {
        ArenaRef::front(&self)
    }

    #[inline]
    fn back(self) -> Option<Self> {
        ArenaRef::back(&self)
    }
}

/// A node of either storage kind, as handed out by [`crate::BspTree::root`].
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Built(&'a BspNode),
    Loaded(ArenaRef<'a>),
}

impl<'a> NodeView<'a> for NodeRef<'a> {
    fn plane(self) -> Plane3D {
        match self {
            NodeRef::Built(n) => NodeView::plane(n),
            NodeRef::Loaded(n) => NodeView::plane(n),
        }
    }

    fn is_partitioned(self) -> bool {
        match self {
            NodeRef::Built(n) => NodeView::is_partitioned(n),
            NodeRef::Loaded(n) => NodeView::is_partitioned(n),
        }
    }

    fn triangle_indices(self) -> &'a [u32] {
        match self {
            NodeRef::Built(n) => NodeView::triangle_indices(n),
            NodeRef::Loaded(n) => NodeView::triangle_indices(n),
        }
    }

    fn front(self) -> Option<Self> {
        match self {
            NodeRef::Built(n) => NodeView::front(n).map(NodeRef::Built),
            NodeRef::Loaded(n) => NodeView::front(n).map(NodeRef::Loaded),
        }
    }

    fn back(self) -> Option<Self> {
        match self {
            NodeRef::Built(n) => NodeView::back(n).map(NodeRef::Built),
            NodeRef::Loaded(n) => NodeView::back(n).map(NodeRef::Loaded),
        }
    }
}

/// Iterates a subtree in prefix order (node, front subtree, back subtree),
/// yielding each node with its depth (root = 0).
pub struct Prefix<N> {
    stack: Vec<(N, usize)>,
}

impl<N> Prefix<N> {
    pub fn new(root: N) -> Self {
        Self {
            stack: vec![(root, 0)],
        }
    }
}

impl<'a, N: NodeView<'a>> Iterator for Prefix<N> {
    type Item = (N, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        if let Some(back) = node.back() {
            self.stack.push((back, depth + 1));
        }
        if let Some(front) = node.front() {
            self.stack.push((front, depth + 1));
        }
        Some((node, depth))
    }
}
