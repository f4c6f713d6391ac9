//! Boxed BSP node produced by tree construction.

use std::fmt;

use crate::Plane3D;

/// A node in a constructed BSP tree.
///
/// A partitioned node stores the triangles lying on its plane; triangles in
/// front of or behind the plane live in the respective subtrees. An
/// unpartitioned node is a leaf holding triangles on any side, and carries
/// the placeholder plane `x = 0`.
///
/// Triangles are stored as indices into the owning tree's triangle list.
///
/// `Clone`, `Debug` and `Drop` never recurse, so degenerate deep chains are
/// safe to copy, print and free.
pub struct BspNode {
    /// `x = 0` on unpartitioned nodes.
    plane: Plane3D,
    partitioned: bool,
    triangles: Vec<u32>,
    front: Option<Box<BspNode>>,
    back: Option<Box<BspNode>>,
}

impl BspNode {
    /// Creates an unpartitioned leaf.
    pub fn leaf(triangles: Vec<u32>) -> Self {
        Self {
            plane: Plane3D::unpartitioned(),
            partitioned: false,
            triangles,
            front: None,
            back: None,
        }
    }

    /// Creates a partitioned node holding the triangles on `plane`.
    pub fn partitioned(plane: Plane3D, on_plane: Vec<u32>) -> Self {
        Self {
            plane,
            partitioned: true,
            triangles: on_plane,
            front: None,
            back: None,
        }
    }

    #[inline]
    pub fn plane(&self) -> &Plane3D {
        &self.plane
    }

    #[inline]
    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    /// Indices of the triangles stored at this node.
    #[inline]
    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangles
    }

    #[inline]
    pub fn front(&self) -> Option<&BspNode> {
        self.front.as_deref()
    }

    #[inline]
    pub fn back(&self) -> Option<&BspNode> {
        self.back.as_deref()
    }

    /// Replaces the subtree in front of the plane.
    #[inline]
    pub fn set_front(&mut self, node: Option<BspNode>) {
        self.front = node.map(Box::new);
    }

    /// Replaces the subtree behind the plane.
    #[inline]
    pub fn set_back(&mut self, node: Option<BspNode>) {
        self.back = node.map(Box::new);
    }

    /// True if the node has no children (it may still be partitioned).
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.front.is_none() && self.back.is_none()
    }
}

impl BspNode {
    fn shallow_clone(&self) -> Self {
        Self {
            plane: self.plane,
            partitioned: self.partitioned,
            triangles: self.triangles.clone(),
            front: None,
            back: None,
        }
    }
}

impl Clone for BspNode {
    fn clone(&self) -> Self {
        // Breadth-first, so every child sits after its parent.
        let mut flat: Vec<&BspNode> = vec![self];
        let mut links: Vec<(Option<usize>, Option<usize>)> = Vec::new();
        let mut i = 0;
        while i < flat.len() {
            let node = flat[i];
            let front = node.front().map(|c| {
                flat.push(c);
                flat.len() - 1
            });
            let back = node.back().map(|c| {
                flat.push(c);
                flat.len() - 1
            });
            links.push((front, back));
            i += 1;
        }

        let mut copies: Vec<Option<BspNode>> = Vec::with_capacity(flat.len());
        copies.resize_with(flat.len(), || None);
        let link = |copies: &mut [Option<BspNode>], i: usize| {
            let mut node = flat[i].shallow_clone();
            let (front, back) = links[i];
            node.front = front.and_then(|c| copies[c].take()).map(Box::new);
            node.back = back.and_then(|c| copies[c].take()).map(Box::new);
            node
        };
        for i in (1..flat.len()).rev() {
            let node = link(&mut copies, i);
            copies[i] = Some(node);
        }
        link(&mut copies, 0)
    }
}

impl fmt::Debug for BspNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BspNode")
            .field("plane", &self.plane)
            .field("partitioned", &self.partitioned)
            .field("triangles", &self.triangles)
            .field("front", &self.front.is_some())
            .field("back", &self.back.is_some())
            .finish()
    }
}

impl Drop for BspNode {
    // Unlink children onto a heap stack so dropping a deep tree cannot
    // overflow the call stack.
    fn drop(&mut self) {
        let mut stack: Vec<Box<BspNode>> = Vec::new();
        stack.extend(self.front.take());
        stack.extend(self.back.take());

        while let Some(mut node) = stack.pop() {
            stack.extend(node.front.take());
            stack.extend(node.back.take());
        }
    }
}
