//! Limits applied while constructing a tree.

/// Construction limits.
///
/// A node whose triangle set is no larger than `max_leaf_size` becomes an
/// unpartitioned leaf. Once partitioning another node would exceed
/// `max_nodes` nodes or `max_triangles` triangles (splitting adds
/// fragments), the node is kept as an unpartitioned leaf instead. The
/// defaults match the index widths of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfig {
    pub max_leaf_size: usize,
    pub max_nodes: usize,
    pub max_triangles: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_leaf_size: 10,
            max_nodes: 0xffff,
            max_triangles: 0xffff,
        }
    }
}

impl BuildConfig {
    pub fn with_max_leaf_size(mut self, max_leaf_size: usize) -> Self {
        self.max_leaf_size = max_leaf_size;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_max_triangles(mut self, max_triangles: usize) -> Self {
        self.max_triangles = max_triangles;
        self
    }
}
