use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::io::Write;
use std::path::Path;

use log::debug;
use nalgebra::{Point3, Vector3};
use tempfile::NamedTempFile;

use crate::container::{
    MaterialIds, SectionContainer, SECTION_BSP, SECTION_BSP2, SECTION_MATERIALS,
};
use crate::error::{Error, Result};
use crate::format;
use crate::{Aabb, BspFlagsMap, UserDataKey, WorldTriangle};

use super::arena::{NodeArena, NodeId};
use super::build::construct;
use super::config::BuildConfig;
use super::node::BspNode;
use super::query::{first_overlap, ray, swept_points, Lead, RayHit};
use super::selector::{LeastSplits, PlaneSelector};
use super::view::{NodeRef, NodeView, Prefix};
use super::visitor::CollisionVisitor;

#[derive(Debug, Clone)]
enum Nodes {
    Built(BspNode),
    Loaded { arena: NodeArena, root: NodeId },
}

/// A BSP tree over static world triangles.
///
/// The tree owns a flat list of triangles; nodes refer to them by index.
/// Every query takes `&self`, so a finished tree can be shared between
/// threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct BspTree {
    nodes: Nodes,
    triangles: Vec<WorldTriangle>,
    bb: Aabb,
    user_data: BTreeMap<UserDataKey, Vec<u8>>,
}

/// A tree read from a section container, with what is needed to finish it.
#[derive(Debug, Clone)]
pub struct LoadedBsp {
    pub tree: BspTree,
    /// Material ids for [`BspTree::remap_flags`], if the container had them.
    pub material_ids: Option<MaterialIds>,
    /// True if the triangle flags are still placeholder material indices.
    pub requires_remap: bool,
}

/// Shape summary of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub triangles: usize,
    pub nodes: usize,
    pub partitioned_nodes: usize,
    pub leaves: usize,
    pub max_depth: usize,
    pub max_node_triangles: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} triangles, {} nodes ({} partitioned, {} leaves), depth {}, largest node {}",
            self.triangles,
            self.nodes,
            self.partitioned_nodes,
            self.leaves,
            self.max_depth,
            self.max_node_triangles
        )
    }
}

impl Default for BspTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BspTree {
    /// The empty tree: a single empty leaf and no triangles.
    pub fn new() -> Self {
        Self {
            nodes: Nodes::Built(BspNode::leaf(Vec::new())),
            triangles: Vec::new(),
            bb: Aabb::empty(),
            user_data: BTreeMap::new(),
        }
    }

    /// Builds a tree with the default limits and plane selection.
    pub fn from_triangles(triangles: Vec<WorldTriangle>) -> Result<Self> {
        Self::build(triangles, &BuildConfig::default())
    }

    /// Builds a tree, choosing partition planes with [`LeastSplits`].
    ///
    /// Fails with [`Error::DegenerateTriangle`] if any input triangle is
    /// degenerate; filter with [`WorldTriangle::is_degenerate`] first.
    pub fn build(triangles: Vec<WorldTriangle>, config: &BuildConfig) -> Result<Self> {
        Self::build_with(triangles, config, &LeastSplits::default())
    }

    pub fn build_with<S: PlaneSelector + ?Sized>(
        triangles: Vec<WorldTriangle>,
        config: &BuildConfig,
        selector: &S,
    ) -> Result<Self> {
        let built = construct(triangles, config, selector)?;
        let mut tree = Self {
            nodes: Nodes::Built(built.root),
            triangles: built.triangles,
            bb: Aabb::empty(),
            user_data: BTreeMap::new(),
        };
        tree.generate_bb();
        Ok(tree)
    }

    /// Decodes a tree from its binary form.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let decoded = format::read_tree(data)?;
        let mut tree = Self {
            nodes: Nodes::Loaded {
                arena: decoded.nodes,
                root: decoded.root,
            },
            triangles: decoded.triangles,
            bb: Aabb::empty(),
            user_data: decoded.user_data,
        };
        tree.generate_bb();
        Ok(tree)
    }

    /// Replaces this tree with one decoded from `data`.
    ///
    /// On failure the tree is left empty.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        match Self::from_bytes(data) {
            Ok(tree) => {
                *self = tree;
                Ok(())
            }
            Err(err) => {
                debug!("rejected BSP data: {err}");
                *self = Self::new();
                Err(err)
            }
        }
    }

    /// Decodes either a bare tree or a section container holding one.
    ///
    /// A tree from a `bsp2` section comes back with `requires_remap` set and
    /// its flags still placeholder indices; a bare tree never needs a remap.
    pub fn from_blob(data: &[u8]) -> Result<LoadedBsp> {
        if SectionContainer::is_container(data) {
            let container = SectionContainer::parse(data)?;
            Self::load_sections(&container)
        } else {
            Ok(LoadedBsp {
                tree: Self::from_bytes(data)?,
                material_ids: None,
                requires_remap: false,
            })
        }
    }

    /// Loads the tree from a section container.
    ///
    /// A `bsp2` section is preferred and comes with placeholder flags that
    /// need remapping through the ids in `bsp2_materials`. A legacy `bsp`
    /// section is used as is.
    pub fn load_sections(container: &SectionContainer<'_>) -> Result<LoadedBsp> {
        if let Some(section) = container.section(SECTION_BSP2) {
            let tree = Self::from_bytes(section.data)?;
            let material_ids = container
                .section(SECTION_MATERIALS)
                .map(|s| MaterialIds::parse(s.data))
                .transpose()?;
            return Ok(LoadedBsp {
                tree,
                material_ids,
                requires_remap: true,
            });
        }

        if let Some(section) = container.section(SECTION_BSP) {
            return Ok(LoadedBsp {
                tree: Self::from_bytes(section.data)?,
                material_ids: None,
                requires_remap: false,
            });
        }

        debug!(
            "no BSP section among {:?}",
            container.names().collect::<Vec<_>>()
        );
        Err(Error::MissingSection(SECTION_BSP2.to_string()))
    }

    /// Encodes the tree in its binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Writes the binary form to `out`.
    ///
    /// Nothing is written if the tree exceeds the format's limits.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        format::write_tree(out, self.root(), &self.triangles, &self.user_data)
    }

    /// Saves the binary form to `path`.
    ///
    /// The data goes to a temporary file next to `path` that is renamed over
    /// it once complete, so a failed save leaves no partial file behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!("saved BSP to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Replaces every triangle's placeholder flags with the entry of `map`
    /// it indexes. An empty map leaves the flags untouched.
    pub fn remap_flags(&mut self, map: &BspFlagsMap) {
        if map.is_empty() {
            return;
        }
        for triangle in &mut self.triangles {
            if let Some(flags) = map.resolve(triangle.flags()) {
                triangle.set_flags(flags);
            }
        }
        debug!(
            "remapped flags of {} triangles through {} entries",
            self.triangles.len(),
            map.len()
        );
    }

    pub fn user_data(&self, key: UserDataKey) -> Option<&[u8]> {
        self.user_data.get(&key).map(Vec::as_slice)
    }

    /// Stores `data` under `key` unless the key already has an entry.
    ///
    /// Returns `false` and keeps the existing entry if there is one.
    pub fn set_user_data(&mut self, key: UserDataKey, data: Vec<u8>) -> bool {
        match self.user_data.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(data);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Stores `data` under `key`, returning the entry it replaced.
    pub fn replace_user_data(&mut self, key: UserDataKey, data: Vec<u8>) -> Option<Vec<u8>> {
        self.user_data.insert(key, data)
    }

    pub fn user_data_keys(&self) -> impl Iterator<Item = UserDataKey> + '_ {
        self.user_data.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[inline]
    pub fn triangles(&self) -> &[WorldTriangle] {
        &self.triangles
    }

    /// The root node. Always present, even for an empty tree.
    pub fn root(&self) -> NodeRef<'_> {
        match &self.nodes {
            Nodes::Built(node) => NodeRef::Built(node),
            Nodes::Loaded { arena, root } => NodeRef::Loaded(arena.node(*root)),
        }
    }

    /// True if the nodes came from [`BspTree::from_bytes`] rather than
    /// construction.
    pub fn is_loaded(&self) -> bool {
        matches!(self.nodes, Nodes::Loaded { .. })
    }

    /// Recomputes the bounding box from the triangles.
    pub fn generate_bb(&mut self) {
        self.bb = Aabb::from_points(self.triangles.iter().flat_map(|t| t.vertices().iter().copied()));
    }

    /// Bounding box of all triangles; inside out for an empty tree.
    #[inline]
    pub fn bb(&self) -> &Aabb {
        &self.bb
    }

    /// True if any triangle takes part in collisions.
    pub fn can_collide(&self) -> bool {
        self.triangles.iter().any(WorldTriangle::is_collidable)
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            triangles: self.triangles.len(),
            ..TreeStats::default()
        };
        for (node, depth) in Prefix::new(self.root()) {
            stats.nodes += 1;
            if node.is_partitioned() {
                stats.partitioned_nodes += 1;
            }
            if node.front().is_none() && node.back().is_none() {
                stats.leaves += 1;
            }
            stats.max_depth = stats.max_depth.max(depth);
            stats.max_node_triangles = stats.max_node_triangles.max(node.triangle_indices().len());
        }
        stats
    }

    /// One line per node in prefix order, indented by depth.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (node, depth) in Prefix::new(self.root()) {
            let plane = node.plane();
            let n = plane.normal();
            let _ = writeln!(
                out,
                "{:depth$}size = {}. n = ({:.6}, {:.6}, {:.6}). d = {:.6} len = {:.6}",
                "",
                node.triangle_indices().len(),
                n.x,
                n.y,
                n.z,
                plane.offset(),
                n.norm(),
            );
        }
        out
    }

    /// Closest triangle hit by the segment `start -> end` at a fraction in
    /// `(0, max_distance)` of its length.
    pub fn intersects_ray(
        &self,
        start: Point3<f32>,
        end: Point3<f32>,
        max_distance: f32,
    ) -> Option<RayHit<'_>> {
        ray(self.root(), &self.triangles, start, end, max_distance, None)
    }

    /// Reports hits along the segment `start -> end` to `visitor`, nearest
    /// first, until it returns `true`. Returns the hit that stopped it.
    pub fn visit_ray<V: CollisionVisitor>(
        &self,
        start: Point3<f32>,
        end: Point3<f32>,
        max_distance: f32,
        visitor: &mut V,
    ) -> Option<RayHit<'_>> {
        ray(self.root(), &self.triangles, start, end, max_distance, Some(visitor))
    }

    /// A stored triangle that `triangle` intersects, if any.
    pub fn intersects_triangle(&self, triangle: &WorldTriangle) -> Option<&WorldTriangle> {
        first_overlap(
            self.root(),
            &self.triangles,
            triangle.vertices(),
            Lead::FirstPoint,
            |candidate| candidate.intersects_triangle(triangle),
        )
    }

    /// A stored triangle hit by `triangle` moving through `translation`.
    pub fn intersects_swept(
        &self,
        triangle: &WorldTriangle,
        translation: Vector3<f32>,
    ) -> Option<&WorldTriangle> {
        first_overlap(
            self.root(),
            &self.triangles,
            &swept_points(triangle, translation),
            Lead::Plane,
            |candidate| candidate.intersects_swept(triangle, translation),
        )
    }

    /// Offers every triangle hit by the sweep to `visitor` (with distance
    /// `0.0`) until it returns `true`. Returns the triangle that stopped it.
    pub fn visit_swept<V: CollisionVisitor>(
        &self,
        triangle: &WorldTriangle,
        translation: Vector3<f32>,
        visitor: &mut V,
    ) -> Option<&WorldTriangle> {
        first_overlap(
            self.root(),
            &self.triangles,
            &swept_points(triangle, translation),
            Lead::Plane,
            |candidate| {
                candidate.intersects_swept(triangle, translation) && visitor.visit(candidate, 0.0)
            },
        )
    }
}
