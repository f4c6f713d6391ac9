//! Collision and material flags carried by every world triangle.

use std::fmt;

bitflags::bitflags! {
    /// Per-triangle collision behaviour bits (the low byte of [`TriangleFlags`]).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CollisionFlags: u8 {
        /// The camera passes through this triangle.
        const CAMERA_NO_COLLIDE = 1 << 0;
        /// Triangle is see-through for line-of-sight tests.
        const TRANSPARENT = 1 << 1;
        /// Triangle is alpha blended.
        const BLENDED = 1 << 2;
        /// Triangle belongs to terrain.
        const TERRAIN = 1 << 3;
        /// Objects pass through this triangle.
        const NO_COLLIDE = 1 << 4;
        /// Both faces are solid.
        const DOUBLE_SIDED = 1 << 5;
        /// Triangle is part of a door.
        const DOOR = 1 << 6;
        const RESERVED_7 = 1 << 7;
    }
}

const COLLISION_MASK: u32 = 0x0000_00ff;
const MATERIAL_KIND_SHIFT: u32 = 8;
const MATERIAL_KIND_MASK: u32 = 0x0000_ff00;

/// Packed triangle flags: collision bits and a material-kind index.
///
/// The packing is the on-disk layout: bits 0..8 hold the [`CollisionFlags`],
/// bits 8..16 the material kind. A tree built from an exporter's triangle
/// soup instead stores a placeholder material index in the whole value until
/// [`crate::BspTree::remap_flags`] resolves it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TriangleFlags(u32);

impl TriangleFlags {
    /// Collision byte marking a triangle that is stored but never collides.
    pub const NOT_IN_BSP: u8 = 0xff;

    /// Flags for a triangle that takes part in no collision query.
    pub const NEVER_COLLIDES: Self = Self(Self::NOT_IN_BSP as u32);

    /// Packs collision bits and a material kind.
    pub fn new(collision: CollisionFlags, material_kind: u8) -> Self {
        Self(u32::from(collision.bits()) | (u32::from(material_kind) << MATERIAL_KIND_SHIFT))
    }

    /// Stores an exporter placeholder (material index) awaiting a remap.
    pub fn placeholder(material_index: u32) -> Self {
        Self(material_index)
    }

    /// Wraps a raw value read from a file.
    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw packed value as written to a file.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// The raw collision byte.
    #[inline]
    pub fn collision_byte(self) -> u8 {
        (self.0 & COLLISION_MASK) as u8
    }

    /// The collision bits; meaningless when [`Self::is_collidable`] is false.
    #[inline]
    pub fn collision(self) -> CollisionFlags {
        CollisionFlags::from_bits_retain(self.collision_byte())
    }

    /// The material-kind index.
    #[inline]
    pub fn material_kind(self) -> u8 {
        ((self.0 & MATERIAL_KIND_MASK) >> MATERIAL_KIND_SHIFT) as u8
    }

    /// The whole value read as an exporter material index.
    #[inline]
    pub fn placeholder_index(self) -> u32 {
        self.0
    }

    /// False for triangles flagged [`Self::NOT_IN_BSP`]; queries skip them.
    #[inline]
    pub fn is_collidable(self) -> bool {
        self.collision_byte() != Self::NOT_IN_BSP
    }
}

impl fmt::Debug for TriangleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_collidable() {
            f.debug_struct("TriangleFlags")
                .field("collision", &self.collision())
                .field("material_kind", &self.material_kind())
                .finish()
        } else {
            f.debug_struct("TriangleFlags")
                .field("collision", &"NOT_IN_BSP")
                .field("material_kind", &self.material_kind())
                .finish()
        }
    }
}

/// Lookup table from exporter material index to final flags.
///
/// Entry `i` holds the flags for triangles whose placeholder index is `i`
/// (modulo the table length).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BspFlagsMap {
    entries: Vec<TriangleFlags>,
}

impl BspFlagsMap {
    pub fn new(entries: Vec<TriangleFlags>) -> Self {
        Self { entries }
    }

    /// Builds a table by resolving each material identifier, in order.
    pub fn from_material_ids<S, F>(ids: &[S], mut resolve: F) -> Self
    where
        S: AsRef<str>,
        F: FnMut(&str) -> TriangleFlags,
    {
        Self {
            entries: ids.iter().map(|id| resolve(id.as_ref())).collect(),
        }
    }

    pub fn push(&mut self, flags: TriangleFlags) {
        self.entries.push(flags);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a placeholder; `None` only for an empty table.
    pub fn resolve(&self, placeholder: TriangleFlags) -> Option<TriangleFlags> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = placeholder.placeholder_index() as usize % self.entries.len();
        Some(self.entries[idx])
    }
}

impl FromIterator<TriangleFlags> for BspFlagsMap {
    fn from_iter<I: IntoIterator<Item = TriangleFlags>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
