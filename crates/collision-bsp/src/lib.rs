//! BSP (Binary Space Partitioning) tree for static-geometry collision.

pub mod bsp;
mod bounds;
pub mod container;
mod cuttable;
mod error;
mod flags;
pub mod format;
mod plane;
mod polygon;
mod triangle;
mod user_data;

pub use bounds::Aabb;
pub use bsp::{
    BspNode, BspTree, BuildConfig, CollectingVisitor, CollisionVisitor, LoadedBsp, NodeRef,
    NodeView, RayHit, TreeStats,
};
pub use container::{MaterialIds, SectionContainer, SectionContainerBuilder};
pub use cuttable::{split_triangle, Cuttable, Fragments};
pub use error::{Error, Result};
pub use flags::{BspFlagsMap, CollisionFlags, TriangleFlags};
pub use plane::{Plane3D, PlaneSide, Side, Span, TOLERANCE};
pub use polygon::WorldPolygon;
pub use triangle::{WorldTriangle, DEGENERATE_NORMAL_LENGTH};
pub use user_data::UserDataKey;
