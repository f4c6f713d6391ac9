//! Binary Space Partitioning tree for static collision geometry.
//!
//! The tree partitions world triangles by the planes of the triangles
//! themselves. Each partitioned node keeps the triangles lying on its plane;
//! everything else lives in the front or back subtree. The tree answers:
//!
//! - Ray queries, closest hit or every hit front to back
//! - Static triangle overlap queries
//! - Swept triangle queries
//!
//! # Example
//!
//! ```ignore
//! use collision_bsp::{BspTree, WorldTriangle};
//! use collision_bsp::bsp::CollectingVisitor;
//! use nalgebra::Point3;
//!
//! let triangles: Vec<WorldTriangle> = /* load a mesh */;
//! let tree = BspTree::from_triangles(triangles)?;
//!
//! // Closest hit along a segment.
//! let start = Point3::new(0.0, 10.0, 0.0);
//! let end = Point3::new(0.0, -10.0, 0.0);
//! if let Some(hit) = tree.intersects_ray(start, end, 1.0) {
//!     println!("hit at {}", hit.distance);
//! }
//!
//! // Every hit, nearest first.
//! let mut visitor = CollectingVisitor::new();
//! tree.visit_ray(start, end, 1.0, &mut visitor);
//! ```
//!
//! # Architecture
//!
//! - [`BspTree`]: Root node, triangle list, bounds and user data
//! - [`BspNode`]: Boxed nodes produced by construction
//! - [`NodeArena`]: Index-addressed nodes produced by loading
//! - [`NodeView`]: Read-only node access shared by both storage kinds
//! - [`PlaneSelector`]: Strategy trait for choosing partition planes
//! - [`CollisionVisitor`]: Callback receiving each hit of a query

mod arena;
mod build;
mod config;
mod node;
mod query;
mod selector;
mod tree;
mod view;
mod visitor;

pub use arena::{ArenaRef, NodeArena, NodeId};
pub use config::BuildConfig;
pub use node::BspNode;
pub use query::RayHit;
pub use selector::{FirstTriangle, LeastSplits, PlaneSelector};
pub use tree::{BspTree, LoadedBsp, TreeStats};
pub use view::{NodeRef, NodeView, Prefix};
pub use visitor::{CollectingVisitor, CollisionVisitor, FirstHits, Hit};
