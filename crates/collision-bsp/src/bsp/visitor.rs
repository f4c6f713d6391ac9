//! Visitors receive every triangle a query hits.
//!
//! A visitor can accept a hit (stop the query there) or reject it and let
//! the traversal continue, which is how callers collect several hits or skip
//! triangles by material.

use crate::WorldTriangle;

/// Callback invoked for each triangle a collision query hits.
pub trait CollisionVisitor {
    /// Called for each hit, nearest first for ray queries.
    ///
    /// `distance` is the fraction along the ray for ray queries and `0.0`
    /// for triangle sweeps. Return `true` to stop the query at this hit.
    fn visit(&mut self, triangle: &WorldTriangle, distance: f32) -> bool;
}

impl<F> CollisionVisitor for F
where
    F: FnMut(&WorldTriangle, f32) -> bool,
{
    fn visit(&mut self, triangle: &WorldTriangle, distance: f32) -> bool {
        self(triangle, distance)
    }
}

/// A triangle hit recorded by [`CollectingVisitor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub triangle: WorldTriangle,
    pub distance: f32,
}

/// A visitor that records every hit and never stops the query.
#[derive(Debug, Default)]
pub struct CollectingVisitor {
    hits: Vec<Hit>,
}

impl CollectingVisitor {
    /// Creates a new empty collecting visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the collected hits.
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Returns the collected hits.
    pub fn into_hits(self) -> Vec<Hit> {
        self.hits
    }
}

impl CollisionVisitor for CollectingVisitor {
    fn visit(&mut self, triangle: &WorldTriangle, distance: f32) -> bool {
        self.hits.push(Hit {
            triangle: *triangle,
            distance,
        });
        false
    }
}

/// Stops the query once `limit` hits have been seen.
#[derive(Debug, Clone)]
pub struct FirstHits {
    limit: usize,
    hits: Vec<Hit>,
}

impl FirstHits {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            hits: Vec::with_capacity(limit),
        }
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.hits
    }
}

impl CollisionVisitor for FirstHits {
    fn visit(&mut self, triangle: &WorldTriangle, distance: f32) -> bool {
        self.hits.push(Hit {
            triangle: *triangle,
            distance,
        });
        self.hits.len() >= self.limit
    }
}
