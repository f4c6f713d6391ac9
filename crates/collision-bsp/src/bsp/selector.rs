//! Plane selection strategies for BSP tree construction.
//!
//! The choice of splitting plane affects tree balance and the number of
//! triangle splits during construction. Every selector here is
//! deterministic: the same input always yields the same tree.

use crate::{Plane3D, Side, WorldTriangle};

/// Strategy for selecting which triangle's plane partitions a node.
pub trait PlaneSelector {
    /// Picks the partition plane for the triangles `pool[i]` for each `i` in
    /// `candidates`.
    ///
    /// Returns `None` if no candidate yields a usable plane.
    fn select(&self, pool: &[WorldTriangle], candidates: &[u32]) -> Option<Plane3D>;
}

/// Uses the plane of the first triangle.
///
/// This is the simplest and fastest selector, but may produce unbalanced
/// trees depending on input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstTriangle;

impl PlaneSelector for FirstTriangle {
    fn select(&self, pool: &[WorldTriangle], candidates: &[u32]) -> Option<Plane3D> {
        candidates
            .iter()
            .find_map(|&i| pool.get(i as usize).and_then(WorldTriangle::plane))
    }
}

/// Tries up to `max_candidates` triangle planes, sampled at even strides
/// through the set, and keeps the one that straddles the fewest triangles.
///
/// Ties keep the earliest candidate.
#[derive(Debug, Clone, Copy)]
pub struct LeastSplits {
    pub max_candidates: usize,
}

impl Default for LeastSplits {
    fn default() -> Self {
        Self { max_candidates: 15 }
    }
}

impl PlaneSelector for LeastSplits {
    fn select(&self, pool: &[WorldTriangle], candidates: &[u32]) -> Option<Plane3D> {
        let n = candidates.len();
        let tests = self.max_candidates.max(1).min(n);

        let mut best: Option<(Plane3D, usize)> = None;

        for i in 0..tests {
            let pick = candidates[i * n / tests] as usize;
            let Some(plane) = pool.get(pick).and_then(WorldTriangle::plane) else {
                continue;
            };

            let limit = best.map_or(usize::MAX, |(_, splits)| splits);
            let mut splits = 0;
            for &j in candidates {
                if splits >= limit {
                    break;
                }
                let tri = &pool[j as usize];
                if plane.which_side(tri.vertices().iter().copied()) == Side::Both {
                    splits += 1;
                }
            }

            if splits < limit {
                best = Some((plane, splits));
            }
        }

        best.map(|(plane, _)| plane)
    }
}
