//! Tree traversals for ray, static-triangle and swept-triangle queries.
//!
//! Each traversal keeps its pending work on an explicit stack and reads
//! nodes only through [`NodeView`], so built and loaded trees share them.

use nalgebra::{Point3, Vector3};

use crate::{TOLERANCE, WorldTriangle};

use super::view::NodeView;
use super::visitor::CollisionVisitor;

/// A triangle hit by a ray query.
///
/// `distance` is the fraction of the query segment `end - start` at which
/// the ray meets the triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit<'a> {
    pub triangle: &'a WorldTriangle,
    pub distance: f32,
}

enum RayTask<N> {
    /// Visit a node for the segment fractions `[s, e]`.
    Node(N, f32, f32),
    /// Test the triangles stored on a node.
    Triangles(N),
}

/// Casts the segment `start -> end` through the tree.
///
/// Without a visitor, returns the closest hit in `(0, max_distance)`. With
/// one, every hit is reported front to back (sorted within each node) until
/// the visitor asks to stop; the hit that stopped it is returned.
pub(crate) fn ray<'a, N: NodeView<'a>>(
    root: N,
    triangles: &'a [WorldTriangle],
    start: Point3<f32>,
    end: Point3<f32>,
    max_distance: f32,
    mut visitor: Option<&mut dyn CollisionVisitor>,
) -> Option<RayHit<'a>> {
    let delta = end - start;
    let length = delta.norm();
    if length <= f32::EPSILON || max_distance.is_nan() || max_distance <= 0.0 {
        return None;
    }

    let pad = TOLERANCE / length;
    let at = |t: f32| start + delta * t;

    let mut limit = max_distance;
    let mut closest = None;
    let mut reported = 0.0f32;
    let mut hits: Vec<RayHit<'a>> = Vec::new();
    let mut stack = vec![RayTask::Node(root, 0.0, max_distance)];

    while let Some(task) = stack.pop() {
        match task {
            RayTask::Node(node, s, e) => {
                if s > limit + pad {
                    continue;
                }

                if !node.is_partitioned() {
                    stack.extend(node.back().map(|c| RayTask::Node(c, s, e)));
                    stack.extend(node.front().map(|c| RayTask::Node(c, s, e)));
                    stack.push(RayTask::Triangles(node));
                    continue;
                }

                let plane = node.plane();
                let ds = plane.signed_distance(at(s - pad));
                let de = plane.signed_distance(at(e + pad));
                let start_back = ds < 0.0;
                let near = node.child(start_back);
                let far = node.child(!start_back);

                if (de < 0.0) == start_back {
                    if ds.abs() < TOLERANCE || de.abs() < TOLERANCE {
                        stack.extend(far.map(|c| RayTask::Node(c, s, e)));
                        stack.push(RayTask::Triangles(node));
                    }
                    stack.extend(near.map(|c| RayTask::Node(c, s, e)));
                } else {
                    let i = plane
                        .crossing_fraction(start, delta)
                        .unwrap_or(s)
                        .clamp(s, e);
                    // Child triangles reach up to TOLERANCE past the plane,
                    // which a slanted ray covers over a longer stretch.
                    let spread = TOLERANCE / plane.normal().dot(&delta).abs().max(f32::EPSILON);
                    stack.extend(far.map(|c| RayTask::Node(c, (i - spread).max(s), e)));
                    stack.push(RayTask::Triangles(node));
                    stack.extend(near.map(|c| RayTask::Node(c, s, (i + spread).min(e))));
                }
            }
            RayTask::Triangles(node) => {
                hits.clear();
                hits.extend(node.triangle_indices().iter().filter_map(|&index| {
                    let triangle = triangles.get(index as usize)?;
                    if !triangle.is_collidable() {
                        return None;
                    }
                    let distance = triangle.intersects_ray(start, delta, limit)?;
                    Some(RayHit { triangle, distance })
                }));
                hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));

                match visitor.as_deref_mut() {
                    Some(visitor) => {
                        for hit in &hits {
                            // Overlapping child segments can reorder ties
                            // by an ulp; reported distances never decrease.
                            let hit = RayHit {
                                distance: hit.distance.max(reported),
                                ..*hit
                            };
                            reported = hit.distance;
                            if visitor.visit(hit.triangle, hit.distance) {
                                return Some(hit);
                            }
                        }
                    }
                    None => {
                        if let Some(hit) = hits.first() {
                            limit = hit.distance;
                            closest = Some(*hit);
                        }
                    }
                }
            }
        }
    }

    closest
}

/// Which part of a node an overlap search looks at first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lead {
    /// The side holding the first query point, then the plane, then the
    /// other side.
    FirstPoint,
    /// The plane, then the back side, then the front side.
    Plane,
}

enum Task<N> {
    Node(N),
    Triangles(N),
}

/// Walks every node whose region the convex hull of `points` can reach
/// and offers each collidable triangle there to `accept`.
///
/// Returns the first triangle `accept` takes.
pub(crate) fn first_overlap<'a, N, F>(
    root: N,
    triangles: &'a [WorldTriangle],
    points: &[Point3<f32>],
    lead: Lead,
    mut accept: F,
) -> Option<&'a WorldTriangle>
where
    N: NodeView<'a>,
    F: FnMut(&'a WorldTriangle) -> bool,
{
    let first = *points.first()?;
    let mut stack = vec![Task::Node(root)];

    while let Some(task) = stack.pop() {
        match task {
            Task::Node(node) => {
                if !node.is_partitioned() {
                    stack.extend(node.back().map(Task::Node));
                    stack.extend(node.front().map(Task::Node));
                    stack.push(Task::Triangles(node));
                    continue;
                }

                let plane = node.plane();
                let span = plane.span(points.iter().copied());

                let back = node.back().filter(|_| span.reaches_back()).map(Task::Node);
                let front = node.front().filter(|_| span.reaches_front()).map(Task::Node);
                let on = span.touches_plane().then_some(Task::Triangles(node));

                let order = match lead {
                    Lead::FirstPoint if plane.signed_distance(first) < 0.0 => [back, on, front],
                    Lead::FirstPoint => [front, on, back],
                    Lead::Plane => [on, back, front],
                };
                stack.extend(order.into_iter().rev().flatten());
            }
            Task::Triangles(node) => {
                for &index in node.triangle_indices() {
                    let Some(candidate) = triangles.get(index as usize) else {
                        continue;
                    };
                    if candidate.is_collidable() && accept(candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
    }

    None
}

/// The six corners of the prism swept by `triangle` moving through `offset`.
pub(crate) fn swept_points(triangle: &WorldTriangle, offset: Vector3<f32>) -> [Point3<f32>; 6] {
    let [a, b, c] = *triangle.vertices();
    [a, b, c, a + offset, b + offset, c + offset]
}
