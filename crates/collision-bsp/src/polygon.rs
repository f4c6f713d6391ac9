//! Convex polygon used for clipping and splitting world triangles.

use nalgebra::{Point3, Vector3};

use crate::plane::{Plane3D, PlaneSide, Side};
use crate::triangle::WorldTriangle;

/// A convex, planar polygon given by its vertices in winding order.
///
/// Unlike a [`WorldTriangle`] a polygon may temporarily hold fewer than
/// three vertices while it is being clipped; an empty polygon is the result
/// of clipping everything away.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldPolygon {
    vertices: Vec<Point3<f32>>,
}

impl WorldPolygon {
    pub fn new(vertices: Vec<Point3<f32>>) -> Self {
        Self { vertices }
    }

    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Computes the (unnormalized) normal from the first three vertices.
    pub fn normal(&self) -> Vector3<f32> {
        match self.vertices.as_slice() {
            [a, b, c, ..] => (b - a).cross(&(c - a)),
            _ => Vector3::zeros(),
        }
    }

    pub fn centroid(&self) -> Point3<f32> {
        if self.vertices.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<f32> = self.vertices.iter().map(|p| p.coords).sum();
        Point3::from(sum / self.vertices.len() as f32)
    }

    #[inline]
    pub fn which_side(&self, plane: &Plane3D) -> Side {
        plane.which_side(self.vertices.iter().copied())
    }

    /// Clips away everything behind `plane`, keeping the part with a
    /// non-negative signed distance.
    ///
    /// Returns `false` if nothing is left.
    pub fn chop(&mut self, plane: &Plane3D) -> bool {
        let n = self.vertices.len();
        if n == 0 {
            return false;
        }

        let dists: Vec<f32> = self
            .vertices
            .iter()
            .map(|v| plane.signed_distance(*v))
            .collect();

        if dists.iter().all(|&d| d >= 0.0) {
            return true;
        }

        let mut kept = Vec::with_capacity(n + 1);
        for i in 0..n {
            let j = (i + 1) % n;
            let (cur, next) = (self.vertices[i], self.vertices[j]);
            let (dc, dn) = (dists[i], dists[j]);

            if dc >= 0.0 {
                kept.push(cur);
            }
            if (dc >= 0.0) != (dn >= 0.0) {
                let t = dc / (dc - dn);
                kept.push(cur + (next - cur) * t);
            }
        }

        self.vertices = kept;
        !self.vertices.is_empty()
    }

    /// Splits the polygon by `plane` into `(front, back)` parts.
    ///
    /// Walks the edges Sutherland–Hodgman style; vertices within tolerance
    /// of the plane go to both parts and an intersection point is added
    /// wherever an edge crosses from one side to the other. A part with
    /// fewer than three vertices comes back empty.
    pub fn split(&self, plane: &Plane3D) -> (WorldPolygon, WorldPolygon) {
        let n = self.vertices.len();
        let mut front = Vec::with_capacity(n + 1);
        let mut back = Vec::with_capacity(n + 1);

        let sides: Vec<PlaneSide> = self
            .vertices
            .iter()
            .map(|v| plane.classify_point(*v))
            .collect();

        for i in 0..n {
            let current = self.vertices[i];
            let next_idx = (i + 1) % n;

            match sides[i] {
                PlaneSide::Front => front.push(current),
                PlaneSide::Back => back.push(current),
                PlaneSide::OnPlane => {
                    front.push(current);
                    back.push(current);
                }
            }

            let crosses = matches!(
                (sides[i], sides[next_idx]),
                (PlaneSide::Front, PlaneSide::Back) | (PlaneSide::Back, PlaneSide::Front)
            );

            if crosses {
                if let Some((_, point)) = plane.intersect_segment(current, self.vertices[next_idx]) {
                    front.push(point);
                    back.push(point);
                }
            }
        }

        let keep = |verts: Vec<Point3<f32>>| {
            if verts.len() >= 3 {
                WorldPolygon::new(verts)
            } else {
                WorldPolygon::default()
            }
        };

        (keep(front), keep(back))
    }

    /// Fan-triangulates the polygon around its first vertex.
    pub fn triangulate(&self) -> impl Iterator<Item = [Point3<f32>; 3]> + '_ {
        let first = self.vertices.first().copied();
        self.vertices
            .windows(2)
            .skip(1)
            .filter_map(move |pair| first.map(|a| [a, pair[0], pair[1]]))
    }
}

impl From<&WorldTriangle> for WorldPolygon {
    fn from(triangle: &WorldTriangle) -> Self {
        Self {
            vertices: triangle.vertices().to_vec(),
        }
    }
}

impl From<WorldTriangle> for WorldPolygon {
    fn from(triangle: WorldTriangle) -> Self {
        Self::from(&triangle)
    }
}
