//! World triangle: the unit of collision geometry stored in a BSP tree.

use nalgebra::{Point3, Vector2, Vector3};

use crate::flags::{CollisionFlags, TriangleFlags};
use crate::plane::Plane3D;
use crate::polygon::WorldPolygon;

/// Triangles whose unnormalised normal is shorter than this are degenerate.
pub const DEGENERATE_NORMAL_LENGTH: f32 = 1e-4;

/// Determinant threshold below which a ray is parallel to a triangle.
const RAY_PARALLEL_EPSILON: f32 = 1e-6;

/// Threshold on `normal · offset` below which a sweep is treated as parallel
/// to the struck triangle.
const SWEEP_PARALLEL_EPSILON: f32 = 0.005;

/// A triangle in world space together with its packed collision flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTriangle {
    vertices: [Point3<f32>; 3],
    flags: TriangleFlags,
}

impl WorldTriangle {
    /// A collidable triangle with empty flags and material kind 0.
    pub fn new(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        Self::with_flags(a, b, c, TriangleFlags::default())
    }

    pub fn with_flags(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>, flags: TriangleFlags) -> Self {
        Self {
            vertices: [a, b, c],
            flags,
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>; 3] {
        &self.vertices
    }

    #[inline]
    pub fn v0(&self) -> Point3<f32> {
        self.vertices[0]
    }

    #[inline]
    pub fn v1(&self) -> Point3<f32> {
        self.vertices[1]
    }

    #[inline]
    pub fn v2(&self) -> Point3<f32> {
        self.vertices[2]
    }

    #[inline]
    pub fn flags(&self) -> TriangleFlags {
        self.flags
    }

    #[inline]
    pub(crate) fn set_flags(&mut self, flags: TriangleFlags) {
        self.flags = flags;
    }

    #[inline]
    pub fn collision_flags(&self) -> CollisionFlags {
        self.flags.collision()
    }

    #[inline]
    pub fn material_kind(&self) -> u8 {
        self.flags.material_kind()
    }

    /// False when the triangle is stored but excluded from every query.
    #[inline]
    pub fn is_collidable(&self) -> bool {
        self.flags.is_collidable()
    }

    /// `(v1 - v0) × (v2 - v0)`, not normalised; its length is twice the area.
    pub fn normal(&self) -> Vector3<f32> {
        let [a, b, c] = &self.vertices;
        (b - a).cross(&(c - a))
    }

    /// `None` for a degenerate triangle.
    pub fn unit_normal(&self) -> Option<Vector3<f32>> {
        let n = self.normal();
        let len = n.norm();
        if len >= DEGENERATE_NORMAL_LENGTH {
            Some(n / len)
        } else {
            None
        }
    }

    /// True if the triangle is too thin to take part in a tree.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.normal().norm() < DEGENERATE_NORMAL_LENGTH
    }

    /// The plane this triangle lies on, or `None` if it is degenerate.
    pub fn plane(&self) -> Option<Plane3D> {
        let [a, b, c] = self.vertices;
        Plane3D::try_from_three_points(a, b, c)
    }

    pub fn centroid(&self) -> Point3<f32> {
        let [a, b, c] = &self.vertices;
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Tests whether this triangle and `other` touch or overlap.
    ///
    /// Non-coplanar triangles can only meet along the line where their planes
    /// cross, so each triangle is reduced to its interval on that line and the
    /// intervals are compared. Coplanar triangles fall back to a 2D
    /// separating-axis test.
    pub fn intersects_triangle(&self, other: &WorldTriangle) -> bool {
        let a = &self.vertices;
        let b = &other.vertices;

        let n_a = self.normal();
        let d_a = n_a.dot(&a[0].coords);
        let db = b.map(|p| n_a.dot(&p.coords) - d_a);
        if db[0] * db[1] > 0.0 && db[0] * db[2] > 0.0 {
            return false;
        }

        let n_b = other.normal();
        let d_b = n_b.dot(&b[0].coords);
        let da = a.map(|p| n_b.dot(&p.coords) - d_b);
        if da[0] * da[1] > 0.0 && da[0] * da[2] > 0.0 {
            return false;
        }

        let dir = n_a.cross(&n_b);
        let axis = dominant_axis(&dir);

        let proj_a = a.map(|p| p[axis]);
        let proj_b = b.map(|p| p[axis]);

        let (Some(ia), Some(ib)) = (line_interval(proj_a, da), line_interval(proj_b, db)) else {
            return coplanar_overlap(a, b, &n_a);
        };

        ia.1 >= ib.0 && ib.1 >= ia.0
    }

    /// Intersects the segment `start + t * dir` for `0 < t < max_t`.
    ///
    /// Returns the parameter `t` of the hit. `dir` is usually the full
    /// segment delta and `max_t` a fraction of it.
    pub fn intersects_ray(&self, start: Point3<f32>, dir: Vector3<f32>, max_t: f32) -> Option<f32> {
        let [v0, v1, v2] = self.vertices;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let p = dir.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < RAY_PARALLEL_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let t = start - v0;
        let u = t.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = t.cross(&edge1);
        let v = dir.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let dist = edge2.dot(&q) * inv_det;
        (0.0 < dist && dist < max_t).then_some(dist)
    }

    /// Tests whether the prism swept by moving `triangle` through `offset`
    /// intersects this triangle.
    pub fn intersects_swept(&self, triangle: &WorldTriangle, offset: Vector3<f32>) -> bool {
        if offset.norm_squared() <= f32::EPSILON {
            return self.intersects_triangle(triangle);
        }

        let normal = self.normal();
        let ndt = normal.dot(&offset);

        if ndt.abs() < SWEEP_PARALLEL_EPSILON {
            return self.intersects_prism_parallel(triangle, offset);
        }

        // Fraction of `offset` at which each swept vertex meets our plane.
        let d = normal.dot(&self.vertices[0].coords);
        let inv = 1.0 / ndt;
        let t = triangle.vertices.map(|p| (d - normal.dot(&p.coords)) * inv);

        if t.iter().all(|&t| t < 0.0) || t.iter().all(|&t| t >= 1.0) {
            return false;
        }

        let (u, v) = projection_axes(&normal);
        let tri_a = self.vertices.map(|p| Vector2::new(p[u], p[v]));
        let tri_b = [0, 1, 2].map(|i| {
            let p = triangle.vertices[i] + offset * t[i];
            Vector2::new(p[u], p[v])
        });

        !separated_2d(&tri_a, &tri_b)
    }

    /// Sweep test for an offset lying in our plane: clip this triangle against
    /// the five faces of the prism and see whether anything survives.
    fn intersects_prism_parallel(&self, triangle: &WorldTriangle, offset: Vector3<f32>) -> bool {
        let Some(mut start_cap) = triangle.plane() else {
            return false;
        };

        let [mut p0, p1, mut p2] = triangle.vertices;
        if start_cap.normal().dot(&offset) < 0.0 {
            start_cap = start_cap.flipped();
            std::mem::swap(&mut p0, &mut p2);
        }
        let base = [p0, p1, p2];

        let mut poly = WorldPolygon::from(self);
        if !poly.chop(&start_cap) {
            return false;
        }

        let end_cap = Plane3D::from_point_and_normal(base[0] + offset, -start_cap.normal());
        if !poly.chop(&end_cap) {
            return false;
        }

        for i in 0..3 {
            let next = base[(i + 1) % 3];
            // A side face collapses when the offset runs along an edge.
            if let Some(side) = Plane3D::try_from_three_points(base[i], base[i] + offset, next) {
                if !poly.chop(&side) {
                    return false;
                }
            }
        }

        true
    }

    /// Reflects `v` off this triangle's plane.
    ///
    /// An `elasticity` of 0 removes the normal component, 1 reverses it.
    pub fn bounce(&self, v: Vector3<f32>, elasticity: f32) -> Vector3<f32> {
        match self.unit_normal() {
            Some(n) => v - n * ((1.0 + elasticity) * n.dot(&v)),
            None => v,
        }
    }

    /// Expresses `point` in the basis of the triangle's edges, using a
    /// vertical (XZ) projection: `(0,0)` is `v0`, `(1,0)` is `v1` and `(0,1)`
    /// is `v2`.
    pub fn project(&self, point: Point3<f32>) -> Vector2<f32> {
        let [v0, v1, v2] = self.vertices;
        let s = Vector2::new(v1.x - v0.x, v1.z - v0.z);
        let t = Vector2::new(v2.x - v0.x, v2.z - v0.z);
        let p = Vector2::new(point.x - v0.x, point.z - v0.z);

        let s_cross_t = cross_2d(&s, &t);
        Vector2::new(cross_2d(&p, &t) / s_cross_t, cross_2d(&s, &p) / s_cross_t)
    }
}

#[inline]
fn cross_2d(a: &Vector2<f32>, b: &Vector2<f32>) -> f32 {
    a.x * b.y - a.y * b.x
}

fn dominant_axis(v: &Vector3<f32>) -> usize {
    let abs = v.abs();
    if abs.z > abs.x.max(abs.y) {
        2
    } else if abs.y > abs.x {
        1
    } else {
        0
    }
}

/// The two axes left after dropping the normal's dominant component.
fn projection_axes(normal: &Vector3<f32>) -> (usize, usize) {
    match dominant_axis(normal) {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Interval covered by a triangle on the planes' intersection line, given
/// the projected vertices and their distances from the other plane.
///
/// Returns `None` when all distances are zero (coplanar triangles).
fn line_interval(proj: [f32; 3], d: [f32; 3]) -> Option<(f32, f32)> {
    let isect = |lone: usize, o1: usize, o2: usize| {
        let a = proj[lone] + (proj[o1] - proj[lone]) * d[lone] / (d[lone] - d[o1]);
        let b = proj[lone] + (proj[o2] - proj[lone]) * d[lone] / (d[lone] - d[o2]);
        (a.min(b), a.max(b))
    };

    if d[0] * d[1] > 0.0 {
        Some(isect(2, 0, 1))
    } else if d[0] * d[2] > 0.0 {
        Some(isect(1, 0, 2))
    } else if d[1] * d[2] > 0.0 || d[0] != 0.0 {
        Some(isect(0, 1, 2))
    } else if d[1] != 0.0 {
        Some(isect(1, 0, 2))
    } else if d[2] != 0.0 {
        Some(isect(2, 0, 1))
    } else {
        None
    }
}

fn coplanar_overlap(a: &[Point3<f32>; 3], b: &[Point3<f32>; 3], normal: &Vector3<f32>) -> bool {
    let (u, v) = projection_axes(normal);
    let a2 = a.map(|p| Vector2::new(p[u], p[v]));
    let b2 = b.map(|p| Vector2::new(p[u], p[v]));
    !separated_2d(&a2, &b2)
}

/// True if some edge of either triangle has the whole other triangle
/// strictly outside it. Edges sharing a boundary do not separate.
fn separated_2d(a: &[Vector2<f32>; 3], b: &[Vector2<f32>; 3]) -> bool {
    let inside = |edge: &Vector2<f32>, to: &Vector2<f32>| cross_2d(edge, to) >= 0.0;
    let sign_a = inside(&(a[1] - a[0]), &(a[2] - a[0]));
    let sign_b = inside(&(b[1] - b[0]), &(b[2] - b[0]));

    let edge_separates = |tri: &[Vector2<f32>; 3], sign: bool, other: &[Vector2<f32>; 3]| {
        (0..3).any(|i| {
            let prev = (i + 2) % 3;
            let edge = tri[i] - tri[prev];
            other.iter().all(|p| inside(&edge, &(p - tri[prev])) != sign)
        })
    };

    edge_separates(a, sign_a, b) || edge_separates(b, sign_b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_triangle(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> WorldTriangle {
        WorldTriangle::new(
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
        )
    }

    fn floor() -> WorldTriangle {
        make_triangle([0.0, 0.0, 0.0], [0.0, 0.0, 4.0], [4.0, 0.0, 0.0])
    }

    #[test]
    fn degenerate_detection() {
        assert!(!floor().is_degenerate());
        let sliver = make_triangle([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
        assert!(sliver.is_degenerate());
        assert!(sliver.plane().is_none());
        assert!(sliver.unit_normal().is_none());
    }

    #[test]
    fn ray_hits_inside_segment() {
        let tri = floor();
        let t = tri
            .intersects_ray(Point3::new(1.0, 1.0, 1.0), Vector3::new(0.0, -2.0, 0.0), 1.0)
            .unwrap();
        assert_relative_eq!(t, 0.5);
    }

    #[test]
    fn ray_misses_beyond_max() {
        let tri = floor();
        let hit = tri.intersects_ray(Point3::new(1.0, 1.0, 1.0), Vector3::new(0.0, -2.0, 0.0), 0.4);
        assert!(hit.is_none());
    }

    #[test]
    fn ray_misses_outside_triangle() {
        let tri = floor();
        let hit = tri.intersects_ray(Point3::new(5.0, 1.0, 5.0), Vector3::new(0.0, -2.0, 0.0), 1.0);
        assert!(hit.is_none());
    }

    #[test]
    fn parallel_ray_misses() {
        let tri = floor();
        let hit = tri.intersects_ray(Point3::new(-1.0, 0.0, 1.0), Vector3::new(5.0, 0.0, 0.0), 1.0);
        assert!(hit.is_none());
    }

    #[test]
    fn crossing_triangles_intersect() {
        let wall = make_triangle([1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [1.0, -1.0, -1.0]);
        assert!(floor().intersects_triangle(&wall));
        assert!(wall.intersects_triangle(&floor()));
    }

    #[test]
    fn separated_triangles_do_not_intersect() {
        let above = make_triangle([0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 0.0]);
        assert!(!floor().intersects_triangle(&above));

        let wall_outside = make_triangle([9.0, -1.0, 1.0], [9.0, 1.0, 1.0], [9.0, -1.0, -1.0]);
        assert!(!floor().intersects_triangle(&wall_outside));
    }

    #[test]
    fn coplanar_triangles() {
        let overlapping = make_triangle([1.0, 0.0, 1.0], [1.0, 0.0, 2.0], [2.0, 0.0, 1.0]);
        assert!(floor().intersects_triangle(&overlapping));

        let apart = make_triangle([10.0, 0.0, 10.0], [10.0, 0.0, 11.0], [11.0, 0.0, 10.0]);
        assert!(!floor().intersects_triangle(&apart));
    }

    #[test]
    fn sweep_through_floor() {
        let body = make_triangle([1.0, 1.0, 1.0], [1.0, 1.0, 1.5], [1.5, 1.0, 1.0]);
        assert!(floor().intersects_swept(&body, Vector3::new(0.0, -2.0, 0.0)));
        assert!(!floor().intersects_swept(&body, Vector3::new(0.0, -0.5, 0.0)));
        assert!(!floor().intersects_swept(&body, Vector3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn sweep_beside_floor_misses() {
        let body = make_triangle([8.0, 1.0, 8.0], [8.0, 1.0, 8.5], [8.5, 1.0, 8.0]);
        assert!(!floor().intersects_swept(&body, Vector3::new(0.0, -2.0, 0.0)));
    }

    #[test]
    fn sweep_parallel_to_wall() {
        // A wall in the x = 1 plane, swept past by a triangle moving along z.
        let wall = make_triangle([1.0, 0.0, 0.0], [1.0, 2.0, 0.0], [1.0, 0.0, 2.0]);
        let body = make_triangle([0.5, 0.5, -2.0], [1.5, 0.5, -2.0], [1.0, 1.0, -2.0]);
        assert!(wall.intersects_swept(&body, Vector3::new(0.0, 0.0, 3.0)));
        assert!(!wall.intersects_swept(&body, Vector3::new(0.0, 0.0, 1.0)));

        let far_body = make_triangle([5.5, 0.5, -2.0], [6.5, 0.5, -2.0], [6.0, 1.0, -2.0]);
        assert!(!wall.intersects_swept(&far_body, Vector3::new(0.0, 0.0, 3.0)));
    }

    #[test]
    fn bounce_reflects_normal_component() {
        let tri = floor();
        let v = Vector3::new(1.0, -2.0, 0.0);
        let full = tri.bounce(v, 1.0);
        assert_relative_eq!(full, Vector3::new(1.0, 2.0, 0.0), epsilon = 1e-6);
        let slide = tri.bounce(v, 0.0);
        assert_relative_eq!(slide, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn project_onto_edges() {
        let tri = make_triangle([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 2.0]);
        let p = tri.project(Point3::new(1.0, 5.0, 0.5));
        assert_relative_eq!(p, Vector2::new(0.5, 0.25), epsilon = 1e-6);
    }
}
