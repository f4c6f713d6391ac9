//! Plane representation and the side classification shared by tree
//! construction and every query.

use nalgebra::{Point3, Vector3};

/// Distance from a plane within which a point counts as lying on it.
///
/// Construction and queries both classify against this value, so a triangle
/// placed on a node's plane at build time is found there at query time.
pub const TOLERANCE: f32 = 0.01;

/// Which side of a plane a single point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Front,
    Back,
    /// Within [`TOLERANCE`] of the plane.
    OnPlane,
}

/// Classification of a set of points (a triangle, polygon or swept volume)
/// relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Every point is within [`TOLERANCE`] of the plane.
    On,
    /// At least one point is in front and none is behind.
    Front,
    /// At least one point is behind and none is in front.
    Back,
    /// Points lie on both sides; the set straddles the plane.
    Both,
}

/// The range of signed distances of a point set from a plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    /// Classifies the point set this span was measured from.
    pub fn side(&self) -> Side {
        let front = self.max > TOLERANCE;
        let back = self.min < -TOLERANCE;

        match (front, back) {
            (false, false) => Side::On,
            (true, false) => Side::Front,
            (false, true) => Side::Back,
            (true, true) => Side::Both,
        }
    }

    /// True if some point may touch geometry stored in front of the plane.
    #[inline]
    pub fn reaches_front(&self) -> bool {
        self.max > -TOLERANCE
    }

    /// True if some point may touch geometry stored behind the plane.
    #[inline]
    pub fn reaches_back(&self) -> bool {
        self.min < TOLERANCE
    }

    /// True if the set may touch geometry lying on the plane itself.
    #[inline]
    pub fn touches_plane(&self) -> bool {
        self.reaches_front() && self.reaches_back()
    }
}

/// An oriented plane `normal · p = offset`.
///
/// Planes built here always carry a unit normal. Planes decoded from a file
/// keep whatever was stored and must pass [`Plane3D::is_valid`] to be used
/// for partitioning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    normal: Vector3<f32>,
    offset: f32,
}

impl Plane3D {
    /// Scales `normal` to unit length, dividing `offset` by the same factor.
    ///
    /// # Panics
    /// Panics on a zero normal.
    pub fn new(normal: Vector3<f32>, offset: f32) -> Self {
        let len = normal.norm();
        assert!(len > f32::EPSILON, "plane normal has zero length");
        Self {
            normal: normal / len,
            offset: offset / len,
        }
    }

    pub(crate) fn from_raw(normal: Vector3<f32>, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// Placeholder carried by unpartitioned nodes: `x = 0`.
    pub(crate) fn unpartitioned() -> Self {
        Self {
            normal: Vector3::x(),
            offset: 0.0,
        }
    }

    /// The plane through `point` facing along `normal`.
    ///
    /// # Panics
    /// Panics on a zero normal.
    pub fn from_point_and_normal(point: Point3<f32>, normal: Vector3<f32>) -> Self {
        let len = normal.norm();
        assert!(len > f32::EPSILON, "plane normal has zero length");
        let normal = normal / len;
        Self {
            normal,
            offset: normal.dot(&point.coords),
        }
    }

    /// The plane through three points, facing along `(b - a) × (c - a)`.
    ///
    /// `None` when the points are (nearly) collinear.
    pub fn try_from_three_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Option<Self> {
        let cross = (b - a).cross(&(c - a));
        let len = cross.norm();
        (len > f32::EPSILON).then(|| {
            let normal = cross / len;
            Self {
                normal,
                offset: normal.dot(&a.coords),
            }
        })
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Normal length within `(0.9, 1.1)`.
    pub fn is_valid(&self) -> bool {
        let len = self.normal.norm();
        0.9 < len && len < 1.1
    }

    /// Positive in front of the plane, negative behind it.
    #[inline]
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.offset
    }

    pub fn classify_point(&self, point: Point3<f32>) -> PlaneSide {
        let d = self.signed_distance(point);
        if d > TOLERANCE {
            PlaneSide::Front
        } else if d < -TOLERANCE {
            PlaneSide::Back
        } else {
            PlaneSide::OnPlane
        }
    }

    /// Signed distance range of `points`.
    ///
    /// No points give an inverted span, which classifies as [`Side::On`].
    pub fn span<I>(&self, points: I) -> Span
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        let empty = Span {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        };
        points.into_iter().fold(empty, |span, p| {
            let d = self.signed_distance(p);
            Span {
                min: span.min.min(d),
                max: span.max.max(d),
            }
        })
    }

    #[inline]
    pub fn which_side<I>(&self, points: I) -> Side
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        self.span(points).side()
    }

    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// The `t` at which `start + t * delta` meets the plane, unclamped.
    /// `None` for a `delta` parallel to the plane.
    pub fn crossing_fraction(&self, start: Point3<f32>, delta: Vector3<f32>) -> Option<f32> {
        let denom = self.normal.dot(&delta);
        if denom.abs() < f32::EPSILON {
            return None;
        }
        Some(-self.signed_distance(start) / denom)
    }

    /// Where the segment `start -> end` meets the plane, as the fraction
    /// along it and the point.
    pub fn intersect_segment(
        &self,
        start: Point3<f32>,
        end: Point3<f32>,
    ) -> Option<(f32, Point3<f32>)> {
        let delta = end - start;
        let t = self.crossing_fraction(start, delta)?;
        (0.0..=1.0)
            .contains(&t)
            .then(|| (t, start + delta * t))
    }
}
