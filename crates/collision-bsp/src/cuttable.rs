//! Cutting geometry by a partition plane.

use crate::plane::{Plane3D, Side};
use crate::polygon::WorldPolygon;
use crate::triangle::WorldTriangle;

/// Trait for geometry that can be cut by a plane.
pub trait Cuttable {
    /// Cuts the geometry by a plane.
    ///
    /// Returns `(front, back)`:
    /// - **Front** or **On**: `(Some(self), None)`
    /// - **Back**: `(None, Some(self))`
    /// - **Both**: the two clipped parts, either of which may vanish when
    ///   the straddling portion is thinner than the tolerance band.
    fn cut(&self, plane: &Plane3D) -> (Option<WorldPolygon>, Option<WorldPolygon>);
}

impl Cuttable for WorldPolygon {
    fn cut(&self, plane: &Plane3D) -> (Option<WorldPolygon>, Option<WorldPolygon>) {
        match self.which_side(plane) {
            Side::Front | Side::On => (Some(self.clone()), None),
            Side::Back => (None, Some(self.clone())),
            Side::Both => {
                let (front, back) = self.split(plane);
                (
                    (!front.is_empty()).then_some(front),
                    (!back.is_empty()).then_some(back),
                )
            }
        }
    }
}

impl Cuttable for WorldTriangle {
    fn cut(&self, plane: &Plane3D) -> (Option<WorldPolygon>, Option<WorldPolygon>) {
        WorldPolygon::from(self).cut(plane)
    }
}

/// Front and back fragments of a triangle split by a plane.
#[derive(Debug, Default)]
pub struct Fragments {
    pub front: Vec<WorldTriangle>,
    pub back: Vec<WorldTriangle>,
}

impl Fragments {
    pub fn len(&self) -> usize {
        self.front.len() + self.back.len()
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_empty() && self.back.is_empty()
    }
}

/// Splits a straddling triangle into triangles on either side of `plane`.
///
/// Each fragment inherits the parent's flags. Degenerate fragments are
/// dropped, so a triangle whose straddling part is a sliver may come back
/// with fragments on one side only.
pub fn split_triangle(triangle: &WorldTriangle, plane: &Plane3D) -> Fragments {
    let (front, back) = triangle.cut(plane);
    let flags = triangle.flags();

    let fan = |poly: Option<WorldPolygon>| -> Vec<WorldTriangle> {
        poly.map(|p| {
            p.triangulate()
                .map(|[a, b, c]| WorldTriangle::with_flags(a, b, c, flags))
                .filter(|t| !t.is_degenerate())
                .collect()
        })
        .unwrap_or_default()
    };

    Fragments {
        front: fan(front),
        back: fan(back),
    }
}
