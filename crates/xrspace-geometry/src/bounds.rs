//! Play-area polygon of a bounded frame of reference.
//!
//! Points live on the floor plane of the frame (`y == 0`, `w == 1`) and are
//! ordered clockwise when viewed from +Y looking toward −Y.  The loop is
//! implied: the first point is never repeated at the end.
//!
//! Seen from above with +X to the right and −Z pointing up the page, a
//! clockwise walk has a positive signed area in the `(x, z)` plane, which is
//! what [`BoundsGeometry::from_floor_points`] normalises to.

use thiserror::Error;

/// Errors raised when a play-area outline cannot form a valid polygon.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Bounds need at least 3 distinct points, got {0}")]
    TooFewPoints(usize),
    #[error("Bounds polygon has zero area")]
    Degenerate,
}

/// A homogeneous floor point of a bounds polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Point4 {
    /// A point on the floor plane.
    pub fn on_floor(x: f32, z: f32) -> Self {
        Self {
            x,
            y: 0.0,
            z,
            w: 1.0,
        }
    }
}

/// Ordered, clockwise, implicitly-closed floor polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsGeometry {
    points: Vec<Point4>,
}

impl BoundsGeometry {
    /// Build bounds from `(x, z)` floor coordinates in any winding order.
    ///
    /// Consecutive duplicates and an explicit closing point are dropped, and
    /// counter-clockwise input is reversed.
    ///
    /// # Errors
    ///
    /// [`BoundsError::TooFewPoints`] when fewer than three distinct points
    /// remain, [`BoundsError::Degenerate`] when they are collinear.
    pub fn from_floor_points(points: &[(f32, f32)]) -> Result<Self, BoundsError> {
        let mut pts: Vec<Point4> = Vec::with_capacity(points.len());
        for &(x, z) in points {
            let p = Point4::on_floor(x, z);
            if pts.last() != Some(&p) {
                pts.push(p);
            }
        }
        while pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }
        if pts.len() < 3 {
            return Err(BoundsError::TooFewPoints(pts.len()));
        }

        let area = signed_area_xz(&pts);
        if area.abs() <= f32::EPSILON {
            return Err(BoundsError::Degenerate);
        }
        if area < 0.0 {
            pts.reverse();
        }
        Ok(Self { points: pts })
    }

    /// Axis-aligned square of the given half extent centred on the origin.
    pub fn square(half_extent: f32) -> Result<Self, BoundsError> {
        let h = half_extent.abs();
        Self::from_floor_points(&[(-h, -h), (h, -h), (h, h), (-h, h)])
    }

    /// The polygon vertices in clockwise order.
    pub fn points(&self) -> &[Point4] {
        &self.points
    }

    /// `true` when the vertices wind clockwise seen from above.
    pub fn is_clockwise(&self) -> bool {
        signed_area_xz(&self.points) > 0.0
    }

    /// Floor area enclosed by the polygon, in square meters.
    pub fn area(&self) -> f32 {
        signed_area_xz(&self.points).abs()
    }

    /// Even-odd containment test for a floor position.
    pub fn contains(&self, x: f32, z: f32) -> bool {
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let (pi, pj) = (self.points[i], self.points[j]);
            if (pi.z > z) != (pj.z > z) && x < (pj.x - pi.x) * (z - pi.z) / (pj.z - pi.z) + pi.x {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Shoelace sum over `(x, z)`; positive for clockwise-from-above winding.
fn signed_area_xz(points: &[Point4]) -> f32 {
    let n = points.len();
    let twice: f32 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.z - b.x * a.z
        })
        .sum();
    twice * 0.5
}
