//! Rigid-body transforms between coordinate systems.
//!
//! All positions are in meters in a right-handed, Y-up space where the
//! viewer's forward direction is −Z.  A [`RigidTransform`] is the pose of a
//! child coordinate system expressed in its parent: to convert a point given
//! in the child into the parent, rotate it by `rotation` then add
//! `translation`.
//!
//! # Example
//!
//! ```rust
//! use xrspace_geometry::transform::{Quaternion, RigidTransform, Vec3};
//!
//! // A root 2 m ahead of the tracking origin.
//! let internal_root = RigidTransform::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity());
//! // A frame origin 1.6 m above that root.
//! let root_origin = RigidTransform::new(Vec3::new(0.0, 1.6, 0.0), Quaternion::identity());
//!
//! let internal_origin = internal_root.compose(root_origin);
//! assert!((internal_origin.translation.y - 1.6).abs() < 1e-5);
//! assert!((internal_origin.translation.z + 2.0).abs() < 1e-5);
//!
//! let back = internal_origin.inverse().compose(internal_origin);
//! assert!(back.approx_eq(&RigidTransform::identity(), 1e-5));
//! ```

use std::fmt;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// The world up axis.
    pub fn up() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn neg(self) -> Self {
        self.scale(-1.0)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f32 {
        self.sub(other).length()
    }

    pub fn approx_eq(self, other: Self, eps: f32) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` around the unit vector `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        let half = angle_rad * 0.5;
        let s = half.sin();
        Self::new(half.cos(), axis.x * s, axis.y * s, axis.z * s)
    }

    /// Heading rotation of `yaw_rad` around +Y.
    pub fn from_yaw(yaw_rad: f32) -> Self {
        Self::from_axis_angle(Vec3::up(), yaw_rad)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rescale to unit length.  Degenerate input yields the identity.
    pub fn normalize(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if n <= f32::EPSILON {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Heading around +Y of the rotated forward (−Z) axis, in radians.
    pub fn yaw(self) -> f32 {
        let forward = self.rotate(Vec3::new(0.0, 0.0, -1.0));
        (-forward.x).atan2(-forward.z)
    }

    /// The gravity-aligned part of this rotation (heading only).
    pub fn yaw_only(self) -> Self {
        Self::from_yaw(self.yaw())
    }

    /// Smallest angle in radians that rotates `self` onto `other`.
    pub fn angle_to(self, other: Self) -> f32 {
        let d = self.conjugate().mul(other);
        2.0 * d.w.abs().min(1.0).acos()
    }

    /// `true` when both quaternions describe the same rotation within `eps`
    /// (q and −q are treated as equal).
    pub fn approx_eq(self, other: Self, eps: f32) -> bool {
        let same = (self.w - other.w).abs() <= eps
            && (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps;
        let flipped = (self.w + other.w).abs() <= eps
            && (self.x + other.x).abs() <= eps
            && (self.y + other.y).abs() <= eps
            && (self.z + other.z).abs() <= eps;
        same || flipped
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RigidTransform
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Represents the pose of frame B relative to frame A (`T_A_B`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidTransform {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl RigidTransform {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// A pure translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quaternion::identity())
    }

    /// Compose two transforms: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation).normalize();
        Self::new(translated, rotated)
    }

    /// The inverse transform: T_A_B → T_B_A.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        Self::new(inv_rot.rotate(self.translation).neg(), inv_rot)
    }

    /// Map a point expressed in the child frame into the parent frame.
    pub fn transform_point(self, p: Vec3) -> Vec3 {
        self.translation.add(self.rotation.rotate(p))
    }

    /// Same rotation, translation removed.
    pub fn without_translation(self) -> Self {
        Self::new(Vec3::zero(), self.rotation)
    }

    /// Same position, rotation reduced to its heading around +Y.
    pub fn gravity_aligned(self) -> Self {
        Self::new(self.translation, self.rotation.yaw_only())
    }

    /// The column-major homogeneous matrix of this transform.
    pub fn to_matrix(self) -> Matrix4 {
        Matrix4::from_rigid(self)
    }

    pub fn approx_eq(&self, other: &Self, eps: f32) -> bool {
        self.translation.approx_eq(other.translation, eps)
            && self.rotation.approx_eq(other.rotation, eps)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matrix4
// ────────────────────────────────────────────────────────────────────────────

/// A column-major 4×4 homogeneous matrix, laid out the way graphics APIs
/// expect (`m[col * 4 + row]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    pub m: [f32; 16],
}

impl Matrix4 {
    /// The 4×4 identity matrix.
    pub fn identity() -> Self {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        Self { m }
    }

    /// Build the matrix of a rigid transform.
    pub fn from_rigid(t: RigidTransform) -> Self {
        let RigidTransform {
            translation: p,
            rotation: q,
        } = t;
        let (w, x, y, z) = (q.w, q.x, q.y, q.z);
        Self {
            m: [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y + w * z),
                2.0 * (x * z - w * y),
                0.0,
                2.0 * (x * y - w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z + w * x),
                0.0,
                2.0 * (x * z + w * y),
                2.0 * (y * z - w * x),
                1.0 - 2.0 * (x * x + y * y),
                0.0,
                p.x,
                p.y,
                p.z,
                1.0,
            ],
        }
    }

    /// Element at `row`, `col`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[col * 4 + row]
    }

    /// The translation column.
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.m[12], self.m[13], self.m[14])
    }

    /// Matrix product `self * rhs`.
    pub fn mul(&self, rhs: &Self) -> Self {
        let mut out = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| self.get(row, k) * rhs.get(k, col)).sum();
            }
        }
        Self { m: out }
    }

    /// Apply to a point (w = 1).
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            self.get(0, 0) * p.x + self.get(0, 1) * p.y + self.get(0, 2) * p.z + self.get(0, 3),
            self.get(1, 0) * p.x + self.get(1, 1) * p.y + self.get(1, 2) * p.z + self.get(1, 3),
            self.get(2, 0) * p.x + self.get(2, 1) * p.y + self.get(2, 2) * p.z + self.get(2, 3),
        )
    }

    pub fn approx_eq(&self, other: &Self, eps: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    // ── Quaternion ──────────────────────────────────────────────────────────

    #[test]
    fn quaternion_identity_rotate_is_noop() {
        let r = Quaternion::identity().rotate(Vec3::new(1.0, 2.0, 3.0));
        assert!(r.approx_eq(Vec3::new(1.0, 2.0, 3.0), 1e-5));
    }

    #[test]
    fn quarter_yaw_turns_forward_to_left() {
        // +90° around +Y turns −Z (forward) into −X (left).
        let q = Quaternion::from_yaw(FRAC_PI_2);
        let r = q.rotate(Vec3::new(0.0, 0.0, -1.0));
        assert!(r.approx_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5), "got {r}");
    }

    #[test]
    fn yaw_roundtrips_through_from_yaw() {
        let q = Quaternion::from_yaw(0.7);
        assert!((q.yaw() - 0.7).abs() < 1e-5);
    }

    #[test]
    fn yaw_only_strips_pitch() {
        let pitch = Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), FRAC_PI_4);
        let q = Quaternion::from_yaw(0.3).mul(pitch);
        let flat = q.yaw_only();
        assert!(flat.approx_eq(Quaternion::from_yaw(0.3), 1e-5));
    }

    #[test]
    fn angle_to_measures_relative_rotation() {
        let a = Quaternion::from_yaw(0.1);
        let b = Quaternion::from_yaw(0.6);
        assert!((a.angle_to(b) - 0.5).abs() < 1e-4);
        assert!(a.angle_to(a) < 1e-3);
    }

    #[test]
    fn negated_quaternion_is_same_rotation() {
        let q = Quaternion::from_yaw(1.0);
        let neg = Quaternion::new(-q.w, -q.x, -q.y, -q.z);
        assert!(q.approx_eq(neg, 1e-6));
    }

    // ── RigidTransform ──────────────────────────────────────────────────────

    #[test]
    fn compose_translations_add() {
        let t1 = RigidTransform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let t2 = RigidTransform::from_translation(Vec3::new(2.0, 0.0, 0.0));
        assert!((t1.compose(t2).translation.x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn compose_respects_rotation() {
        // Parent turned 90° left; child 1 m ahead of it lands at −X.
        let parent = RigidTransform::new(Vec3::zero(), Quaternion::from_yaw(FRAC_PI_2));
        let child = RigidTransform::from_translation(Vec3::new(0.0, 0.0, -1.0));
        let t = parent.compose(child);
        assert!(t.translation.approx_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn inverse_composes_to_identity() {
        let t = RigidTransform::new(Vec3::new(0.3, 1.7, -2.0), Quaternion::from_yaw(1.2));
        assert!(t.compose(t.inverse()).approx_eq(&RigidTransform::identity(), 1e-5));
        assert!(t.inverse().compose(t).approx_eq(&RigidTransform::identity(), 1e-5));
    }

    #[test]
    fn gravity_aligned_keeps_position() {
        let pitch = Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.4);
        let t = RigidTransform::new(Vec3::new(1.0, 1.6, 0.0), pitch);
        let g = t.gravity_aligned();
        assert_eq!(g.translation, t.translation);
        assert!(g.rotation.approx_eq(Quaternion::identity(), 1e-5));
    }

    // ── Matrix4 ─────────────────────────────────────────────────────────────

    #[test]
    fn identity_transform_gives_identity_matrix() {
        assert!(RigidTransform::identity()
            .to_matrix()
            .approx_eq(&Matrix4::identity(), 1e-6));
    }

    #[test]
    fn matrix_is_column_major_with_translation_last() {
        let m = RigidTransform::from_translation(Vec3::new(1.0, 2.0, 3.0)).to_matrix();
        assert_eq!(&m.m[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(m.translation(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn matrix_matches_rigid_point_transform() {
        let t = RigidTransform::new(Vec3::new(0.5, 0.0, -1.0), Quaternion::from_yaw(0.8));
        let p = Vec3::new(0.2, 1.0, 0.4);
        assert!(t
            .to_matrix()
            .transform_point(p)
            .approx_eq(t.transform_point(p), 1e-5));
    }

    #[test]
    fn matrix_product_matches_compose() {
        let a = RigidTransform::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::from_yaw(0.4));
        let b = RigidTransform::new(Vec3::new(0.0, 2.0, -1.0), Quaternion::from_yaw(-1.1));
        let via_matrix = a.to_matrix().mul(&b.to_matrix());
        assert!(via_matrix.approx_eq(&a.compose(b).to_matrix(), 1e-5));
    }
}
