//! Neck model for orientation-only hardware.
//!
//! Three-degree-of-freedom headsets only know which way the head points.  A
//! neck model turns that orientation into a plausible eye position by
//! rotating a fixed neck-to-eye offset around the neck pivot:
//!
//! ```text
//! eye = pivot + q · offset        with  pivot = rest_eye − offset
//! ```
//!
//! so that looking straight ahead places the eye exactly at `rest_eye`.
//! Positions produced this way are reported with `emulated_position = true`
//! and are valid output for floor-level and eye-level frames.
//!
//! # Example
//!
//! ```rust
//! use xrspace_geometry::{Quaternion, Vec3};
//! use xrspace_tracking::neck_model::NeckModel;
//!
//! let neck = NeckModel::default();
//! let rest = neck.eye_position(Quaternion::identity());
//! assert!(rest.approx_eq(neck.rest_eye, 1e-5));
//! ```

use xrspace_geometry::{Quaternion, RigidTransform, Vec3};

/// Fixed-offset neck model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeckModel {
    /// Eye position, in internal space, while looking straight ahead.
    pub rest_eye: Vec3,
    /// Offset from the neck pivot to the point between the eyes, in the
    /// head's local frame (up, and forward along −Z).
    pub neck_to_eye: Vec3,
}

impl Default for NeckModel {
    fn default() -> Self {
        Self {
            rest_eye: Vec3::zero(),
            neck_to_eye: Vec3::new(0.0, 0.075, -0.0805),
        }
    }
}

impl NeckModel {
    /// Create a model with a custom resting eye position and neck offset.
    pub fn new(rest_eye: Vec3, neck_to_eye: Vec3) -> Self {
        Self {
            rest_eye,
            neck_to_eye,
        }
    }

    /// Estimated eye position for head `orientation`.
    pub fn eye_position(&self, orientation: Quaternion) -> Vec3 {
        let pivot = self.rest_eye.sub(self.neck_to_eye);
        pivot.add(orientation.rotate(self.neck_to_eye))
    }

    /// Replace the position of `pose` by the neck-modelled estimate.
    pub fn apply(&self, pose: RigidTransform) -> RigidTransform {
        RigidTransform::new(self.eye_position(pose.rotation), pose.rotation)
    }
}
