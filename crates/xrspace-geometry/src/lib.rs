//! `xrspace-geometry` – rigid-body math for reference frames.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3],
//!   [`Quaternion`][transform::Quaternion],
//!   [`RigidTransform`][transform::RigidTransform] and the column-major
//!   [`Matrix4`][transform::Matrix4] handed to applications.
//! - [`bounds`] – [`BoundsGeometry`][bounds::BoundsGeometry]: the clockwise,
//!   floor-level play-area polygon of a bounded frame of reference.

pub mod bounds;
pub mod transform;

pub use bounds::{BoundsError, BoundsGeometry, Point4};
pub use transform::{Matrix4, Quaternion, RigidTransform, Vec3};
