//! `xrspace-tracking` – the boundary to the tracking layer.
//!
//! Everything the reference-frame subsystem knows about hardware arrives
//! through this crate.  The rest of the workspace only talks to the traits
//! and the registry, so drivers can be swapped without touching negotiation
//! or pose logic.
//!
//! # Modules
//!
//! - [`root`] – [`SpatialRoot`][root::SpatialRoot]: an independently-tracked
//!   coordinate system and its optional platform stage.
//! - [`source`] – [`TrackingSource`][source::TrackingSource]: per-tick
//!   sampling of roots, viewer and input sources.
//! - [`registry`] – [`SpatialRootRegistry`][registry::SpatialRootRegistry]:
//!   the set of live roots and the derived
//!   [`TrackingCapability`][capability::TrackingCapability].
//! - [`capability`] – the availability matrix per session mode.
//! - [`platform`] – [`TrackingPlatform`][platform::TrackingPlatform] and
//!   [`FloorSelector`][platform::FloorSelector] for hardware-dependent
//!   negotiation, plus the RAII [`HardwareLease`][platform::HardwareLease].
//! - [`neck_model`] – position estimation for orientation-only hardware.
//! - [`sim`] – simulated hardware for tests and headless runs.

pub mod capability;
pub mod neck_model;
pub mod platform;
pub mod registry;
pub mod root;
pub mod sim;
pub mod source;

pub use capability::TrackingCapability;
pub use neck_model::NeckModel;
pub use platform::{
    FixedFloorSelector, FloorSelector, HardwareLease, NoPlatform, PlatformGrant, TrackingPlatform,
};
pub use registry::SpatialRootRegistry;
pub use root::{RootKind, SpatialRoot, StageGeometry};
pub use sim::{SimPlatform, SimTrackingSource, SimTrackingSourceBuilder};
pub use source::{InputSample, TrackingSample, TrackingSource, ViewerSample};
