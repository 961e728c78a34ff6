//! `xrspace-core` – frames of reference and everything that moves them.
//!
//! This crate holds the logic of the subsystem; it owns no hardware and no
//! threads.  `xrspace-runtime` drives it once per render tick.
//!
//! # Modules
//!
//! - [`frame`] – [`FrameOfReference`][frame::FrameOfReference], the
//!   per-session [`FrameTable`][frame::FrameTable] and the
//!   [`OriginPolicy`][frame::OriginPolicy] that places origins.
//! - [`negotiator`] – [`Negotiator`][negotiator::Negotiator]: ordered
//!   fallback negotiation of frame-of-reference options, cancellable by
//!   session close.
//! - [`resolver`] – [`CoordinateSystemResolver`][resolver::CoordinateSystemResolver]:
//!   on-demand relative transforms between roots and frames.
//! - [`pose`] – [`PoseQueryEngine`][pose::PoseQueryEngine]: device and input
//!   poses in a frame, including the null frame.
//! - [`reset`] – [`ResetCoordinator`][reset::ResetCoordinator]: discontinuity
//!   detection, ordered reset delivery and drift correction.

pub mod frame;
pub mod negotiator;
pub mod pose;
pub mod reset;
pub mod resolver;

pub use frame::{FrameKind, FrameOfReference, FrameTable, OriginPolicy, OriginSource};
pub use negotiator::{NegotiationContext, Negotiator};
pub use pose::{DevicePose, InputPose, PoseQueryEngine};
pub use reset::{
    DriftPolicy, NoDriftCorrection, ResetCoordinator, ResetListener, ResetPolicy, ResetState,
    StepDriftCorrection,
};
pub use resolver::{CoordinateSystem, CoordinateSystemResolver};
