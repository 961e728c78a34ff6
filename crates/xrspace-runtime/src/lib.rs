//! `xrspace-runtime` – sessions that drive the reference-frame subsystem.
//!
//! # Modules
//!
//! - [`session`] – [`XrSession`][session::XrSession]: owns the tracking
//!   source, the root registry and every frame of reference, and runs the
//!   per-tick sample → register → detect → deliver cycle.  A
//!   [`SessionCloser`][session::SessionCloser] cancels pending negotiations
//!   from outside.
//! - [`config`] – [`SessionConfig`][config::SessionConfig]: eye height,
//!   polyfill extent, reset thresholds and drift correction, all with serde
//!   defaults.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod config;
pub mod session;
pub mod telemetry;

pub use config::{DriftConfig, ResetConfig, SessionConfig};
pub use session::{SessionBuilder, SessionCloser, TickReport, XrSession};
pub use telemetry::{LogFormat, TelemetryConfig, TracerProviderGuard, init_tracing};

// Frames, poses and coordinate systems are part of the session API.
pub use xrspace_core::{
    CoordinateSystem, DevicePose, FrameKind, FrameOfReference, InputPose, ResetListener,
    ResetState,
};
