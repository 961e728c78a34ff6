//! Generic `TrackingSource` trait for headsets, phones and any device that
//! samples spatial data once per render tick.
//!
//! Drivers implement this trait and hand it to a session.  The subsystem
//! treats every sample as read-only input; it never writes back into the
//! tracking layer.

use xrspace_geometry::RigidTransform;
use xrspace_types::{FrameError, Handedness, InputSourceId, TargetRayMode, TrackingQuality};

use crate::root::SpatialRoot;

/// Viewer (head) pose for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerSample {
    /// Pose in tracking-system internal space.
    pub pose: RigidTransform,
    /// `true` when the position was estimated (e.g. neck-modelled) rather
    /// than tracked.
    pub emulated_position: bool,
}

/// One input source for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSample {
    pub id: InputSourceId,
    pub handedness: Handedness,
    pub target_ray_mode: TargetRayMode,
    /// Target ray origin and direction (−Z) in internal space; `None` while
    /// the source is enumerated but not currently tracked.
    pub target_ray: Option<RigidTransform>,
    /// Grip pose in internal space, for sources that can be held.
    pub grip: Option<RigidTransform>,
    pub emulated_position: bool,
}

/// Everything the tracking layer reports for a single tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingSample {
    /// Current state of every root the source knows about.
    pub roots: Vec<SpatialRoot>,
    /// `None` while the viewer cannot be located.
    pub viewer: Option<ViewerSample>,
    pub inputs: Vec<InputSample>,
}

impl TrackingSample {
    pub fn input(&self, id: &InputSourceId) -> Option<&InputSample> {
        self.inputs.iter().find(|i| &i.id == id)
    }
}

/// A device that produces [`TrackingSample`]s.
pub trait TrackingSource: Send {
    /// Stable identifier for this source, e.g. `"sim_headset"`.
    fn id(&self) -> &str;

    /// Quality class of the hardware, known without starting it.
    fn quality(&self) -> TrackingQuality;

    /// The roots this hardware exposes, known without starting it.  Poses
    /// may be stale or absent until the first sample.
    fn describe_roots(&self) -> Vec<SpatialRoot>;

    /// Power up the tracking hardware.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Hardware`] if the device cannot be started.
    fn start(&mut self) -> Result<(), FrameError>;

    /// Power down the tracking hardware.  Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Sample the hardware for render tick `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Hardware`] when the device is not running or the
    /// read fails.
    fn sample(&mut self, tick: u64) -> Result<TrackingSample, FrameError>;
}
