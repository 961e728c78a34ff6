//! Device and input poses expressed in a frame of reference.
//!
//! [`PoseQueryEngine`] answers per-tick pose queries from the latest
//! [`TrackingSample`].  A query against the *null frame* (`None`) always
//! answers with identity, whatever the tracking state.  Transient tracking
//! loss is `Ok(None)`, never an error.

use xrspace_geometry::{Matrix4, RigidTransform};
use xrspace_tracking::{SpatialRootRegistry, TrackingSample};
use xrspace_types::{FrameError, FrameId, Handedness, InputSourceId, TargetRayMode};

use crate::frame::FrameTable;
use crate::resolver::CoordinateSystemResolver;

/// Viewer pose in a frame of reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePose {
    /// `T_frame_viewer`.
    pub transform: RigidTransform,
    /// `true` when the position was estimated rather than tracked.
    pub emulated_position: bool,
}

impl DevicePose {
    /// Pose reported for the null frame.
    pub fn identity() -> Self {
        Self {
            transform: RigidTransform::identity(),
            emulated_position: false,
        }
    }

    /// The pose as a column-major matrix.
    pub fn pose_matrix(&self) -> Matrix4 {
        self.transform.to_matrix()
    }

    /// The view matrix: the inverse of the pose matrix.
    pub fn view_matrix(&self) -> Matrix4 {
        self.transform.inverse().to_matrix()
    }
}

/// Input-source pose in a frame of reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputPose {
    pub handedness: Handedness,
    pub target_ray_mode: TargetRayMode,
    /// Ray origin, pointing down −Z.
    pub target_ray: RigidTransform,
    /// Grip pose, for sources that can be held.
    pub grip: Option<RigidTransform>,
    pub emulated_position: bool,
}

impl InputPose {
    pub fn target_ray_matrix(&self) -> Matrix4 {
        self.target_ray.to_matrix()
    }

    pub fn grip_matrix(&self) -> Option<Matrix4> {
        self.grip.map(RigidTransform::to_matrix)
    }
}

/// Answers pose queries for one tick.
#[derive(Debug, Clone, Copy)]
pub struct PoseQueryEngine<'a> {
    resolver: CoordinateSystemResolver<'a>,
    frames: &'a FrameTable,
    sample: &'a TrackingSample,
}

impl<'a> PoseQueryEngine<'a> {
    pub fn new(
        registry: &'a SpatialRootRegistry,
        frames: &'a FrameTable,
        sample: &'a TrackingSample,
    ) -> Self {
        Self {
            resolver: CoordinateSystemResolver::new(registry, frames),
            frames,
            sample,
        }
    }

    /// Viewer pose in `frame`, or identity for the null frame.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidFrame`] for frames that do not belong to the
    /// session.
    pub fn device_pose(&self, frame: Option<FrameId>) -> Result<Option<DevicePose>, FrameError> {
        let Some(id) = frame else {
            return Ok(Some(DevicePose::identity()));
        };
        let frame = self.frames.get(id).ok_or(FrameError::InvalidFrame(id))?;
        let Some(viewer) = self.sample.viewer else {
            return Ok(None);
        };
        let emulated = viewer.emulated_position || frame.is_position_disabled();
        Ok(self
            .resolver
            .express_in_frame(viewer.pose, id)?
            .map(|transform| DevicePose {
                transform,
                emulated_position: emulated,
            }))
    }

    /// Pose of input source `input` in `frame`, or identity for the null
    /// frame.
    ///
    /// # Errors
    ///
    /// [`FrameError::UnknownInputSource`] when the source is not enumerated
    /// this tick; [`FrameError::InvalidFrame`] for foreign frames.
    pub fn input_pose(
        &self,
        input: &InputSourceId,
        frame: Option<FrameId>,
    ) -> Result<Option<InputPose>, FrameError> {
        let sample = self
            .sample
            .input(input)
            .ok_or_else(|| FrameError::UnknownInputSource(input.clone()))?;

        let Some(id) = frame else {
            return Ok(Some(InputPose {
                handedness: sample.handedness,
                target_ray_mode: sample.target_ray_mode,
                target_ray: RigidTransform::identity(),
                grip: sample.grip.map(|_| RigidTransform::identity()),
                emulated_position: sample.emulated_position,
            }));
        };
        let frame = self.frames.get(id).ok_or(FrameError::InvalidFrame(id))?;
        let Some(ray) = sample.target_ray else {
            return Ok(None);
        };
        let Some(target_ray) = self.resolver.express_in_frame(ray, id)? else {
            return Ok(None);
        };
        let grip = match sample.grip {
            Some(grip) => self.resolver.express_in_frame(grip, id)?,
            None => None,
        };
        Ok(Some(InputPose {
            handedness: sample.handedness,
            target_ray_mode: sample.target_ray_mode,
            target_ray,
            grip,
            emulated_position: sample.emulated_position || frame.is_position_disabled(),
        }))
    }
}
