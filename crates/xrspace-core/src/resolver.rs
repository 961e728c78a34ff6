//! [`CoordinateSystemResolver`] – relative transforms between coordinate
//! systems, computed on demand.
//!
//! Every spatial root and every frame of reference can be located in the
//! tracking system's internal space:
//!
//! ```text
//! T_internal_root            = root.pose
//! T_internal_frame           = T_internal_root ∘ T_root_origin
//! transform_between(a, b)    = inverse(T_internal_b) ∘ T_internal_a
//! ```
//!
//! Nothing is cached: a reset or a root moving between ticks is picked up by
//! the very next query.  When a position-disabled frame is on either side the
//! translation of the result is dropped.

use xrspace_geometry::RigidTransform;
use xrspace_tracking::SpatialRootRegistry;
use xrspace_types::{FrameError, FrameId, SpatialRootId};

use crate::frame::FrameTable;

/// Anything that has a pose in internal space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    Root(SpatialRootId),
    Frame(FrameId),
}

impl From<FrameId> for CoordinateSystem {
    fn from(id: FrameId) -> Self {
        CoordinateSystem::Frame(id)
    }
}

impl From<SpatialRootId> for CoordinateSystem {
    fn from(id: SpatialRootId) -> Self {
        CoordinateSystem::Root(id)
    }
}

/// Read-only view over one session's roots and frames.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateSystemResolver<'a> {
    registry: &'a SpatialRootRegistry,
    frames: &'a FrameTable,
}

impl<'a> CoordinateSystemResolver<'a> {
    pub fn new(registry: &'a SpatialRootRegistry, frames: &'a FrameTable) -> Self {
        Self { registry, frames }
    }

    /// Pose of `cs` in internal space; `Ok(None)` while it cannot be located.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidFrame`] or [`FrameError::RootNotFound`] for
    /// unknown identifiers.
    pub fn locate(&self, cs: &CoordinateSystem) -> Result<Option<RigidTransform>, FrameError> {
        match cs {
            CoordinateSystem::Root(id) => {
                let root = self
                    .registry
                    .get(id)
                    .ok_or_else(|| FrameError::RootNotFound(id.clone()))?;
                Ok(root.pose.filter(|_| root.is_tracked()))
            }
            CoordinateSystem::Frame(id) => {
                let frame = self.frames.get(*id).ok_or(FrameError::InvalidFrame(*id))?;
                let origin = frame.origin();
                Ok(self
                    .registry
                    .get(frame.root())
                    .filter(|root| root.is_tracked())
                    .and_then(|root| root.pose)
                    .map(|pose| pose.compose(origin)))
            }
        }
    }

    /// Transform mapping coordinates in `from` into coordinates in `to`.
    ///
    /// # Errors
    ///
    /// Same as [`locate`][Self::locate].
    pub fn transform_between(
        &self,
        from: &CoordinateSystem,
        to: &CoordinateSystem,
    ) -> Result<Option<RigidTransform>, FrameError> {
        let strip = self.is_position_disabled(from) || self.is_position_disabled(to);
        let (Some(from_pose), Some(to_pose)) = (self.locate(from)?, self.locate(to)?) else {
            return Ok(None);
        };
        let relative = to_pose.inverse().compose(from_pose);
        Ok(Some(if strip {
            relative.without_translation()
        } else {
            relative
        }))
    }

    /// `pose` (internal space) expressed in frame `id`.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidFrame`] for unknown frames.
    pub fn express_in_frame(
        &self,
        pose: RigidTransform,
        id: FrameId,
    ) -> Result<Option<RigidTransform>, FrameError> {
        let cs = CoordinateSystem::Frame(id);
        let strip = self.is_position_disabled(&cs);
        Ok(self.locate(&cs)?.map(|frame_pose| {
            let local = frame_pose.inverse().compose(pose);
            if strip { local.without_translation() } else { local }
        }))
    }

    fn is_position_disabled(&self, cs: &CoordinateSystem) -> bool {
        match cs {
            CoordinateSystem::Frame(id) => self
                .frames
                .get(*id)
                .is_some_and(|frame| frame.is_position_disabled()),
            CoordinateSystem::Root(_) => false,
        }
    }
}
