//! Spatial roots: independently-tracked coordinate systems.
//!
//! Roots are created by the tracking layer, never by applications.  Their
//! pose is expressed relative to the tracking system's internal space and is
//! absent while the root cannot currently be located.

use xrspace_geometry::{BoundsGeometry, RigidTransform};
use xrspace_types::{SpatialRootId, TrackingQuality};

/// What kind of tracked entity a root stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// The hardware tracking volume itself.
    TrackingSystem,
    /// A platform anchor located by the tracking system.
    Anchor,
}

/// Platform-published room-scale stage of a tracking-system root.
#[derive(Debug, Clone, PartialEq)]
pub struct StageGeometry {
    /// Floor origin of the stage relative to the owning root.
    pub floor_origin: RigidTransform,
    /// Play area around `floor_origin`, in stage coordinates.
    pub bounds: BoundsGeometry,
}

/// An independently-tracked coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialRoot {
    pub id: SpatialRootId,
    pub kind: RootKind,
    /// Pose relative to tracking-system internal space; `None` while the root
    /// is transiently untrackable.
    pub pose: Option<RigidTransform>,
    pub quality: TrackingQuality,
    /// Bumped by the tracking layer every time it recenters this root.
    pub reset_epoch: u64,
    pub stage: Option<StageGeometry>,
}

impl SpatialRoot {
    /// A tracking-system root sitting at the internal origin.
    pub fn tracking_system(id: impl Into<String>, quality: TrackingQuality) -> Self {
        Self {
            id: SpatialRootId::new(id),
            kind: RootKind::TrackingSystem,
            pose: Some(RigidTransform::identity()),
            quality,
            reset_epoch: 0,
            stage: None,
        }
    }

    /// An anchor root at `pose` in internal space.
    pub fn anchor(id: impl Into<String>, pose: RigidTransform, quality: TrackingQuality) -> Self {
        Self {
            id: SpatialRootId::new(id),
            kind: RootKind::Anchor,
            pose: Some(pose),
            quality,
            reset_epoch: 0,
            stage: None,
        }
    }

    pub fn with_stage(mut self, stage: StageGeometry) -> Self {
        self.stage = Some(stage);
        self
    }

    /// `true` when the root can be located this tick.
    pub fn is_tracked(&self) -> bool {
        self.pose.is_some() && self.quality != TrackingQuality::None
    }

    /// Convert an internal-space pose into this root's space, if located.
    pub fn localize(&self, internal: RigidTransform) -> Option<RigidTransform> {
        if !self.is_tracked() {
            return None;
        }
        self.pose.map(|root| root.inverse().compose(internal))
    }
}
