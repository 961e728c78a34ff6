//! Frames of reference and the policy that places their origins.
//!
//! A [`FrameOfReference`] is an application-facing coordinate system derived
//! from one spatial root: its origin is a fixed offset (`T_root_origin`) from
//! that root.  The origin only moves on a reset (bounded and stationary
//! frames) or by drift correction (unbounded frames).
//!
//! [`OriginPolicy`] decides where an origin goes, both when a frame is
//! created and when it is realigned after a reset.

use tracing::debug;
use xrspace_geometry::{BoundsGeometry, RigidTransform, Vec3};
use xrspace_tracking::{HardwareLease, StageGeometry};
use xrspace_types::{FrameId, FrameOfReferenceOptions, SpatialRootId, StationarySubtype};

// ────────────────────────────────────────────────────────────────────────────
// Frame kinds
// ────────────────────────────────────────────────────────────────────────────

/// The type of a frame of reference, with any per-type data.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    /// Room-scale frame with a known play area.
    Bounded { bounds: BoundsGeometry },
    /// World-scale frame; never emits resets.
    Unbounded,
    /// The user is expected to stay near the origin.
    Stationary { subtype: StationarySubtype },
}

impl FrameKind {
    /// The request options that produce this kind.
    pub fn options(&self) -> FrameOfReferenceOptions {
        match self {
            FrameKind::Bounded { .. } => FrameOfReferenceOptions::Bounded,
            FrameKind::Unbounded => FrameOfReferenceOptions::Unbounded,
            FrameKind::Stationary { subtype } => FrameOfReferenceOptions::stationary(*subtype),
        }
    }
}

/// Where an origin is taken from, remembered so a reset can re-derive it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OriginSource {
    /// Floor origin of the root's stage.
    Stage,
    /// Origin fixed by the platform, relative to the root.
    Shared(RigidTransform),
    /// Under the viewer, at a floor height chosen by the floor selector.
    SelectedFloor(f32),
    /// Under the viewer, one emulated eye height below the head.
    EmulatedFloor,
    /// The viewer's gravity-aligned pose.
    Viewer,
}

// ────────────────────────────────────────────────────────────────────────────
// Origin policy
// ────────────────────────────────────────────────────────────────────────────

/// Parameters for placing frame origins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginPolicy {
    /// Assumed standing eye height when the floor is not known.
    pub emulated_eye_height_m: f32,
    /// Half extent of the square play area used by the bounded polyfill.
    pub polyfill_half_extent_m: f32,
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self {
            emulated_eye_height_m: 1.6,
            polyfill_half_extent_m: 1.0,
        }
    }
}

impl OriginPolicy {
    /// Origin (relative to the root) described by `source`.
    ///
    /// `viewer` is the viewer pose in the root's space.  Returns `None` when
    /// the source needs data that is not available right now.
    pub fn resolve(
        &self,
        source: OriginSource,
        viewer: Option<RigidTransform>,
        stage: Option<&StageGeometry>,
    ) -> Option<RigidTransform> {
        match source {
            OriginSource::Stage => stage.map(|s| s.floor_origin),
            OriginSource::Shared(origin) => Some(origin),
            OriginSource::SelectedFloor(floor_y) => viewer.map(|v| under(v, floor_y)),
            OriginSource::EmulatedFloor => viewer.map(|v| {
                let floor_y = v.translation.y - self.emulated_eye_height_m;
                under(v, floor_y)
            }),
            OriginSource::Viewer => viewer.map(RigidTransform::gravity_aligned),
        }
    }

    /// Viewer pose assumed when the real one cannot be located: standing
    /// on the root origin at the emulated eye height.
    pub fn fallback_viewer(&self) -> RigidTransform {
        RigidTransform::from_translation(Vec3::new(0.0, self.emulated_eye_height_m, 0.0))
    }

    /// Square play area used when the hardware has no stage; `None` when
    /// the configured extent is not positive.
    pub fn polyfill_bounds(&self) -> Option<BoundsGeometry> {
        BoundsGeometry::square(self.polyfill_half_extent_m).ok()
    }
}

/// Point on the floor at `floor_y` below `viewer`, facing the viewer's heading.
fn under(viewer: RigidTransform, floor_y: f32) -> RigidTransform {
    let heading = viewer.gravity_aligned();
    RigidTransform::new(
        Vec3::new(viewer.translation.x, floor_y, viewer.translation.z),
        heading.rotation,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// FrameOfReference
// ────────────────────────────────────────────────────────────────────────────

/// An application-facing coordinate system derived from a spatial root.
#[derive(Debug)]
pub struct FrameOfReference {
    id: FrameId,
    root: SpatialRootId,
    origin: RigidTransform,
    kind: FrameKind,
    source: OriginSource,
    /// Platform resources backing a hardware-dependent frame.
    lease: Option<HardwareLease>,
}

impl FrameOfReference {
    pub fn new(
        root: SpatialRootId,
        origin: RigidTransform,
        kind: FrameKind,
        source: OriginSource,
        lease: Option<HardwareLease>,
    ) -> Self {
        Self {
            id: FrameId::new_v4(),
            root,
            origin,
            kind,
            source,
            lease,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// The root this frame is derived from.
    pub fn root(&self) -> &SpatialRootId {
        &self.root
    }

    /// Current `T_root_origin`.
    pub fn origin(&self) -> RigidTransform {
        self.origin
    }

    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    pub fn source(&self) -> OriginSource {
        self.source
    }

    pub fn options(&self) -> FrameOfReferenceOptions {
        self.kind.options()
    }

    /// Play area, for bounded frames only.
    pub fn bounds(&self) -> Option<&BoundsGeometry> {
        match &self.kind {
            FrameKind::Bounded { bounds } => Some(bounds),
            _ => None,
        }
    }

    /// `true` for stationary position-disabled frames, whose reported
    /// positions are always zero.
    pub fn is_position_disabled(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::Stationary {
                subtype: StationarySubtype::PositionDisabled
            }
        )
    }

    /// Bounded and stationary frames are realigned with a notification;
    /// unbounded frames never are.
    pub fn emits_resets(&self) -> bool {
        !matches!(self.kind, FrameKind::Unbounded)
    }

    pub fn lease(&self) -> Option<&HardwareLease> {
        self.lease.as_ref()
    }

    /// Commit a realigned origin (and, for bounded frames, new bounds).
    pub(crate) fn realign(&mut self, origin: RigidTransform, bounds: Option<BoundsGeometry>) {
        self.origin = origin;
        if let (FrameKind::Bounded { bounds: current }, Some(new)) = (&mut self.kind, bounds) {
            *current = new;
        }
    }

    /// Move the origin without notification (drift correction).
    pub(crate) fn shift_origin(&mut self, origin: RigidTransform) {
        debug!(frame = %self.id, "drift correction moved origin");
        self.origin = origin;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrameTable
// ────────────────────────────────────────────────────────────────────────────

/// The frames owned by one session, in creation order.
#[derive(Debug, Default)]
pub struct FrameTable {
    frames: Vec<FrameOfReference>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame: FrameOfReference) -> FrameId {
        let id = frame.id();
        self.frames.push(frame);
        id
    }

    pub fn get(&self, id: FrameId) -> Option<&FrameOfReference> {
        self.frames.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut FrameOfReference> {
        self.frames.iter_mut().find(|f| f.id == id)
    }

    /// Remove a frame, releasing any lease it holds.
    pub fn remove(&mut self, id: FrameId) -> Option<FrameOfReference> {
        let index = self.frames.iter().position(|f| f.id == id)?;
        Some(self.frames.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameOfReference> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FrameOfReference> {
        self.frames.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every frame, releasing all leases.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
