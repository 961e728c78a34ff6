//! In-process simulated tracking hardware for tests and headless runs.
//!
//! [`SimTrackingSource`] replays a scripted head motion and reports it the
//! way a real driver would: neck-modelled on orientation-only hardware,
//! missing during tracking-loss windows, and with a bumped reset epoch on
//! scripted recenters.  [`SimPlatform`] answers hardware-dependent
//! negotiations and records every lease it hands out, so tests can assert
//! that nothing leaks.
//!
//! # Example
//!
//! ```rust
//! use xrspace_tracking::sim::SimTrackingSource;
//! use xrspace_tracking::source::TrackingSource;
//! use xrspace_types::TrackingQuality;
//!
//! let mut source = SimTrackingSource::builder(TrackingQuality::InsideOut)
//!     .with_room_scale_stage(1.5)
//!     .recenter_at(10)
//!     .build();
//!
//! source.start().expect("sim start must succeed");
//! let sample = source.sample(0).expect("sim sample must succeed");
//! assert!(sample.viewer.is_some());
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Range;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;
use xrspace_geometry::{BoundsGeometry, RigidTransform, Vec3};
use xrspace_types::{
    FrameError, FrameOfReferenceOptions, Handedness, InputSourceId, SessionMode,
    SpatialRootId, StationarySubtype, TargetRayMode, TrackingQuality,
};

use crate::neck_model::NeckModel;
use crate::platform::{PlatformGrant, TrackingPlatform};
use crate::root::{SpatialRoot, StageGeometry};
use crate::source::{InputSample, TrackingSample, TrackingSource, ViewerSample};

/// Standing eye height used by the default motion script.
pub const SIM_EYE_HEIGHT: f32 = 1.6;

/// Viewer pose in internal space as a function of the tick number.
pub type MotionScript = Box<dyn Fn(u64) -> RigidTransform + Send>;

// ────────────────────────────────────────────────────────────────────────────
// Simulated tracking source
// ────────────────────────────────────────────────────────────────────────────

struct SimAnchor {
    root: SpatialRoot,
    hidden: Vec<Range<u64>>,
}

struct SimInput {
    id: InputSourceId,
    handedness: Handedness,
    target_ray_mode: TargetRayMode,
    /// Target ray relative to the viewer.
    offset: RigidTransform,
}

/// Scripted tracking hardware.
pub struct SimTrackingSource {
    id: String,
    quality: TrackingQuality,
    root_id: SpatialRootId,
    root_pose: RigidTransform,
    reset_epoch: u64,
    stage: Option<StageGeometry>,
    anchors: Vec<SimAnchor>,
    inputs: Vec<SimInput>,
    motion: MotionScript,
    recenters: BTreeSet<u64>,
    viewer_lost: Vec<Range<u64>>,
    quality_changes: BTreeMap<u64, TrackingQuality>,
    neck: NeckModel,
    running: bool,
}

impl SimTrackingSource {
    /// Start configuring a simulated device of the given quality class.
    pub fn builder(quality: TrackingQuality) -> SimTrackingSourceBuilder {
        SimTrackingSourceBuilder::new(quality)
    }

    fn tracking_root(&self) -> SpatialRoot {
        SpatialRoot {
            id: self.root_id.clone(),
            kind: crate::root::RootKind::TrackingSystem,
            pose: Some(self.root_pose),
            quality: self.quality,
            reset_epoch: self.reset_epoch,
            stage: self.stage.clone(),
        }
    }

    fn viewer_at(&self, tick: u64) -> Option<ViewerSample> {
        if self.viewer_lost.iter().any(|r| r.contains(&tick)) {
            return None;
        }
        let raw = (self.motion)(tick);
        match self.quality {
            TrackingQuality::None => None,
            TrackingQuality::OrientationOnly => Some(ViewerSample {
                pose: self.neck.apply(raw),
                emulated_position: true,
            }),
            TrackingQuality::OutsideIn | TrackingQuality::InsideOut => Some(ViewerSample {
                pose: raw,
                emulated_position: false,
            }),
        }
    }

    /// Re-origin the tracking root under the viewer, keeping its height.
    fn recenter(&mut self, viewer: Option<&ViewerSample>, tick: u64) {
        self.reset_epoch += 1;
        if let Some(v) = viewer {
            let heading = v.pose.gravity_aligned();
            self.root_pose = RigidTransform::new(
                Vec3::new(heading.translation.x, self.root_pose.translation.y, heading.translation.z),
                heading.rotation,
            );
        }
        debug!(source = %self.id, tick, epoch = self.reset_epoch, "sim recenter");
    }
}

impl TrackingSource for SimTrackingSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn quality(&self) -> TrackingQuality {
        self.quality
    }

    fn describe_roots(&self) -> Vec<SpatialRoot> {
        let mut roots = vec![self.tracking_root()];
        roots.extend(self.anchors.iter().map(|a| a.root.clone()));
        roots
    }

    fn start(&mut self) -> Result<(), FrameError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn sample(&mut self, tick: u64) -> Result<TrackingSample, FrameError> {
        if !self.running {
            return Err(FrameError::Hardware {
                component: self.id.clone(),
                details: "sampled while stopped".to_string(),
            });
        }
        if let Some((_, q)) = self.quality_changes.range(..=tick).next_back() {
            self.quality = *q;
        }

        let viewer = self.viewer_at(tick);
        if self.recenters.remove(&tick) {
            self.recenter(viewer.as_ref(), tick);
        }

        let mut roots = vec![self.tracking_root()];
        for anchor in &self.anchors {
            let mut root = anchor.root.clone();
            if anchor.hidden.iter().any(|r| r.contains(&tick)) {
                root.pose = None;
            }
            roots.push(root);
        }

        let inputs = self
            .inputs
            .iter()
            .map(|input| {
                let ray = viewer.map(|v| v.pose.compose(input.offset));
                InputSample {
                    id: input.id.clone(),
                    handedness: input.handedness,
                    target_ray_mode: input.target_ray_mode,
                    target_ray: ray,
                    grip: ray.filter(|_| input.target_ray_mode == TargetRayMode::TrackedPointer),
                    emulated_position: viewer.is_some_and(|v| v.emulated_position),
                }
            })
            .collect();

        Ok(TrackingSample {
            roots,
            viewer,
            inputs,
        })
    }
}

/// Builder for [`SimTrackingSource`].
///
/// Call the `with_*` methods to script the hardware you need, then call
/// [`build`][Self::build].
pub struct SimTrackingSourceBuilder {
    quality: TrackingQuality,
    stage: Option<StageGeometry>,
    anchors: Vec<SimAnchor>,
    inputs: Vec<SimInput>,
    motion: Option<MotionScript>,
    recenters: BTreeSet<u64>,
    viewer_lost: Vec<Range<u64>>,
    quality_changes: BTreeMap<u64, TrackingQuality>,
    neck: NeckModel,
}

impl SimTrackingSourceBuilder {
    fn new(quality: TrackingQuality) -> Self {
        Self {
            quality,
            stage: None,
            anchors: Vec::new(),
            inputs: Vec::new(),
            motion: None,
            recenters: BTreeSet::new(),
            viewer_lost: Vec::new(),
            quality_changes: BTreeMap::new(),
            neck: NeckModel::default(),
        }
    }

    /// Publish a platform stage on the tracking root.
    pub fn with_stage(mut self, stage: StageGeometry) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Publish a square stage of `half_extent` meters centred on the
    /// internal origin.  Invalid extents leave the device without a stage.
    pub fn with_room_scale_stage(mut self, half_extent: f32) -> Self {
        self.stage = BoundsGeometry::square(half_extent)
            .ok()
            .map(|bounds| StageGeometry {
                floor_origin: RigidTransform::identity(),
                bounds,
            });
        self
    }

    /// Add an anchor root at `pose` in internal space.
    pub fn with_anchor(mut self, id: impl Into<String>, pose: RigidTransform) -> Self {
        self.anchors.push(SimAnchor {
            root: SpatialRoot::anchor(id, pose, self.quality),
            hidden: Vec::new(),
        });
        self
    }

    /// Make anchor `id` untrackable during `ticks`.
    pub fn hide_anchor(mut self, id: &str, ticks: Range<u64>) -> Self {
        if let Some(anchor) = self.anchors.iter_mut().find(|a| a.root.id.as_str() == id) {
            anchor.hidden.push(ticks);
        }
        self
    }

    /// Drive the viewer with a custom motion script.
    pub fn with_motion(mut self, motion: impl Fn(u64) -> RigidTransform + Send + 'static) -> Self {
        self.motion = Some(Box::new(motion));
        self
    }

    /// Keep the viewer at a fixed pose.
    pub fn standing_at(self, pose: RigidTransform) -> Self {
        self.with_motion(move |_| pose)
    }

    /// Recenter the tracking root on `tick`.
    pub fn recenter_at(mut self, tick: u64) -> Self {
        self.recenters.insert(tick);
        self
    }

    /// Lose the viewer during `ticks`.
    pub fn lose_viewer(mut self, ticks: Range<u64>) -> Self {
        self.viewer_lost.push(ticks);
        self
    }

    /// Switch the hardware to `quality` from `tick` on.
    pub fn degrade_at(mut self, tick: u64, quality: TrackingQuality) -> Self {
        self.quality_changes.insert(tick, quality);
        self
    }

    /// Add a tracked controller whose target ray sits at `offset` from the
    /// viewer.
    pub fn with_controller(
        mut self,
        id: impl Into<String>,
        handedness: Handedness,
        offset: RigidTransform,
    ) -> Self {
        self.inputs.push(SimInput {
            id: InputSourceId::new(id),
            handedness,
            target_ray_mode: TargetRayMode::TrackedPointer,
            offset,
        });
        self
    }

    /// Add a gaze input that follows the viewer.
    pub fn with_gaze_input(mut self, id: impl Into<String>) -> Self {
        self.inputs.push(SimInput {
            id: InputSourceId::new(id),
            handedness: Handedness::None,
            target_ray_mode: TargetRayMode::Gaze,
            offset: RigidTransform::identity(),
        });
        self
    }

    pub fn with_neck_model(mut self, neck: NeckModel) -> Self {
        self.neck = neck;
        self
    }

    /// Consume the builder and return the configured source (stopped).
    pub fn build(self) -> SimTrackingSource {
        let motion = self.motion.unwrap_or_else(|| {
            Box::new(|_| RigidTransform::from_translation(Vec3::new(0.0, SIM_EYE_HEIGHT, 0.0)))
        });
        SimTrackingSource {
            id: "sim_headset".to_string(),
            quality: self.quality,
            root_id: SpatialRootId::new("tracking_system"),
            root_pose: RigidTransform::identity(),
            reset_epoch: 0,
            stage: self.stage,
            anchors: self.anchors,
            inputs: self.inputs,
            motion,
            recenters: self.recenters,
            viewer_lost: self.viewer_lost,
            quality_changes: self.quality_changes,
            neck: self.neck,
            running: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated platform
// ────────────────────────────────────────────────────────────────────────────

/// Simulated negotiation backend.
///
/// Grants an option when the configured quality class can provide it, unless
/// the option was explicitly refused or stalled.
pub struct SimPlatform {
    quality: TrackingQuality,
    stage: Option<StageGeometry>,
    shared_origins: HashMap<StationarySubtype, RigidTransform>,
    refused: HashSet<FrameOfReferenceOptions>,
    stalled: HashSet<FrameOfReferenceOptions>,
    next_lease: AtomicU64,
    active: Mutex<HashSet<u64>>,
}

impl SimPlatform {
    pub fn new(quality: TrackingQuality) -> Self {
        Self {
            quality,
            stage: None,
            shared_origins: HashMap::new(),
            refused: HashSet::new(),
            stalled: HashSet::new(),
            next_lease: AtomicU64::new(1),
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Hand out `stage` with every bounded grant.
    pub fn with_stage(mut self, stage: StageGeometry) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Share a platform-defined origin for stationary `subtype`.
    pub fn with_shared_origin(mut self, subtype: StationarySubtype, origin: RigidTransform) -> Self {
        self.shared_origins.insert(subtype, origin);
        self
    }

    /// Always fail negotiation of `options`.
    pub fn refuse(mut self, options: FrameOfReferenceOptions) -> Self {
        self.refused.insert(options);
        self
    }

    /// Never complete negotiation of `options` (simulates a pending prompt).
    pub fn stall(mut self, options: FrameOfReferenceOptions) -> Self {
        self.stalled.insert(options);
        self
    }

    /// Number of leases handed out and not yet released.
    pub fn active_leases(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn can_provide(&self, options: FrameOfReferenceOptions) -> bool {
        match options {
            FrameOfReferenceOptions::Stationary { .. } => self.quality != TrackingQuality::None,
            FrameOfReferenceOptions::Bounded => self.quality.is_six_dof(),
            FrameOfReferenceOptions::Unbounded => self.quality == TrackingQuality::InsideOut,
        }
    }
}

#[async_trait]
impl TrackingPlatform for SimPlatform {
    fn id(&self) -> &str {
        "sim_platform"
    }

    async fn acquire(
        &self,
        mode: SessionMode,
        options: FrameOfReferenceOptions,
    ) -> Result<PlatformGrant, FrameError> {
        if self.stalled.contains(&options) {
            std::future::pending::<()>().await;
        }
        if self.refused.contains(&options) {
            return Err(FrameError::Hardware {
                component: self.id().to_string(),
                details: format!("{options} refused for {mode} session"),
            });
        }
        if !self.can_provide(options) {
            return Err(FrameError::HardwareCapabilityUnavailable(options));
        }

        let lease_id = self.next_lease.fetch_add(1, Ordering::Relaxed);
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(lease_id);

        let (stage, shared_origin) = match options {
            FrameOfReferenceOptions::Bounded => (self.stage.clone(), None),
            FrameOfReferenceOptions::Stationary { subtype } => {
                (None, self.shared_origins.get(&subtype).copied())
            }
            FrameOfReferenceOptions::Unbounded => (None, None),
        };
        Ok(PlatformGrant {
            lease_id,
            stage,
            shared_origin,
        })
    }

    fn release(&self, lease_id: u64) {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&lease_id);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use xrspace_geometry::Quaternion;

    fn started(builder: SimTrackingSourceBuilder) -> SimTrackingSource {
        let mut source = builder.build();
        source.start().unwrap();
        source
    }

    #[test]
    fn sampling_stopped_source_fails() {
        let mut source = SimTrackingSource::builder(TrackingQuality::InsideOut).build();
        assert!(matches!(source.sample(0), Err(FrameError::Hardware { .. })));
    }

    #[test]
    fn six_dof_viewer_follows_motion_script() {
        let mut source = started(
            SimTrackingSource::builder(TrackingQuality::OutsideIn).with_motion(|tick| {
                RigidTransform::from_translation(Vec3::new(tick as f32 * 0.1, 1.6, 0.0))
            }),
        );
        let viewer = source.sample(5).unwrap().viewer.unwrap();
        assert!(!viewer.emulated_position);
        assert!((viewer.pose.translation.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn orientation_only_viewer_is_neck_modelled() {
        let mut source = started(
            SimTrackingSource::builder(TrackingQuality::OrientationOnly)
                .standing_at(RigidTransform::new(Vec3::new(5.0, 5.0, 5.0), Quaternion::from_yaw(0.5))),
        );
        let viewer = source.sample(0).unwrap().viewer.unwrap();
        assert!(viewer.emulated_position);
        assert!(viewer.pose.translation.length() < 0.2);
    }

    #[test]
    fn untracked_hardware_has_no_viewer() {
        let mut source = started(SimTrackingSource::builder(TrackingQuality::None));
        assert!(source.sample(0).unwrap().viewer.is_none());
    }

    #[test]
    fn recenter_bumps_epoch_once() {
        let mut source = started(SimTrackingSource::builder(TrackingQuality::InsideOut).recenter_at(2));
        let epoch = |s: &TrackingSample| s.roots[0].reset_epoch;
        assert_eq!(epoch(&source.sample(1).unwrap()), 0);
        assert_eq!(epoch(&source.sample(2).unwrap()), 1);
        assert_eq!(epoch(&source.sample(2).unwrap()), 1);
        assert_eq!(epoch(&source.sample(3).unwrap()), 1);
    }

    #[test]
    fn viewer_loss_window_is_respected() {
        let mut source =
            started(SimTrackingSource::builder(TrackingQuality::InsideOut).lose_viewer(3..5));
        assert!(source.sample(2).unwrap().viewer.is_some());
        assert!(source.sample(3).unwrap().viewer.is_none());
        assert!(source.sample(4).unwrap().viewer.is_none());
        assert!(source.sample(5).unwrap().viewer.is_some());
    }

    #[test]
    fn inputs_stay_enumerated_while_viewer_is_lost() {
        let mut source = started(
            SimTrackingSource::builder(TrackingQuality::InsideOut)
                .with_gaze_input("gaze")
                .lose_viewer(0..1),
        );
        let sample = source.sample(0).unwrap();
        let gaze = sample.input(&InputSourceId::new("gaze")).unwrap();
        assert!(gaze.target_ray.is_none());
    }

    #[test]
    fn hidden_anchor_reports_no_pose() {
        let mut source = started(
            SimTrackingSource::builder(TrackingQuality::InsideOut)
                .with_anchor("table", RigidTransform::identity())
                .hide_anchor("table", 1..2),
        );
        assert!(source.sample(0).unwrap().roots[1].pose.is_some());
        assert!(source.sample(1).unwrap().roots[1].pose.is_none());
    }

    #[test]
    fn degrade_switches_quality_from_tick() {
        let mut source = started(
            SimTrackingSource::builder(TrackingQuality::InsideOut)
                .degrade_at(4, TrackingQuality::OrientationOnly),
        );
        assert_eq!(source.sample(3).unwrap().roots[0].quality, TrackingQuality::InsideOut);
        assert_eq!(
            source.sample(4).unwrap().roots[0].quality,
            TrackingQuality::OrientationOnly
        );
    }

    #[test]
    fn controller_has_grip_and_gaze_does_not() {
        let mut source = started(
            SimTrackingSource::builder(TrackingQuality::InsideOut)
                .with_controller(
                    "right",
                    Handedness::Right,
                    RigidTransform::from_translation(Vec3::new(0.2, -0.3, -0.3)),
                )
                .with_gaze_input("gaze"),
        );
        let sample = source.sample(0).unwrap();
        let right = sample.input(&InputSourceId::new("right")).unwrap();
        assert!(right.grip.is_some());
        let ray = right.target_ray.unwrap();
        assert!(ray.translation.approx_eq(Vec3::new(0.2, 1.3, -0.3), 1e-5));
        let gaze = sample.input(&InputSourceId::new("gaze")).unwrap();
        assert!(gaze.grip.is_none());
    }

    #[tokio::test]
    async fn sim_platform_tracks_leases() {
        let platform = SimPlatform::new(TrackingQuality::InsideOut);
        let grant = platform
            .acquire(SessionMode::Immersive, FrameOfReferenceOptions::Unbounded)
            .await
            .unwrap();
        assert_eq!(platform.active_leases(), 1);
        platform.release(grant.lease_id);
        assert_eq!(platform.active_leases(), 0);
    }

    #[tokio::test]
    async fn sim_platform_refuses_beyond_quality() {
        let platform = SimPlatform::new(TrackingQuality::OutsideIn);
        let result = platform
            .acquire(SessionMode::Immersive, FrameOfReferenceOptions::Unbounded)
            .await;
        assert!(matches!(
            result,
            Err(FrameError::HardwareCapabilityUnavailable(FrameOfReferenceOptions::Unbounded))
        ));
        assert_eq!(platform.active_leases(), 0);
    }

    #[tokio::test]
    async fn sim_platform_explicit_refusal() {
        let platform = SimPlatform::new(TrackingQuality::InsideOut)
            .refuse(FrameOfReferenceOptions::Bounded);
        let result = platform
            .acquire(SessionMode::Immersive, FrameOfReferenceOptions::Bounded)
            .await;
        assert!(matches!(result, Err(FrameError::Hardware { .. })));
    }
}
