//! [`ResetCoordinator`] – detects tracking discontinuities and realigns
//! frame origins with notification.
//!
//! Every tick the coordinator compares each frame's root against what it saw
//! last tick.  A discontinuity is any of:
//!
//! - a bumped `reset_epoch` (the tracking layer recentered the root),
//! - a root pose jump beyond the [`ResetPolicy`] thresholds,
//! - for bounded frames, a changed stage.
//!
//! Bounded and stationary frames then move through
//! `Stable → Realigning → Stable`: detection stages the new origin and
//! queues a [`ResetEvent`]; [`drain`][ResetCoordinator::drain] delivers the
//! event to the frame's listeners and only then commits the origin.  Events
//! for one frame are delivered in detection order, and no pose is ever
//! computed from the new origin before its notification went out.
//!
//! Unbounded frames never reset.  They are handed to a [`DriftPolicy`]
//! instead, which may nudge their origin silently.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tracing::{debug, info, warn};
use xrspace_geometry::{BoundsGeometry, RigidTransform};
use xrspace_tracking::{SpatialRoot, SpatialRootRegistry, ViewerSample};
use xrspace_types::{FrameId, ResetEvent};

use crate::frame::{FrameKind, FrameOfReference, FrameTable, OriginPolicy, OriginSource};

// ────────────────────────────────────────────────────────────────────────────
// Policies
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds above which a root pose change counts as a discontinuity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetPolicy {
    pub max_translation_jump_m: f32,
    pub max_rotation_jump_rad: f32,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            max_translation_jump_m: 0.5,
            max_rotation_jump_rad: 0.5,
        }
    }
}

impl ResetPolicy {
    fn is_jump(&self, before: RigidTransform, after: RigidTransform) -> bool {
        before.translation.distance(after.translation) > self.max_translation_jump_m
            || before.rotation.angle_to(after.rotation) > self.max_rotation_jump_rad
    }
}

/// Strategy for keeping unbounded origins near the user.
pub trait DriftPolicy: Send {
    /// New origin for an unbounded frame, or `None` to leave it alone.
    ///
    /// Both arguments are in the frame's root space.
    fn correct(&mut self, origin: RigidTransform, viewer: RigidTransform) -> Option<RigidTransform>;
}

/// Never moves unbounded origins.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDriftCorrection;

impl DriftPolicy for NoDriftCorrection {
    fn correct(&mut self, _origin: RigidTransform, _viewer: RigidTransform) -> Option<RigidTransform> {
        None
    }
}

/// Walks the origin towards the viewer once the viewer strays too far,
/// bounded per tick so the correction is imperceptible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDriftCorrection {
    /// Horizontal distance from the origin that triggers correction.
    pub recenter_distance_m: f32,
    /// Largest origin movement applied per tick.
    pub max_step_m: f32,
}

impl DriftPolicy for StepDriftCorrection {
    fn correct(&mut self, origin: RigidTransform, viewer: RigidTransform) -> Option<RigidTransform> {
        let mut offset = viewer.translation.sub(origin.translation);
        offset.y = 0.0;
        let distance = offset.length();
        if distance <= self.recenter_distance_m || distance <= f32::EPSILON {
            return None;
        }
        let step = (distance - self.recenter_distance_m).min(self.max_step_m);
        let moved = origin.translation.add(offset.scale(step / distance));
        Some(RigidTransform::new(moved, origin.rotation))
    }
}

/// Receives reset notifications for one frame.
pub trait ResetListener: Send {
    fn on_reset(&mut self, event: &ResetEvent);
}

impl<F> ResetListener for F
where
    F: FnMut(&ResetEvent) + Send,
{
    fn on_reset(&mut self, event: &ResetEvent) {
        self(event)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-frame state
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a frame with respect to resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Stable,
    /// A discontinuity was detected and its realignment is not yet
    /// delivered, including while it waits for the viewer.
    Realigning,
}

struct FrameWatch {
    last_epoch: u64,
    last_pose: Option<RigidTransform>,
    last_stage_bounds: Option<BoundsGeometry>,
    /// Discontinuity seen but not yet staged (viewer was not locatable).
    deferred: bool,
    pending: usize,
}

impl FrameWatch {
    fn observe(root: &SpatialRoot) -> Self {
        Self {
            last_epoch: root.reset_epoch,
            last_pose: root.pose,
            last_stage_bounds: root.stage.as_ref().map(|s| s.bounds.clone()),
            deferred: false,
            pending: 0,
        }
    }

    fn state(&self) -> ResetState {
        if self.pending > 0 || self.deferred {
            ResetState::Realigning
        } else {
            ResetState::Stable
        }
    }
}

struct PendingRealignment {
    event: ResetEvent,
    origin: RigidTransform,
    bounds: Option<BoundsGeometry>,
}

// ────────────────────────────────────────────────────────────────────────────
// ResetCoordinator
// ────────────────────────────────────────────────────────────────────────────

/// Detects discontinuities and delivers realignments for one session.
pub struct ResetCoordinator {
    policy: ResetPolicy,
    origins: OriginPolicy,
    drift: Box<dyn DriftPolicy>,
    watches: HashMap<FrameId, FrameWatch>,
    queue: VecDeque<PendingRealignment>,
    listeners: HashMap<FrameId, Vec<Box<dyn ResetListener>>>,
    next_sequence: u64,
}

impl ResetCoordinator {
    pub fn new(policy: ResetPolicy, origins: OriginPolicy) -> Self {
        Self {
            policy,
            origins,
            drift: Box::new(NoDriftCorrection),
            watches: HashMap::new(),
            queue: VecDeque::new(),
            listeners: HashMap::new(),
            next_sequence: 1,
        }
    }

    /// Replace the drift policy applied to unbounded frames.
    pub fn with_drift_policy(mut self, drift: Box<dyn DriftPolicy>) -> Self {
        self.drift = drift;
        self
    }

    /// Start watching `frame`, taking the root's current state as baseline.
    pub fn track(&mut self, frame: &FrameOfReference, registry: &SpatialRootRegistry) {
        let watch = match registry.get(frame.root()) {
            Some(root) => FrameWatch::observe(root),
            None => FrameWatch {
                last_epoch: 0,
                last_pose: None,
                last_stage_bounds: None,
                deferred: false,
                pending: 0,
            },
        };
        self.watches.insert(frame.id(), watch);
    }

    /// Stop watching a frame and drop its listeners and queued realignments.
    pub fn forget(&mut self, id: FrameId) {
        self.watches.remove(&id);
        self.listeners.remove(&id);
        self.queue.retain(|p| p.event.frame != id);
    }

    /// Drop every watch, listener and queued realignment.
    pub fn clear(&mut self) {
        self.watches.clear();
        self.listeners.clear();
        self.queue.clear();
    }

    pub fn add_listener(&mut self, frame: FrameId, listener: Box<dyn ResetListener>) {
        self.listeners.entry(frame).or_default().push(listener);
    }

    /// Reset state of `frame`, if it is watched.
    pub fn state(&self, frame: FrameId) -> Option<ResetState> {
        self.watches.get(&frame).map(FrameWatch::state)
    }

    /// Number of realignments queued and not yet delivered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Compare every watched frame's root against last tick, staging
    /// realignments for discontinuities and applying drift correction to
    /// unbounded frames.
    pub fn detect(
        &mut self,
        tick: u64,
        registry: &SpatialRootRegistry,
        frames: &mut FrameTable,
        viewer: Option<ViewerSample>,
    ) {
        for frame in frames.iter_mut() {
            let Some(watch) = self.watches.get_mut(&frame.id()) else {
                continue;
            };
            let Some(root) = registry.get(frame.root()) else {
                continue;
            };
            let viewer_in_root = viewer.and_then(|v| root.localize(v.pose));

            if !frame.emits_resets() {
                watch.last_epoch = root.reset_epoch;
                watch.last_pose = root.pose.or(watch.last_pose);
                if let Some(v) = viewer_in_root
                    && let Some(origin) = self.drift.correct(frame.origin(), v)
                {
                    frame.shift_origin(origin);
                }
                continue;
            }

            let stage_bounds = root.stage.as_ref().map(|s| s.bounds.clone());
            let epoch_changed = root.reset_epoch != watch.last_epoch;
            let jumped = match (watch.last_pose, root.pose) {
                (Some(before), Some(after)) => self.policy.is_jump(before, after),
                _ => false,
            };
            let stage_changed = matches!(frame.kind(), FrameKind::Bounded { .. })
                && stage_bounds.is_some()
                && stage_bounds != watch.last_stage_bounds;

            watch.last_epoch = root.reset_epoch;
            watch.last_pose = root.pose.or(watch.last_pose);
            watch.last_stage_bounds = stage_bounds;

            if epoch_changed || jumped || stage_changed {
                debug!(
                    frame = %frame.id(),
                    tick,
                    epoch_changed,
                    jumped,
                    stage_changed,
                    "tracking discontinuity detected"
                );
                watch.deferred = true;
            }
            if !watch.deferred {
                continue;
            }

            let Some(origin) = self
                .origins
                .resolve(frame.source(), viewer_in_root, root.stage.as_ref())
            else {
                warn!(frame = %frame.id(), tick, "cannot place new origin yet; deferring reset");
                continue;
            };
            let bounds = match (frame.kind(), frame.source()) {
                (FrameKind::Bounded { .. }, OriginSource::Stage) => {
                    root.stage.as_ref().map(|s| s.bounds.clone())
                }
                _ => None,
            };

            watch.deferred = false;
            watch.pending += 1;
            let event = ResetEvent {
                frame: frame.id(),
                sequence: self.next_sequence,
                tick,
                timestamp: Utc::now(),
            };
            self.next_sequence += 1;
            self.queue.push_back(PendingRealignment {
                event,
                origin,
                bounds,
            });
        }
    }

    /// Deliver queued realignments in order: notify listeners, then commit
    /// the new origin.  Returns the delivered events.
    pub fn drain(&mut self, frames: &mut FrameTable) -> Vec<ResetEvent> {
        let mut delivered = Vec::with_capacity(self.queue.len());
        while let Some(pending) = self.queue.pop_front() {
            let id = pending.event.frame;
            let Some(frame) = frames.get_mut(id) else {
                continue;
            };
            if let Some(listeners) = self.listeners.get_mut(&id) {
                for listener in listeners.iter_mut() {
                    listener.on_reset(&pending.event);
                }
            }
            frame.realign(pending.origin, pending.bounds);
            if let Some(watch) = self.watches.get_mut(&id) {
                watch.pending = watch.pending.saturating_sub(1);
            }
            info!(
                frame = %id,
                sequence = pending.event.sequence,
                tick = pending.event.tick,
                "frame of reference reset"
            );
            delivered.push(pending.event);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use xrspace_geometry::{Quaternion, Vec3};
    use xrspace_tracking::{SpatialRoot, StageGeometry};
    use xrspace_types::{SpatialRootId, StationarySubtype, TrackingQuality};

    fn root_id() -> SpatialRootId {
        SpatialRootId::new("tracking_system")
    }

    fn registry() -> SpatialRootRegistry {
        let mut registry = SpatialRootRegistry::new();
        registry.register(SpatialRoot::tracking_system(
            "tracking_system",
            TrackingQuality::InsideOut,
        ));
        registry
    }

    fn update_root(registry: &mut SpatialRootRegistry, f: impl FnOnce(&mut SpatialRoot)) {
        let mut root = registry.get(&root_id()).unwrap().clone();
        f(&mut root);
        registry.register(root);
    }

    fn viewer(x: f32, z: f32) -> Option<ViewerSample> {
        Some(ViewerSample {
            pose: RigidTransform::from_translation(Vec3::new(x, 1.6, z)),
            emulated_position: false,
        })
    }

    fn add_frame(
        coordinator: &mut ResetCoordinator,
        registry: &SpatialRootRegistry,
        frames: &mut FrameTable,
        kind: FrameKind,
        source: OriginSource,
    ) -> FrameId {
        let frame = FrameOfReference::new(
            root_id(),
            RigidTransform::from_translation(Vec3::new(0.0, 1.6, 0.0)),
            kind,
            source,
            None,
        );
        coordinator.track(&frame, registry);
        frames.insert(frame)
    }

    fn eye_level() -> FrameKind {
        FrameKind::Stationary {
            subtype: StationarySubtype::EyeLevel,
        }
    }

    #[test]
    fn steady_tracking_never_resets() {
        let registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        let id = add_frame(&mut coordinator, &registry, &mut frames, eye_level(), OriginSource::Viewer);

        for tick in 1..10 {
            coordinator.detect(tick, &registry, &mut frames, viewer(0.01 * tick as f32, 0.0));
            assert!(coordinator.drain(&mut frames).is_empty());
        }
        assert_eq!(coordinator.state(id), Some(ResetState::Stable));
    }

    #[test]
    fn epoch_bump_realigns_after_notifying() {
        let mut registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        let id = add_frame(&mut coordinator, &registry, &mut frames, eye_level(), OriginSource::Viewer);

        let seen: Arc<Mutex<Vec<ResetEvent>>> = Arc::default();
        let heard = Arc::clone(&seen);
        let old_origin = frames.get(id).unwrap().origin();
        coordinator.add_listener(
            id,
            Box::new(move |event: &ResetEvent| heard.lock().unwrap().push(event.clone())),
        );

        // Detection only stages: nobody is told and the origin stays put.
        update_root(&mut registry, |r| r.reset_epoch += 1);
        coordinator.detect(5, &registry, &mut frames, viewer(2.0, -1.0));
        assert_eq!(coordinator.state(id), Some(ResetState::Realigning));
        assert_eq!(frames.get(id).unwrap().origin(), old_origin);
        assert!(seen.lock().unwrap().is_empty());

        let events = coordinator.drain(&mut frames);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame, id);
        assert_eq!(events[0].tick, 5);
        assert_eq!(*seen.lock().unwrap(), events);
        assert!(
            frames
                .get(id)
                .unwrap()
                .origin()
                .translation
                .approx_eq(Vec3::new(2.0, 1.6, -1.0), 1e-5)
        );
        assert_eq!(coordinator.state(id), Some(ResetState::Stable));
    }

    #[test]
    fn pose_jump_counts_as_discontinuity() {
        let mut registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        add_frame(&mut coordinator, &registry, &mut frames, eye_level(), OriginSource::Viewer);

        update_root(&mut registry, |r| {
            r.pose = Some(RigidTransform::new(Vec3::zero(), Quaternion::from_yaw(1.2)));
        });
        coordinator.detect(1, &registry, &mut frames, viewer(0.0, 0.0));
        assert_eq!(coordinator.drain(&mut frames).len(), 1);

        // Small drift below the thresholds is not a reset.
        update_root(&mut registry, |r| {
            r.pose = Some(RigidTransform::new(
                Vec3::new(0.05, 0.0, 0.0),
                Quaternion::from_yaw(1.25),
            ));
        });
        coordinator.detect(2, &registry, &mut frames, viewer(0.0, 0.0));
        assert!(coordinator.drain(&mut frames).is_empty());
    }

    #[test]
    fn events_for_one_frame_keep_detection_order() {
        let mut registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        let id = add_frame(&mut coordinator, &registry, &mut frames, eye_level(), OriginSource::Viewer);

        update_root(&mut registry, |r| r.reset_epoch += 1);
        coordinator.detect(1, &registry, &mut frames, viewer(1.0, 0.0));
        update_root(&mut registry, |r| r.reset_epoch += 1);
        coordinator.detect(2, &registry, &mut frames, viewer(2.0, 0.0));
        assert_eq!(coordinator.pending(), 2);

        let events = coordinator.drain(&mut frames);
        let ticks: Vec<u64> = events.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![1, 2]);
        assert!(events[0].sequence < events[1].sequence);
        // Last realignment wins.
        let origin = frames.get(id).unwrap().origin();
        assert!(origin.translation.approx_eq(Vec3::new(2.0, 1.6, 0.0), 1e-5));
    }

    #[test]
    fn unbounded_frames_never_reset() {
        let mut registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        let id = add_frame(
            &mut coordinator,
            &registry,
            &mut frames,
            FrameKind::Unbounded,
            OriginSource::Viewer,
        );
        let origin = frames.get(id).unwrap().origin();

        update_root(&mut registry, |r| r.reset_epoch += 3);
        coordinator.detect(1, &registry, &mut frames, viewer(9.0, 9.0));
        assert!(coordinator.drain(&mut frames).is_empty());
        assert_eq!(frames.get(id).unwrap().origin(), origin);
    }

    #[test]
    fn step_drift_walks_unbounded_origin_towards_viewer() {
        let registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default())
            .with_drift_policy(Box::new(StepDriftCorrection {
                recenter_distance_m: 5.0,
                max_step_m: 0.01,
            }));
        let id = add_frame(
            &mut coordinator,
            &registry,
            &mut frames,
            FrameKind::Unbounded,
            OriginSource::Viewer,
        );

        coordinator.detect(1, &registry, &mut frames, viewer(3.0, 0.0));
        assert!(frames.get(id).unwrap().origin().translation.x.abs() < 1e-6);

        coordinator.detect(2, &registry, &mut frames, viewer(8.0, 0.0));
        let origin = frames.get(id).unwrap().origin();
        assert!((origin.translation.x - 0.01).abs() < 1e-5);
        assert!((origin.translation.y - 1.6).abs() < 1e-5);
        assert!(coordinator.drain(&mut frames).is_empty());
    }

    #[test]
    fn stage_change_resets_bounded_frames() {
        let mut registry = registry();
        update_root(&mut registry, |r| {
            r.stage = Some(StageGeometry {
                floor_origin: RigidTransform::identity(),
                bounds: BoundsGeometry::square(1.0).unwrap(),
            });
        });
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        let id = add_frame(
            &mut coordinator,
            &registry,
            &mut frames,
            FrameKind::Bounded {
                bounds: BoundsGeometry::square(1.0).unwrap(),
            },
            OriginSource::Stage,
        );
        let eye = add_frame(&mut coordinator, &registry, &mut frames, eye_level(), OriginSource::Viewer);

        update_root(&mut registry, |r| {
            r.stage = Some(StageGeometry {
                floor_origin: RigidTransform::from_translation(Vec3::new(0.5, 0.0, 0.0)),
                bounds: BoundsGeometry::square(2.0).unwrap(),
            });
        });
        coordinator.detect(1, &registry, &mut frames, viewer(0.0, 0.0));
        let events = coordinator.drain(&mut frames);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame, id);
        assert_ne!(events[0].frame, eye);

        let frame = frames.get(id).unwrap();
        assert!((frame.bounds().unwrap().area() - 16.0).abs() < 1e-4);
        assert!(frame.origin().translation.approx_eq(Vec3::new(0.5, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn reset_without_viewer_is_deferred_until_located() {
        let mut registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        let id = add_frame(&mut coordinator, &registry, &mut frames, eye_level(), OriginSource::Viewer);

        update_root(&mut registry, |r| r.reset_epoch += 1);
        coordinator.detect(1, &registry, &mut frames, None);
        assert!(coordinator.drain(&mut frames).is_empty());
        assert_eq!(coordinator.state(id), Some(ResetState::Realigning));
        assert_eq!(coordinator.pending(), 0);

        coordinator.detect(2, &registry, &mut frames, viewer(1.0, 1.0));
        let events = coordinator.drain(&mut frames);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tick, 2);
        assert_eq!(coordinator.state(id), Some(ResetState::Stable));
    }

    #[test]
    fn forget_drops_queued_realignments() {
        let mut registry = registry();
        let mut frames = FrameTable::new();
        let mut coordinator = ResetCoordinator::new(ResetPolicy::default(), OriginPolicy::default());
        let id = add_frame(&mut coordinator, &registry, &mut frames, eye_level(), OriginSource::Viewer);

        update_root(&mut registry, |r| r.reset_epoch += 1);
        coordinator.detect(1, &registry, &mut frames, viewer(0.0, 0.0));
        coordinator.forget(id);
        assert_eq!(coordinator.pending(), 0);
        assert!(coordinator.state(id).is_none());
    }
}
