//! [`SpatialRootRegistry`] – the set of spatial roots known to the runtime.
//!
//! The registry stores every root reported by the tracking layer, keyed by
//! its [`SpatialRootId`].  The first tracking-system root registered becomes
//! the *primary* root; its quality class drives the
//! [`TrackingCapability`] snapshot handed to the negotiator.  The snapshot is
//! recomputed whenever that quality class changes, so a headset that degrades
//! from inside-out to orientation-only stops offering bounded and unbounded
//! frames for the rest of the session.

use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};
use xrspace_types::{FrameError, SessionMode, SpatialRootId, TrackingQuality};

use crate::capability::TrackingCapability;
use crate::root::{RootKind, SpatialRoot};
use crate::source::TrackingSample;

/// Registry of live spatial roots and the capability they imply.
#[derive(Debug, Default)]
pub struct SpatialRootRegistry {
    roots: BTreeMap<SpatialRootId, SpatialRoot>,
    primary: Option<SpatialRootId>,
    capability: HashMap<SessionMode, TrackingCapability>,
    /// Bumped every time the capability snapshot is recomputed.
    capability_revision: u64,
}

impl SpatialRootRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.recompute_capability();
        registry
    }

    /// Register a root.  Any previously registered root with the same id is
    /// replaced.
    pub fn register(&mut self, root: SpatialRoot) {
        let quality_before = self.primary_quality();
        if self.primary.is_none() && root.kind == RootKind::TrackingSystem {
            self.primary = Some(root.id.clone());
        }
        self.roots.insert(root.id.clone(), root);
        if self.primary_quality() != quality_before {
            self.recompute_capability();
        }
    }

    /// Remove a root, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::RootNotFound`] when `root_id` is not registered.
    pub fn unregister(&mut self, root_id: &SpatialRootId) -> Result<SpatialRoot, FrameError> {
        let quality_before = self.primary_quality();
        let root = self
            .roots
            .remove(root_id)
            .ok_or_else(|| FrameError::RootNotFound(root_id.clone()))?;
        if self.primary.as_ref() == Some(root_id) {
            self.primary = self
                .roots
                .values()
                .find(|r| r.kind == RootKind::TrackingSystem)
                .map(|r| r.id.clone());
        }
        if self.primary_quality() != quality_before {
            self.recompute_capability();
        }
        Ok(root)
    }

    /// All registered roots, ordered by id.
    pub fn list_active(&self) -> Vec<&SpatialRoot> {
        self.roots.values().collect()
    }

    pub fn get(&self, root_id: &SpatialRootId) -> Option<&SpatialRoot> {
        self.roots.get(root_id)
    }

    /// The primary tracking-system root, if any.
    pub fn primary(&self) -> Option<&SpatialRoot> {
        self.primary.as_ref().and_then(|id| self.roots.get(id))
    }

    /// Current capability snapshot for a session of `mode`.
    pub fn capability_for(&self, mode: SessionMode) -> TrackingCapability {
        self.capability
            .get(&mode)
            .cloned()
            .unwrap_or_else(|| TrackingCapability::derive(mode, self.primary_quality()))
    }

    pub fn capability_revision(&self) -> u64 {
        self.capability_revision
    }

    /// Fold one tick's tracking sample into the registry.
    ///
    /// Roots present in the sample overwrite their registered state (new ones
    /// are registered); roots absent from the sample are left untouched.
    pub fn apply_sample(&mut self, sample: &TrackingSample) {
        let quality_before = self.primary_quality();
        for root in &sample.roots {
            if self.primary.is_none() && root.kind == RootKind::TrackingSystem {
                self.primary = Some(root.id.clone());
            }
            if let Some(existing) = self.roots.get(&root.id)
                && existing.pose.is_some()
                && root.pose.is_none()
            {
                warn!(root = %root.id, "spatial root lost tracking");
            }
            self.roots.insert(root.id.clone(), root.clone());
        }
        let quality_after = self.primary_quality();
        if quality_after != quality_before {
            info!(
                from = ?quality_before,
                to = ?quality_after,
                "primary tracking quality changed; recomputing capability"
            );
            self.recompute_capability();
        }
    }

    fn primary_quality(&self) -> TrackingQuality {
        self.primary()
            .map(|r| r.quality)
            .unwrap_or(TrackingQuality::None)
    }

    fn recompute_capability(&mut self) {
        let quality = self.primary_quality();
        for mode in [SessionMode::Inline, SessionMode::Immersive] {
            self.capability
                .insert(mode, TrackingCapability::derive(mode, quality));
        }
        self.capability_revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrspace_geometry::RigidTransform;
    use xrspace_types::{Availability, FrameOfReferenceOptions};

    fn inside_out_root() -> SpatialRoot {
        SpatialRoot::tracking_system("tracking_system", TrackingQuality::InsideOut)
    }

    #[test]
    fn first_tracking_system_root_becomes_primary() {
        let mut registry = SpatialRootRegistry::new();
        registry.register(SpatialRoot::anchor(
            "anchor_1",
            RigidTransform::identity(),
            TrackingQuality::InsideOut,
        ));
        assert!(registry.primary().is_none());

        registry.register(inside_out_root());
        assert_eq!(registry.primary().unwrap().id.as_str(), "tracking_system");
    }

    #[test]
    fn unregister_unknown_root_fails() {
        let mut registry = SpatialRootRegistry::new();
        let result = registry.unregister(&SpatialRootId::new("ghost"));
        assert!(matches!(result, Err(FrameError::RootNotFound(_))));
    }

    #[test]
    fn unregister_primary_drops_capability() {
        let mut registry = SpatialRootRegistry::new();
        registry.register(inside_out_root());
        assert_eq!(
            registry
                .capability_for(SessionMode::Immersive)
                .availability(&FrameOfReferenceOptions::Unbounded),
            Availability::HardwareDependent
        );

        registry
            .unregister(&SpatialRootId::new("tracking_system"))
            .unwrap();
        assert!(registry.primary().is_none());
        assert_eq!(
            registry
                .capability_for(SessionMode::Immersive)
                .availability(&FrameOfReferenceOptions::Unbounded),
            Availability::Rejected
        );
    }

    #[test]
    fn list_active_returns_every_root() {
        let mut registry = SpatialRootRegistry::new();
        registry.register(inside_out_root());
        registry.register(SpatialRoot::anchor(
            "anchor_1",
            RigidTransform::identity(),
            TrackingQuality::InsideOut,
        ));
        let ids: Vec<&str> = registry.list_active().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["anchor_1", "tracking_system"]);
    }

    #[test]
    fn quality_downgrade_in_sample_recomputes_capability() {
        let mut registry = SpatialRootRegistry::new();
        registry.register(inside_out_root());
        let revision = registry.capability_revision();

        let mut degraded = inside_out_root();
        degraded.quality = TrackingQuality::OrientationOnly;
        registry.apply_sample(&TrackingSample {
            roots: vec![degraded],
            ..TrackingSample::default()
        });

        assert!(registry.capability_revision() > revision);
        let cap = registry.capability_for(SessionMode::Immersive);
        assert_eq!(cap.quality(), TrackingQuality::OrientationOnly);
        assert_eq!(
            cap.availability(&FrameOfReferenceOptions::Bounded),
            Availability::Rejected
        );
    }

    #[test]
    fn unchanged_quality_keeps_revision() {
        let mut registry = SpatialRootRegistry::new();
        registry.register(inside_out_root());
        let revision = registry.capability_revision();
        registry.apply_sample(&TrackingSample {
            roots: vec![inside_out_root()],
            ..TrackingSample::default()
        });
        assert_eq!(registry.capability_revision(), revision);
    }

    #[test]
    fn sample_registers_new_roots_and_keeps_missing_ones() {
        let mut registry = SpatialRootRegistry::new();
        registry.register(inside_out_root());
        registry.apply_sample(&TrackingSample {
            roots: vec![SpatialRoot::anchor(
                "anchor_9",
                RigidTransform::identity(),
                TrackingQuality::InsideOut,
            )],
            ..TrackingSample::default()
        });
        assert!(registry.get(&SpatialRootId::new("anchor_9")).is_some());
        assert!(registry.get(&SpatialRootId::new("tracking_system")).is_some());
    }
}
