//! Hardware-dependent negotiation hooks.
//!
//! A [`TrackingPlatform`] decides whether a hardware-dependent frame of
//! reference can be provided and, if so, hands out a [`PlatformGrant`].  The
//! negotiator wraps every grant in a [`HardwareLease`]; dropping a lease
//! releases the platform resources, so an attempt that fails or is cancelled
//! never leaves hardware initialised without an owner.
//!
//! A [`FloorSelector`] stands in for the UI that lets the user pick a floor
//! height when the hardware has no native floor (the anchor-backed polyfill).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use xrspace_geometry::RigidTransform;
use xrspace_types::{FrameError, FrameOfReferenceOptions, SessionMode};

use crate::root::StageGeometry;

/// What the platform provides when it accepts a negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformGrant {
    /// Platform-assigned lease identifier, passed back to
    /// [`TrackingPlatform::release`].
    pub lease_id: u64,
    /// Room-scale stage for bounded requests, when the hardware has one.
    pub stage: Option<StageGeometry>,
    /// Platform-shared origin (relative to the primary root) for stationary
    /// requests, when the platform defines one.
    pub shared_origin: Option<RigidTransform>,
}

/// Platform side of hardware-dependent negotiation.
#[async_trait]
pub trait TrackingPlatform: Send + Sync {
    /// Stable identifier for this platform, e.g. `"sim_platform"`.
    fn id(&self) -> &str;

    /// Try to provide `options` for a session of `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::HardwareCapabilityUnavailable`] or
    /// [`FrameError::Hardware`] when the platform cannot provide it.
    async fn acquire(
        &self,
        mode: SessionMode,
        options: FrameOfReferenceOptions,
    ) -> Result<PlatformGrant, FrameError>;

    /// Release whatever was set up for `lease_id`.  Idempotent.
    fn release(&self, lease_id: u64);
}

/// Platform with no hardware-dependent features at all.
///
/// Every acquisition fails with
/// [`FrameError::HardwareCapabilityUnavailable`], so only guaranteed options
/// can ever be granted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlatform;

#[async_trait]
impl TrackingPlatform for NoPlatform {
    fn id(&self) -> &str {
        "no_platform"
    }

    async fn acquire(
        &self,
        _mode: SessionMode,
        options: FrameOfReferenceOptions,
    ) -> Result<PlatformGrant, FrameError> {
        Err(FrameError::HardwareCapabilityUnavailable(options))
    }

    fn release(&self, _lease_id: u64) {}
}

/// Lets the user choose the floor height for the floor polyfill.
#[async_trait]
pub trait FloorSelector: Send + Sync {
    /// Ask for the floor height (y, in the primary root's space) given the
    /// viewer's current pose there.  `None` means the user declined.
    async fn select_floor(&self, viewer: RigidTransform) -> Option<f32>;
}

/// Floor selector that always answers with a fixed height.
#[derive(Debug, Clone, Copy)]
pub struct FixedFloorSelector {
    pub floor_y: f32,
}

#[async_trait]
impl FloorSelector for FixedFloorSelector {
    async fn select_floor(&self, _viewer: RigidTransform) -> Option<f32> {
        Some(self.floor_y)
    }
}

/// RAII ownership of platform resources behind a [`PlatformGrant`].
///
/// Dropping the lease calls [`TrackingPlatform::release`].
pub struct HardwareLease {
    platform: Arc<dyn TrackingPlatform>,
    grant: PlatformGrant,
}

impl HardwareLease {
    pub fn new(platform: Arc<dyn TrackingPlatform>, grant: PlatformGrant) -> Self {
        Self { platform, grant }
    }

    pub fn grant(&self) -> &PlatformGrant {
        &self.grant
    }
}

impl fmt::Debug for HardwareLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareLease")
            .field("platform", &self.platform.id())
            .field("lease_id", &self.grant.lease_id)
            .finish()
    }
}

impl Drop for HardwareLease {
    fn drop(&mut self) {
        debug!(
            platform = self.platform.id(),
            lease_id = self.grant.lease_id,
            "releasing hardware lease"
        );
        self.platform.release(self.grant.lease_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPlatform {
        released: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl TrackingPlatform for RecordingPlatform {
        fn id(&self) -> &str {
            "recording"
        }

        async fn acquire(
            &self,
            _mode: SessionMode,
            _options: FrameOfReferenceOptions,
        ) -> Result<PlatformGrant, FrameError> {
            Ok(PlatformGrant {
                lease_id: 7,
                stage: None,
                shared_origin: None,
            })
        }

        fn release(&self, lease_id: u64) {
            self.released.lock().unwrap().push(lease_id);
        }
    }

    #[tokio::test]
    async fn dropping_lease_releases_grant() {
        let platform = Arc::new(RecordingPlatform::default());
        let grant = platform
            .acquire(SessionMode::Immersive, FrameOfReferenceOptions::Bounded)
            .await
            .unwrap();
        let lease = HardwareLease::new(platform.clone(), grant);
        assert_eq!(lease.grant().lease_id, 7);
        assert!(platform.released.lock().unwrap().is_empty());

        drop(lease);
        assert_eq!(*platform.released.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn no_platform_refuses_everything() {
        for options in FrameOfReferenceOptions::all() {
            let result = NoPlatform.acquire(SessionMode::Immersive, options).await;
            assert_eq!(result, Err(FrameError::HardwareCapabilityUnavailable(options)));
        }
    }

    #[tokio::test]
    async fn fixed_floor_selector_answers_configured_height() {
        let selector = FixedFloorSelector { floor_y: -1.5 };
        assert_eq!(selector.select_floor(RigidTransform::identity()).await, Some(-1.5));
    }
}
