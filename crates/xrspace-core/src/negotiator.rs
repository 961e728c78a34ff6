//! [`Negotiator`] – turns an ordered list of frame-of-reference options into
//! one live [`FrameOfReference`].
//!
//! Options are tried strictly in order; the first one that succeeds wins and
//! later options are never attempted.  For each option:
//!
//! 1. Inline sessions reject bounded and unbounded requests outright.
//! 2. The [`TrackingCapability`][xrspace_tracking::TrackingCapability]
//!    snapshot grades the option; rejected options fail without touching the
//!    hardware.
//! 3. Hardware-dependent options need a located primary root and are
//!    negotiated with the [`TrackingPlatform`]; the resulting grant is held
//!    in a [`HardwareLease`] so a later failure (or cancellation) releases it.
//!    Guaranteed options survive transient tracking loss.
//! 4. The origin is placed by the [`OriginPolicy`], assuming a viewer at the
//!    emulated eye height when the real one cannot be located.
//!
//! When every option fails, the caller sees the common error if all attempts
//! failed the same way, and
//! [`FrameError::NoSupportedFrameOfReference`] otherwise.
//!
//! Negotiation is cancelled the moment the session's close signal fires;
//! the pending attempt is dropped and the result is
//! [`FrameError::SessionClosed`].

use std::iter;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use xrspace_geometry::RigidTransform;
use xrspace_tracking::{
    FloorSelector, HardwareLease, SpatialRoot, SpatialRootRegistry, TrackingPlatform, ViewerSample,
};
use xrspace_types::{
    Availability, FrameError, FrameOfReferenceOptions, SessionMode, StationarySubtype,
};

use crate::frame::{FrameKind, FrameOfReference, OriginPolicy, OriginSource};

/// The session state a negotiation reads.
#[derive(Debug, Clone, Copy)]
pub struct NegotiationContext<'a> {
    pub mode: SessionMode,
    pub registry: &'a SpatialRootRegistry,
    /// Most recent viewer sample, in internal space.
    pub viewer: Option<ViewerSample>,
}

/// Negotiates frames of reference against one platform.
pub struct Negotiator {
    platform: Arc<dyn TrackingPlatform>,
    floor_selector: Option<Arc<dyn FloorSelector>>,
    policy: OriginPolicy,
}

impl Negotiator {
    pub fn new(platform: Arc<dyn TrackingPlatform>, policy: OriginPolicy) -> Self {
        Self {
            platform,
            floor_selector: None,
            policy,
        }
    }

    /// Enable the floor polyfill for hardware without a native floor.
    pub fn with_floor_selector(mut self, selector: Arc<dyn FloorSelector>) -> Self {
        self.floor_selector = Some(selector);
        self
    }

    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    /// Try `primary`, then each of `fallbacks` in order.
    ///
    /// # Errors
    ///
    /// - [`FrameError::SessionClosed`] when `closed` reads (or becomes)
    ///   `true`, or its sender is gone.
    /// - The shared error when every attempt failed with the same kind.
    /// - [`FrameError::NoSupportedFrameOfReference`] otherwise.
    pub async fn request(
        &self,
        ctx: NegotiationContext<'_>,
        primary: FrameOfReferenceOptions,
        fallbacks: &[FrameOfReferenceOptions],
        mut closed: watch::Receiver<bool>,
    ) -> Result<FrameOfReference, FrameError> {
        let mut failures = Vec::new();
        for options in iter::once(primary).chain(fallbacks.iter().copied()) {
            if *closed.borrow_and_update() {
                return Err(FrameError::SessionClosed);
            }
            let outcome = tokio::select! {
                biased;
                _ = closed.wait_for(|is_closed| *is_closed) => {
                    warn!(%options, "session closed during negotiation");
                    return Err(FrameError::SessionClosed);
                }
                outcome = self.attempt(ctx, options) => outcome,
            };
            match outcome {
                Ok(frame) => {
                    info!(frame = %frame.id(), %options, "frame of reference granted");
                    return Ok(frame);
                }
                Err(err) => {
                    debug!(%options, error = %err, "frame of reference option failed");
                    failures.push(err);
                }
            }
        }
        Err(summarize(failures))
    }

    /// Static pre-check: can `options` possibly succeed in this context?
    ///
    /// Used to reject a required option before any hardware is started.
    ///
    /// # Errors
    ///
    /// [`FrameError::UnsupportedInSessionMode`] or
    /// [`FrameError::HardwareCapabilityUnavailable`].
    pub fn precheck(
        mode: SessionMode,
        registry: &SpatialRootRegistry,
        options: FrameOfReferenceOptions,
    ) -> Result<Availability, FrameError> {
        if mode == SessionMode::Inline
            && matches!(
                options,
                FrameOfReferenceOptions::Bounded | FrameOfReferenceOptions::Unbounded
            )
        {
            return Err(FrameError::UnsupportedInSessionMode { mode, options });
        }
        match registry.capability_for(mode).availability(&options) {
            Availability::Rejected => Err(FrameError::HardwareCapabilityUnavailable(options)),
            availability => Ok(availability),
        }
    }

    async fn attempt(
        &self,
        ctx: NegotiationContext<'_>,
        options: FrameOfReferenceOptions,
    ) -> Result<FrameOfReference, FrameError> {
        let availability = Self::precheck(ctx.mode, ctx.registry, options)?;
        let root = ctx.registry.primary().ok_or_else(|| FrameError::Hardware {
            component: "registry".to_string(),
            details: "no tracking-system root registered".to_string(),
        })?;
        if availability == Availability::HardwareDependent && !root.is_tracked() {
            return Err(FrameError::HardwareCapabilityUnavailable(options));
        }

        let lease = match availability {
            Availability::HardwareDependent => {
                let grant = self.platform.acquire(ctx.mode, options).await?;
                Some(HardwareLease::new(Arc::clone(&self.platform), grant))
            }
            _ => None,
        };

        let viewer = ctx
            .viewer
            .and_then(|v| root.localize(v.pose))
            .unwrap_or_else(|| {
                debug!(%options, "viewer not located; assuming emulated eye height");
                self.policy.fallback_viewer()
            });
        self.instantiate(root, options, viewer, lease).await
    }

    async fn instantiate(
        &self,
        root: &SpatialRoot,
        options: FrameOfReferenceOptions,
        viewer: RigidTransform,
        lease: Option<HardwareLease>,
    ) -> Result<FrameOfReference, FrameError> {
        let granted = lease.as_ref().map(HardwareLease::grant);
        let stage = granted
            .and_then(|g| g.stage.clone())
            .or_else(|| root.stage.clone());
        let shared = granted.and_then(|g| g.shared_origin);

        let (kind, source) = match options {
            FrameOfReferenceOptions::Bounded => match &stage {
                Some(stage) => (
                    FrameKind::Bounded {
                        bounds: stage.bounds.clone(),
                    },
                    OriginSource::Stage,
                ),
                None => {
                    let floor_y = self
                        .select_floor(viewer)
                        .await
                        .ok_or(FrameError::HardwareCapabilityUnavailable(options))?;
                    let bounds = self
                        .policy
                        .polyfill_bounds()
                        .ok_or(FrameError::HardwareCapabilityUnavailable(options))?;
                    (FrameKind::Bounded { bounds }, OriginSource::SelectedFloor(floor_y))
                }
            },
            FrameOfReferenceOptions::Unbounded => (FrameKind::Unbounded, OriginSource::Viewer),
            FrameOfReferenceOptions::Stationary { subtype } => {
                let source = match (subtype, shared) {
                    (_, Some(origin)) => OriginSource::Shared(origin),
                    (StationarySubtype::FloorLevel, None) if stage.is_some() => OriginSource::Stage,
                    (StationarySubtype::FloorLevel, None) => match self.select_floor(viewer).await {
                        Some(floor_y) => OriginSource::SelectedFloor(floor_y),
                        None => OriginSource::EmulatedFloor,
                    },
                    (StationarySubtype::EyeLevel | StationarySubtype::PositionDisabled, None) => {
                        OriginSource::Viewer
                    }
                };
                (FrameKind::Stationary { subtype }, source)
            }
        };

        let origin = self
            .policy
            .resolve(source, Some(viewer), stage.as_ref())
            .ok_or(FrameError::HardwareCapabilityUnavailable(options))?;
        Ok(FrameOfReference::new(root.id.clone(), origin, kind, source, lease))
    }

    async fn select_floor(&self, viewer: RigidTransform) -> Option<f32> {
        match &self.floor_selector {
            Some(selector) => selector.select_floor(viewer).await,
            None => None,
        }
    }
}

/// Collapse per-option failures into the error the caller sees.
fn summarize(failures: Vec<FrameError>) -> FrameError {
    let attempted = failures.len();
    let mut iter = failures.into_iter();
    let Some(first) = iter.next() else {
        return FrameError::NoSupportedFrameOfReference { attempted };
    };
    if iter.all(|err| err.same_kind(&first)) {
        first
    } else {
        FrameError::NoSupportedFrameOfReference { attempted }
    }
}
