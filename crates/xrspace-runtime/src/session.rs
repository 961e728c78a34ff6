//! [`XrSession`] – one XR session and its frames of reference.
//!
//! The session owns the tracking source, the root registry, every frame it
//! handed out, and the reset machinery.  The host drives it once per render
//! tick:
//!
//! 1. **Sample** – read the [`TrackingSource`] for this tick.
//! 2. **Register** – fold roots and quality changes into the
//!    [`SpatialRootRegistry`] (recomputing capability when quality changes).
//! 3. **Detect** – let the [`ResetCoordinator`] compare each frame's root
//!    against last tick and stage realignments.
//! 4. **Deliver** – notify reset listeners, then commit the new origins.
//!
//! Pose queries made after [`tick`][XrSession::tick] returns see the
//! committed origins of this tick.
//!
//! # Example
//!
//! ```rust
//! use xrspace_runtime::XrSession;
//! use xrspace_tracking::SimTrackingSource;
//! use xrspace_types::{FrameOfReferenceOptions, SessionMode, StationarySubtype, TrackingQuality};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let mut session = XrSession::builder(SessionMode::Immersive)
//!     .source(SimTrackingSource::builder(TrackingQuality::InsideOut).build())
//!     .start()
//!     .await
//!     .expect("session start");
//!
//! let eye = session
//!     .request_frame_of_reference(
//!         FrameOfReferenceOptions::stationary(StationarySubtype::EyeLevel),
//!         &[],
//!     )
//!     .await
//!     .expect("eye-level is guaranteed in immersive sessions");
//!
//! session.tick().expect("tick");
//! let pose = session.device_pose(Some(eye)).expect("valid frame");
//! assert!(pose.is_some());
//! # });
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, instrument};
use uuid::Uuid;
use xrspace_core::{
    CoordinateSystem, CoordinateSystemResolver, DevicePose, DriftPolicy, FrameOfReference,
    FrameTable, InputPose, NegotiationContext, Negotiator, PoseQueryEngine, ResetCoordinator,
    ResetListener, ResetState,
};
use xrspace_geometry::{BoundsGeometry, Matrix4, RigidTransform};
use xrspace_tracking::{
    FloorSelector, NoPlatform, SpatialRootRegistry, TrackingCapability, TrackingPlatform,
    TrackingSample, TrackingSource,
};
use xrspace_types::{
    FrameError, FrameId, FrameOfReferenceOptions, InputSourceId, ResetEvent, SessionMode,
};

use crate::config::SessionConfig;

// ────────────────────────────────────────────────────────────────────────────
// Closing
// ────────────────────────────────────────────────────────────────────────────

/// Handle that closes a session from outside, e.g. from a signal handler or
/// a concurrent task while a negotiation is pending.
#[derive(Debug, Clone)]
pub struct SessionCloser {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionCloser {
    /// Close the session.  Pending negotiations fail with
    /// [`FrameError::SessionClosed`]; the session releases its hardware on
    /// the next call into it (or when dropped).
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Outcome of one [`XrSession::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Resets delivered this tick, in delivery order.
    pub resets: Vec<ResetEvent>,
    /// `false` while the viewer cannot be located.
    pub viewer_tracked: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Configures and starts an [`XrSession`].
pub struct SessionBuilder {
    mode: SessionMode,
    source: Option<Box<dyn TrackingSource>>,
    platform: Arc<dyn TrackingPlatform>,
    floor_selector: Option<Arc<dyn FloorSelector>>,
    config: SessionConfig,
    drift: Option<Box<dyn DriftPolicy>>,
    required: Option<FrameOfReferenceOptions>,
}

impl SessionBuilder {
    fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            source: None,
            platform: Arc::new(NoPlatform),
            floor_selector: None,
            config: SessionConfig::default(),
            drift: None,
            required: None,
        }
    }

    pub fn source(self, source: impl TrackingSource + 'static) -> Self {
        self.boxed_source(Box::new(source))
    }

    pub fn boxed_source(mut self, source: Box<dyn TrackingSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Backend for hardware-dependent negotiation.  Without one, only
    /// guaranteed options can be granted.
    pub fn platform(mut self, platform: Arc<dyn TrackingPlatform>) -> Self {
        self.platform = platform;
        self
    }

    /// Enable the floor polyfill.
    pub fn floor_selector(mut self, selector: Arc<dyn FloorSelector>) -> Self {
        self.floor_selector = Some(selector);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the drift policy derived from the config.
    pub fn drift_policy(mut self, drift: Box<dyn DriftPolicy>) -> Self {
        self.drift = Some(drift);
        self
    }

    /// Make session creation depend on `options` being granted.  The frame
    /// is available afterwards as [`XrSession::required_frame`].
    pub fn require(mut self, options: FrameOfReferenceOptions) -> Self {
        self.required = Some(options);
        self
    }

    /// Start the tracking hardware and open the session.
    ///
    /// A required option that can never succeed is rejected before the
    /// hardware is started.  A required option that fails negotiation stops
    /// the hardware again.
    ///
    /// # Errors
    ///
    /// - [`FrameError::Hardware`] when no source is configured or it fails.
    /// - Any negotiation error of the required option.
    pub async fn start(self) -> Result<XrSession, FrameError> {
        let mut source = self.source.ok_or_else(|| FrameError::Hardware {
            component: "session".to_string(),
            details: "no tracking source configured".to_string(),
        })?;

        let mut registry = SpatialRootRegistry::new();
        for root in source.describe_roots() {
            registry.register(root);
        }
        if let Some(required) = self.required {
            Negotiator::precheck(self.mode, &registry, required)?;
        }

        source.start()?;

        let mut negotiator = Negotiator::new(self.platform, self.config.origin_policy());
        if let Some(selector) = self.floor_selector {
            negotiator = negotiator.with_floor_selector(selector);
        }
        let drift = self.drift.unwrap_or_else(|| self.config.drift_policy());
        let resets = ResetCoordinator::new(self.config.reset_policy(), self.config.origin_policy())
            .with_drift_policy(drift);
        let (tx, _rx) = watch::channel(false);

        let mut session = XrSession {
            id: Uuid::new_v4(),
            mode: self.mode,
            source,
            registry,
            negotiator,
            frames: FrameTable::new(),
            resets,
            sample: TrackingSample::default(),
            tick: 0,
            close_tx: Arc::new(tx),
            ended: false,
            required_frame: None,
        };

        if let Err(e) = session.prime() {
            session.end();
            return Err(e);
        }
        if let Some(required) = self.required {
            match session.request_frame_of_reference(required, &[]).await {
                Ok(id) => session.required_frame = Some(id),
                Err(e) => {
                    session.end();
                    return Err(e);
                }
            }
        }

        info!(session = %session.id, mode = %session.mode, source = session.source.id(), "session started");
        Ok(session)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// XrSession
// ────────────────────────────────────────────────────────────────────────────

/// One XR session.
pub struct XrSession {
    id: Uuid,
    mode: SessionMode,
    source: Box<dyn TrackingSource>,
    registry: SpatialRootRegistry,
    negotiator: Negotiator,
    frames: FrameTable,
    resets: ResetCoordinator,
    /// The sample of the most recent tick.
    sample: TrackingSample,
    tick: u64,
    close_tx: Arc<watch::Sender<bool>>,
    ended: bool,
    required_frame: Option<FrameId>,
}

impl XrSession {
    pub fn builder(mode: SessionMode) -> SessionBuilder {
        SessionBuilder::new(mode)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Number of ticks run so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Frame granted for the option passed to [`SessionBuilder::require`].
    pub fn required_frame(&self) -> Option<FrameId> {
        self.required_frame
    }

    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            tx: Arc::clone(&self.close_tx),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ended || *self.close_tx.borrow()
    }

    pub fn registry(&self) -> &SpatialRootRegistry {
        &self.registry
    }

    /// Current capability snapshot for this session's mode.
    pub fn capability(&self) -> TrackingCapability {
        self.registry.capability_for(self.mode)
    }

    // ── Frames ────────────────────────────────────────────────────────────────

    /// Negotiate a frame of reference: `primary` first, then `fallbacks` in
    /// order.
    ///
    /// # Errors
    ///
    /// [`FrameError::SessionClosed`] if the session is (or gets) closed
    /// while negotiating; otherwise the negotiation outcome described on
    /// [`Negotiator::request`].
    #[instrument(
        name = "session.request_frame_of_reference",
        skip_all,
        fields(session = %self.id, %primary, fallbacks = fallbacks.len())
    )]
    pub async fn request_frame_of_reference(
        &mut self,
        primary: FrameOfReferenceOptions,
        fallbacks: &[FrameOfReferenceOptions],
    ) -> Result<FrameId, FrameError> {
        self.ensure_open()?;
        let ctx = NegotiationContext {
            mode: self.mode,
            registry: &self.registry,
            viewer: self.sample.viewer,
        };
        let frame = self
            .negotiator
            .request(ctx, primary, fallbacks, self.close_tx.subscribe())
            .await?;
        self.ensure_open()?;
        self.resets.track(&frame, &self.registry);
        Ok(self.frames.insert(frame))
    }

    /// # Errors
    ///
    /// [`FrameError::InvalidFrame`] for frames not owned by this session.
    pub fn frame(&self, id: FrameId) -> Result<&FrameOfReference, FrameError> {
        self.frames.get(id).ok_or(FrameError::InvalidFrame(id))
    }

    /// Every live frame, in creation order.
    pub fn frame_ids(&self) -> Vec<FrameId> {
        self.frames.iter().map(FrameOfReference::id).collect()
    }

    /// Drop a frame, releasing any platform resources behind it.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidFrame`] for frames not owned by this session.
    pub fn release_frame(&mut self, id: FrameId) -> Result<(), FrameError> {
        self.frames.remove(id).ok_or(FrameError::InvalidFrame(id))?;
        self.resets.forget(id);
        Ok(())
    }

    /// Play area of a bounded frame; `None` for other types.
    ///
    /// # Errors
    ///
    /// [`FrameError::SessionClosed`] or [`FrameError::InvalidFrame`].
    pub fn bounds_geometry(&self, frame: FrameId) -> Result<Option<BoundsGeometry>, FrameError> {
        self.ensure_open()?;
        Ok(self.frame(frame)?.bounds().cloned())
    }

    /// Register a listener for resets of `frame`.  Unbounded frames accept
    /// listeners but never notify them.
    ///
    /// # Errors
    ///
    /// [`FrameError::SessionClosed`] or [`FrameError::InvalidFrame`].
    pub fn on_reset(
        &mut self,
        frame: FrameId,
        listener: impl ResetListener + 'static,
    ) -> Result<(), FrameError> {
        self.ensure_open()?;
        self.frame(frame)?;
        self.resets.add_listener(frame, Box::new(listener));
        Ok(())
    }

    pub fn reset_state(&self, frame: FrameId) -> Option<ResetState> {
        self.resets.state(frame)
    }

    // ── Per-tick processing ───────────────────────────────────────────────────

    /// Advance one render tick.
    ///
    /// # Errors
    ///
    /// [`FrameError::SessionClosed`] once closed (the hardware is released
    /// on that call), or [`FrameError::Hardware`] when sampling fails.
    #[instrument(name = "session.tick", skip_all, fields(session = %self.id, tick = self.tick + 1))]
    pub fn tick(&mut self) -> Result<TickReport, FrameError> {
        if self.is_closed() {
            self.end();
            return Err(FrameError::SessionClosed);
        }
        self.tick += 1;
        let sample = self.source.sample(self.tick)?;
        self.registry.apply_sample(&sample);
        self.resets
            .detect(self.tick, &self.registry, &mut self.frames, sample.viewer);
        let resets = self.resets.drain(&mut self.frames);
        let viewer_tracked = sample.viewer.is_some();
        self.sample = sample;
        Ok(TickReport {
            tick: self.tick,
            resets,
            viewer_tracked,
        })
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Viewer pose in `frame`.  `None` (the null frame) always yields
    /// identity, even on a closed session.
    ///
    /// # Errors
    ///
    /// [`FrameError::SessionClosed`] or [`FrameError::InvalidFrame`].
    /// Transient tracking loss is `Ok(None)`.
    pub fn device_pose(&self, frame: Option<FrameId>) -> Result<Option<DevicePose>, FrameError> {
        if frame.is_some() {
            self.ensure_open()?;
        }
        self.poses().device_pose(frame)
    }

    /// Pose of an input source in `frame` (identity for the null frame).
    ///
    /// # Errors
    ///
    /// [`FrameError::UnknownInputSource`], [`FrameError::SessionClosed`] or
    /// [`FrameError::InvalidFrame`].
    pub fn input_pose(
        &self,
        input: &InputSourceId,
        frame: Option<FrameId>,
    ) -> Result<Option<InputPose>, FrameError> {
        if frame.is_some() {
            self.ensure_open()?;
        }
        self.poses().input_pose(input, frame)
    }

    /// Input sources enumerated on the latest tick.
    pub fn input_sources(&self) -> Vec<InputSourceId> {
        self.sample.inputs.iter().map(|i| i.id.clone()).collect()
    }

    /// Matrix mapping coordinates in `from` into coordinates in `to`.
    ///
    /// # Errors
    ///
    /// [`FrameError::SessionClosed`], [`FrameError::InvalidFrame`] or
    /// [`FrameError::RootNotFound`].  `Ok(None)` while either side cannot be
    /// located.
    pub fn transform_to(
        &self,
        from: &CoordinateSystem,
        to: &CoordinateSystem,
    ) -> Result<Option<Matrix4>, FrameError> {
        Ok(self.relative_transform(from, to)?.map(RigidTransform::to_matrix))
    }

    /// Like [`transform_to`][Self::transform_to], as a rigid transform.
    ///
    /// # Errors
    ///
    /// Same as [`transform_to`][Self::transform_to].
    pub fn relative_transform(
        &self,
        from: &CoordinateSystem,
        to: &CoordinateSystem,
    ) -> Result<Option<RigidTransform>, FrameError> {
        self.ensure_open()?;
        CoordinateSystemResolver::new(&self.registry, &self.frames).transform_between(from, to)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// End the session: cancel pending negotiations, release every frame and
    /// its platform resources, and stop the tracking hardware.  Idempotent.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.close_tx.send_replace(true);
        self.resets.clear();
        self.frames.clear();
        self.source.stop();
        self.ended = true;
        info!(session = %self.id, ticks = self.tick, "session ended");
    }

    fn prime(&mut self) -> Result<(), FrameError> {
        let sample = self.source.sample(0)?;
        self.registry.apply_sample(&sample);
        self.sample = sample;
        Ok(())
    }

    fn poses(&self) -> PoseQueryEngine<'_> {
        PoseQueryEngine::new(&self.registry, &self.frames, &self.sample)
    }

    fn ensure_open(&self) -> Result<(), FrameError> {
        if self.is_closed() {
            Err(FrameError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for XrSession {
    fn drop(&mut self) {
        self.end();
    }
}
