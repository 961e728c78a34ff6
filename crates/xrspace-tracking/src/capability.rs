//! [`TrackingCapability`] – which frame-of-reference types a session can get.
//!
//! The snapshot is derived from the session mode and the quality class of the
//! primary tracking root:
//!
//! | Type/Subtype | Inline | Immersive |
//! |---|---|---|
//! | stationary/position-disabled | hardware-dependent | guaranteed |
//! | stationary/eye-level | hardware-dependent | guaranteed |
//! | stationary/floor-level | hardware-dependent | guaranteed |
//! | bounded | rejected | hardware-dependent (6-DoF only) |
//! | unbounded | rejected | hardware-dependent (inside-out only) |
//!
//! Immersive floor-level stays guaranteed on hardware without a native floor:
//! the negotiator falls back to a floor-selection polyfill or an emulated eye
//! height.

use std::collections::HashMap;

use xrspace_types::{Availability, FrameOfReferenceOptions, SessionMode, TrackingQuality};

/// Availability of every type/subtype for one session mode.
///
/// # Example
///
/// ```
/// use xrspace_tracking::capability::TrackingCapability;
/// use xrspace_types::{Availability, FrameOfReferenceOptions, SessionMode, TrackingQuality};
///
/// let cap = TrackingCapability::derive(SessionMode::Immersive, TrackingQuality::OrientationOnly);
/// assert_eq!(cap.availability(&FrameOfReferenceOptions::Bounded), Availability::Rejected);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingCapability {
    mode: SessionMode,
    quality: TrackingQuality,
    entries: HashMap<FrameOfReferenceOptions, Availability>,
}

impl TrackingCapability {
    /// Compute the availability matrix for `mode` on hardware of `quality`.
    pub fn derive(mode: SessionMode, quality: TrackingQuality) -> Self {
        let entries = FrameOfReferenceOptions::all()
            .into_iter()
            .map(|opts| (opts, Self::grade(mode, quality, opts)))
            .collect();
        Self {
            mode,
            quality,
            entries,
        }
    }

    fn grade(
        mode: SessionMode,
        quality: TrackingQuality,
        opts: FrameOfReferenceOptions,
    ) -> Availability {
        match (mode, opts) {
            (SessionMode::Inline, FrameOfReferenceOptions::Stationary { .. }) => {
                Availability::HardwareDependent
            }
            (SessionMode::Inline, _) => Availability::Rejected,
            (SessionMode::Immersive, FrameOfReferenceOptions::Stationary { .. }) => {
                Availability::Guaranteed
            }
            (SessionMode::Immersive, FrameOfReferenceOptions::Bounded) if quality.is_six_dof() => {
                Availability::HardwareDependent
            }
            (SessionMode::Immersive, FrameOfReferenceOptions::Unbounded)
                if quality == TrackingQuality::InsideOut =>
            {
                Availability::HardwareDependent
            }
            (SessionMode::Immersive, _) => Availability::Rejected,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn quality(&self) -> TrackingQuality {
        self.quality
    }

    /// Availability grade of `opts`.
    pub fn availability(&self, opts: &FrameOfReferenceOptions) -> Availability {
        self.entries
            .get(opts)
            .copied()
            .unwrap_or(Availability::Rejected)
    }
}
