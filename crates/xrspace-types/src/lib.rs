//! `xrspace-types` – shared vocabulary of the spatial reference-frame
//! subsystem.
//!
//! Every other crate in the workspace speaks in these types: session modes,
//! frame-of-reference request options, tracking-quality classes, the
//! availability grades of the negotiation matrix, reset notifications, and the
//! global [`FrameError`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Stable identity of a spatial root (e.g. `"tracking_system"`, `"anchor_7"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpatialRootId(pub String);

impl SpatialRootId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpatialRootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a frame of reference created by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub Uuid);

impl FrameId {
    /// Allocate a fresh, random frame identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an input source (controller, hand, gaze) as reported by the
/// input layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSourceId(pub String);

impl InputSourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for InputSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sessions and requests
// ────────────────────────────────────────────────────────────────────────────

/// Session modes with differing permission and capability guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Rendered into a page or window; tracking is optional.
    Inline,
    /// Exclusive presentation on the XR hardware.
    Immersive,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Inline => f.write_str("inline"),
            SessionMode::Immersive => f.write_str("immersive"),
        }
    }
}

/// Subtypes of a stationary frame of reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StationarySubtype {
    /// Origin on the floor beneath the user.
    FloorLevel,
    /// Origin near the user's head.
    EyeLevel,
    /// Origin near the user's head; positions are always reported as zero.
    PositionDisabled,
}

impl StationarySubtype {
    pub const ALL: [StationarySubtype; 3] = [
        StationarySubtype::FloorLevel,
        StationarySubtype::EyeLevel,
        StationarySubtype::PositionDisabled,
    ];
}

/// A single frame-of-reference request, as passed to
/// `request_frame_of_reference` (either as the primary option or as one of
/// the fallbacks).
///
/// Serialises to the familiar `{"type": "stationary", "subtype": "eye-level"}`
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FrameOfReferenceOptions {
    /// Room-scale tracking within a known play area.
    Bounded,
    /// World-scale tracking without a movement limit.
    Unbounded,
    /// The user is expected to stay near the origin.
    Stationary { subtype: StationarySubtype },
}

impl FrameOfReferenceOptions {
    /// Shorthand for a stationary request.
    pub fn stationary(subtype: StationarySubtype) -> Self {
        Self::Stationary { subtype }
    }

    /// Every type/subtype combination, in availability-matrix order.
    pub fn all() -> [FrameOfReferenceOptions; 5] {
        [
            Self::stationary(StationarySubtype::PositionDisabled),
            Self::stationary(StationarySubtype::EyeLevel),
            Self::stationary(StationarySubtype::FloorLevel),
            Self::Bounded,
            Self::Unbounded,
        ]
    }
}

impl fmt::Display for FrameOfReferenceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded => f.write_str("bounded"),
            Self::Unbounded => f.write_str("unbounded"),
            Self::Stationary { subtype } => match subtype {
                StationarySubtype::FloorLevel => f.write_str("stationary/floor-level"),
                StationarySubtype::EyeLevel => f.write_str("stationary/eye-level"),
                StationarySubtype::PositionDisabled => {
                    f.write_str("stationary/position-disabled")
                }
            },
        }
    }
}

/// A label that names no known mode, option or quality class.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl FromStr for SessionMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(SessionMode::Inline),
            "immersive" => Ok(SessionMode::Immersive),
            _ => Err(ParseError {
                kind: "session mode",
                value: s.to_string(),
                expected: "inline, immersive",
            }),
        }
    }
}

/// Accepts the [`Display`][fmt::Display] labels, plus the bare subtype
/// (`eye-level`) as shorthand for a stationary request.
impl FromStr for FrameOfReferenceOptions {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        let subtype = label.strip_prefix("stationary/").unwrap_or(&label);
        match (label.as_str(), subtype) {
            ("bounded", _) => Ok(Self::Bounded),
            ("unbounded", _) => Ok(Self::Unbounded),
            (_, "floor-level") => Ok(Self::stationary(StationarySubtype::FloorLevel)),
            (_, "eye-level") => Ok(Self::stationary(StationarySubtype::EyeLevel)),
            (_, "position-disabled") => Ok(Self::stationary(StationarySubtype::PositionDisabled)),
            _ => Err(ParseError {
                kind: "frame of reference",
                value: s.to_string(),
                expected: "bounded, unbounded, stationary/floor-level, stationary/eye-level, \
                           stationary/position-disabled",
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tracking capability
// ────────────────────────────────────────────────────────────────────────────

/// Tracking-quality class of a spatial root.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingQuality {
    /// No tracking at all (e.g. a desktop display).
    None,
    /// Three degrees of freedom; position can only be neck-modelled.
    OrientationOnly,
    /// Six degrees of freedom from external sensors; fixed tracking volume.
    OutsideIn,
    /// Six degrees of freedom from on-device sensors; can roam.
    InsideOut,
}

impl TrackingQuality {
    /// `true` for classes that track position natively.
    pub fn is_six_dof(self) -> bool {
        matches!(self, TrackingQuality::OutsideIn | TrackingQuality::InsideOut)
    }
}

impl fmt::Display for TrackingQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingQuality::None => f.write_str("none"),
            TrackingQuality::OrientationOnly => f.write_str("orientation-only"),
            TrackingQuality::OutsideIn => f.write_str("outside-in"),
            TrackingQuality::InsideOut => f.write_str("inside-out"),
        }
    }
}

impl FromStr for TrackingQuality {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "none" => Ok(TrackingQuality::None),
            "orientation-only" | "3dof" => Ok(TrackingQuality::OrientationOnly),
            "outside-in" => Ok(TrackingQuality::OutsideIn),
            "inside-out" | "6dof" => Ok(TrackingQuality::InsideOut),
            _ => Err(ParseError {
                kind: "tracking quality",
                value: s.to_string(),
                expected: "none, orientation-only, outside-in, inside-out",
            }),
        }
    }
}

/// How strongly a frame-of-reference type/subtype is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    /// Always granted for this session mode.
    Guaranteed,
    /// Needs a platform-specific negotiation which may fail.
    HardwareDependent,
    /// Never granted with the current hardware and session mode.
    Rejected,
}

// ────────────────────────────────────────────────────────────────────────────
// Input sources
// ────────────────────────────────────────────────────────────────────────────

/// Which hand an input source is held in, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    #[default]
    None,
    Left,
    Right,
}

/// How the target ray of an input source is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetRayMode {
    /// Ray follows the viewer's gaze.
    #[default]
    Gaze,
    /// Ray originates at a tracked controller.
    TrackedPointer,
    /// Ray cast from a screen tap.
    Screen,
}

// ────────────────────────────────────────────────────────────────────────────
// Reset notifications
// ────────────────────────────────────────────────────────────────────────────

/// Notification that the origin of a bounded or stationary frame has been
/// realigned to the user's current physical location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetEvent {
    /// The frame whose origin changed.
    pub frame: FrameId,
    /// Per-session delivery sequence number, strictly increasing.
    pub sequence: u64,
    /// Tick on which the discontinuity was detected.
    pub tick: u64,
    /// Wall-clock time of detection.
    pub timestamp: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type of the reference-frame subsystem.
///
/// Transient tracking loss is deliberately absent: it is reported as
/// `Ok(None)` from pose queries.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameError {
    #[error("{options} is not supported in {mode} sessions")]
    UnsupportedInSessionMode {
        mode: SessionMode,
        options: FrameOfReferenceOptions,
    },

    #[error("{0} is unavailable with the current tracking hardware")]
    HardwareCapabilityUnavailable(FrameOfReferenceOptions),

    #[error("No supported frame of reference among {attempted} option(s)")]
    NoSupportedFrameOfReference { attempted: usize },

    #[error("Session closed")]
    SessionClosed,

    #[error("Unknown frame of reference: {0}")]
    InvalidFrame(FrameId),

    #[error("Spatial root not found: {0}")]
    RootNotFound(SpatialRootId),

    #[error("Unknown input source: {0}")]
    UnknownInputSource(InputSourceId),

    #[error("Hardware Fault on {component}: {details}")]
    Hardware { component: String, details: String },
}

impl FrameError {
    /// `true` when both errors are the same variant, ignoring payloads.
    pub fn same_kind(&self, other: &FrameError) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
