//! [`SessionConfig`] – tunables for one session.
//!
//! Every field has a serde default, so a partial TOML or JSON document (or
//! none at all) yields a working configuration.
//!
//! ```rust
//! use xrspace_runtime::config::SessionConfig;
//!
//! let cfg: SessionConfig = serde_json::from_str(r#"{"emulated_eye_height_m": 1.7}"#).unwrap();
//! assert_eq!(cfg.emulated_eye_height_m, 1.7);
//! assert_eq!(cfg.reset.max_translation_jump_m, 0.5);
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use xrspace_core::{DriftPolicy, NoDriftCorrection, OriginPolicy, ResetPolicy, StepDriftCorrection};

fn default_eye_height() -> f32 {
    1.6
}

fn default_polyfill_half_extent() -> f32 {
    1.0
}

fn default_jump_translation() -> f32 {
    0.5
}

fn default_jump_rotation() -> f32 {
    0.5
}

fn default_recenter_distance() -> f32 {
    5.0
}

fn default_drift_step() -> f32 {
    0.01
}

/// Thresholds for treating a root pose change as a reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResetConfig {
    #[serde(default = "default_jump_translation")]
    pub max_translation_jump_m: f32,
    #[serde(default = "default_jump_rotation")]
    pub max_rotation_jump_rad: f32,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            max_translation_jump_m: default_jump_translation(),
            max_rotation_jump_rad: default_jump_rotation(),
        }
    }
}

/// Drift correction for unbounded frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DriftConfig {
    /// Off by default: unbounded origins never move.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_recenter_distance")]
    pub recenter_distance_m: f32,
    #[serde(default = "default_drift_step")]
    pub max_step_m: f32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            recenter_distance_m: default_recenter_distance(),
            max_step_m: default_drift_step(),
        }
    }
}

/// Tunables for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionConfig {
    /// Standing eye height assumed when the floor is unknown.
    #[serde(default = "default_eye_height")]
    pub emulated_eye_height_m: f32,
    /// Half extent of the square play area of the bounded polyfill.
    #[serde(default = "default_polyfill_half_extent")]
    pub polyfill_half_extent_m: f32,
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub drift: DriftConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            emulated_eye_height_m: default_eye_height(),
            polyfill_half_extent_m: default_polyfill_half_extent(),
            reset: ResetConfig::default(),
            drift: DriftConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy {
            emulated_eye_height_m: self.emulated_eye_height_m,
            polyfill_half_extent_m: self.polyfill_half_extent_m,
        }
    }

    pub fn reset_policy(&self) -> ResetPolicy {
        ResetPolicy {
            max_translation_jump_m: self.reset.max_translation_jump_m,
            max_rotation_jump_rad: self.reset.max_rotation_jump_rad,
        }
    }

    pub fn drift_policy(&self) -> Box<dyn DriftPolicy> {
        if self.drift.enabled {
            Box::new(StepDriftCorrection {
                recenter_distance_m: self.drift.recenter_distance_m,
                max_step_m: self.drift.max_step_m,
            })
        } else {
            Box::new(NoDriftCorrection)
        }
    }
}
