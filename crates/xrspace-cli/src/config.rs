//! Config file – reads/writes `~/.xrspace/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xrspace_geometry::Vec3;
use xrspace_runtime::SessionConfig;
use xrspace_tracking::NeckModel;
use xrspace_types::TrackingQuality;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Neck offsets used when the simulated headset only tracks orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeckProfile {
    #[serde(default = "default_neck_up")]
    pub neck_to_eye_up_m: f32,
    #[serde(default = "default_neck_forward")]
    pub neck_to_eye_forward_m: f32,
}

impl Default for NeckProfile {
    fn default() -> Self {
        Self {
            neck_to_eye_up_m: default_neck_up(),
            neck_to_eye_forward_m: default_neck_forward(),
        }
    }
}

impl NeckProfile {
    /// Neck model resting at `eye_height` above the internal origin.
    pub fn model(&self, eye_height: f32) -> NeckModel {
        NeckModel::new(
            Vec3::new(0.0, eye_height, 0.0),
            Vec3::new(0.0, self.neck_to_eye_up_m, -self.neck_to_eye_forward_m),
        )
    }
}

/// Persisted user configuration stored in `~/.xrspace/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Simulated render rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Quality class of the simulated headset.
    #[serde(default = "default_quality")]
    pub quality: TrackingQuality,

    /// Half extent of the simulated room-scale stage; no stage when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_half_extent_m: Option<f32>,

    #[serde(default)]
    pub neck: NeckProfile,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_tick_hz() -> u32 {
    72
}
fn default_quality() -> TrackingQuality {
    TrackingQuality::InsideOut
}
fn default_neck_up() -> f32 {
    0.075
}
fn default_neck_forward() -> f32 {
    0.0805
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            quality: default_quality(),
            stage_half_extent_m: None,
            neck: NeckProfile::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Return the path to `~/.xrspace/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".xrspace").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
/// `XRSPACE_*` overrides are applied to whatever was read.
pub fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: Config = toml::from_str(&raw)?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load `path`, falling back to defaults (with overrides) when it is absent.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `XRSPACE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `XRSPACE_EYE_HEIGHT` | `session.emulated_eye_height_m` |
/// | `XRSPACE_TICK_HZ` | `tick_hz` |
/// | `XRSPACE_QUALITY` | `quality` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("XRSPACE_EYE_HEIGHT")
        && let Ok(height) = v.trim().parse::<f32>()
        && height > 0.0
    {
        cfg.session.emulated_eye_height_m = height;
    }
    if let Some(v) = lookup("XRSPACE_TICK_HZ")
        && let Ok(hz) = v.trim().parse::<u32>()
        && hz > 0
    {
        cfg.tick_hz = hz;
    }
    if let Some(v) = lookup("XRSPACE_QUALITY")
        && let Ok(quality) = v.parse::<TrackingQuality>()
    {
        cfg.quality = quality;
    }
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let raw = toml::to_string_pretty(cfg)?;
    fs::write(path, raw).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
