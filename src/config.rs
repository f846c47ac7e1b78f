//! Viewer configuration, loaded from a JSON file with every field defaulted.

use crate::engine::ViewOptions;
use crate::render::color::{Rgba, DEFAULT_HIGHLIGHT_COLOR};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid artifact pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Viewer settings. Every field has a default, so a partial JSON file works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Fit each model into a unit cube in front of the camera, or keep the
    /// root transform as authored.
    pub auto_scale: bool,
    pub highlight: HighlightConfig,
    pub camera: CameraConfig,
    pub picking: PickingConfig,
    pub environment: EnvironmentConfig,
    pub view_options: ViewOptions,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            auto_scale: true,
            highlight: HighlightConfig::default(),
            camera: CameraConfig::default(),
            picking: PickingConfig::default(),
            environment: EnvironmentConfig::default(),
            view_options: ViewOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Used when a load supplies neither a patch nor a selection color.
    /// `LEGACY_HIGHLIGHT_COLOR` reproduces the older red highlight.
    pub default_color: Rgba,
    pub emissive_strength: f32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            default_color: DEFAULT_HIGHLIGHT_COLOR,
            emissive_strength: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub default_fov_deg: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_fov_deg: 50.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickingConfig {
    /// Surface origin is top-left, engine pick origin bottom-left.
    pub flip_y: bool,
    /// Node names matching any of these are exporter artifacts, not parts.
    pub artifact_patterns: Vec<String>,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            flip_y: true,
            artifact_patterns: vec![r"^Mesh\.".to_string(), r"\.\d{3}$".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub ibl_intensity: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            ibl_intensity: 30_000.0,
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        if !(camera.default_fov_deg.is_finite() && camera.default_fov_deg > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.default_fov_deg must be > 0, got {}",
                camera.default_fov_deg
            )));
        }
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera clip planes must satisfy 0 < near < far, got {} / {}",
                camera.near, camera.far
            )));
        }
        if !(self.highlight.emissive_strength >= 0.0) {
            return Err(ConfigError::Invalid(
                "highlight.emissive_strength must be >= 0".to_string(),
            ));
        }
        if !(self.environment.ibl_intensity >= 0.0) {
            return Err(ConfigError::Invalid(
                "environment.ibl_intensity must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<ViewerConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: ViewerConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &ViewerConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
