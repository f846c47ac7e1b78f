//! Highlight color resolution.
//!
//! Precedence, highest first: per-part patch colors, the global selection
//! color, then the configured default. Colors are resolved when a highlight
//! is applied and never cached.

use crate::error::ViewerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default highlight of the configurable viewer variant.
pub const DEFAULT_HIGHLIGHT_COLOR: Rgba = Rgba([0.0, 1.0, 0.0, 1.0]);

/// Fixed highlight used by the older, non-configurable viewer variant.
pub const LEGACY_HIGHLIGHT_COLOR: Rgba = Rgba([1.0, 0.0, 0.0, 1.0]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    /// Builds a color from host-supplied components. Exactly four are
    /// required; values outside `[0, 1]` pass through unclamped.
    pub fn from_components(components: &[f64]) -> Result<Self, ViewerError> {
        match components {
            [r, g, b, a] => Ok(Self([*r as f32, *g as f32, *b as f32, *a as f32])),
            _ => Err(ViewerError::invalid(format!(
                "color must have exactly 4 components, got {}",
                components.len()
            ))),
        }
    }
}

pub type PatchColors = HashMap<String, Rgba>;

/// Color tables supplied with a load request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorConfig {
    pub patch_colors: Option<PatchColors>,
    pub selection_color: Option<Rgba>,
}

impl ColorConfig {
    pub fn resolve(&self, entity_name: Option<&str>, default: Rgba) -> Rgba {
        resolve(
            entity_name,
            self.patch_colors.as_ref(),
            self.selection_color,
            default,
        )
    }
}

pub fn resolve(
    entity_name: Option<&str>,
    patch_colors: Option<&PatchColors>,
    selection_color: Option<Rgba>,
    default: Rgba,
) -> Rgba {
    entity_name
        .and_then(|name| patch_colors.and_then(|patches| patches.get(name)))
        .copied()
        .or(selection_color)
        .unwrap_or(default)
}
