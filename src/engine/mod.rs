//! Rendering engine boundary.
//!
//! The viewer core never touches GPU objects directly. Everything it needs
//! from a rendering backend (scene graph queries, material parameters,
//! fences, picking, the per-frame render step) goes through [`SceneEngine`].
//! A backend owns its objects on the thread that drives the frame loop; the
//! trait is deliberately not `Send`.

pub mod headless;

pub use headless::{EnvironmentInfo, HeadlessEngine, NodeHandle};

#[cfg(test)]
pub(crate) use headless::fixtures;

use crate::assets::ModelFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::time::Instant;

/// Opaque, comparable entity key chosen by the engine binding.
///
/// Keys are serialized into selection events and parsed back from host
/// commands, so they must round-trip through serde.
pub trait EntityKey:
    Copy + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + 'static
{
}

impl<T> EntityKey for T where T: Copy + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + 'static
{}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("environment rejected: {0}")]
    Environment(String),
    #[error("render step failed: {0}")]
    Render(String),
}

/// Tintable parameters of one material primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub base_color_rgba: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive_rgb: [f32; 3],
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color_rgba: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            emissive_rgb: [0.0, 0.0, 0.0],
        }
    }
}

/// Snapshot of every primitive's material parameters on a drawable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Appearance {
    pub primitives: Vec<MaterialParams>,
}

impl Appearance {
    pub fn new(primitives: Vec<MaterialParams>) -> Self {
        Self { primitives }
    }

    /// Highlight variant: base color replaced by `rgba`, emissive tinted with
    /// the same color at `emissive_strength` so lighting cannot wash it out.
    pub fn highlighted(&self, rgba: [f32; 4], emissive_strength: f32) -> Self {
        let emissive = [
            rgba[0] * emissive_strength,
            rgba[1] * emissive_strength,
            rgba[2] * emissive_strength,
        ];
        Self {
            primitives: self
                .primitives
                .iter()
                .map(|params| MaterialParams {
                    base_color_rgba: rgba,
                    emissive_rgb: emissive,
                    ..*params
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Pending,
    Satisfied,
    Error,
}

/// Result of one engine pick query. `entity` is `None` when nothing was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickHit<K> {
    pub x: u32,
    pub y: u32,
    pub entity: Option<K>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fov {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_deg: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    pub direction: Fov,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Low,
    Medium,
    High,
    Ultra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiAliasing {
    None,
    Fxaa,
}

/// View quality options applied together with an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub hdr_color_buffer: QualityLevel,
    pub dynamic_resolution: bool,
    pub dynamic_resolution_quality: QualityLevel,
    pub msaa: bool,
    pub anti_aliasing: AntiAliasing,
    pub ambient_occlusion: bool,
    pub bloom: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            hdr_color_buffer: QualityLevel::Medium,
            dynamic_resolution: true,
            dynamic_resolution_quality: QualityLevel::Medium,
            msaa: true,
            anti_aliasing: AntiAliasing::Fxaa,
            ambient_occlusion: true,
            bloom: true,
        }
    }
}

/// Lookup table for external resources referenced by a scene description.
///
/// A miss returns an empty slice; decode continues with the placeholder.
pub trait ResourceResolver {
    fn resolve(&self, uri: &str) -> &[u8];
}

/// Capability interface a rendering backend implements for the viewer.
pub trait SceneEngine {
    type Entity: EntityKey;

    // Model lifecycle.
    fn load_model(
        &mut self,
        bytes: &[u8],
        format: ModelFormat,
        resources: &dyn ResourceResolver,
    ) -> Result<(), EngineError>;
    fn destroy_model(&mut self);
    fn transform_to_unit_cube(&mut self);
    fn clear_root_transform(&mut self);

    // Scene graph queries against the current scene.
    fn entities(&self) -> Vec<Self::Entity>;
    fn is_live(&self, entity: Self::Entity) -> bool;
    fn name(&self, entity: Self::Entity) -> Option<String>;
    fn parent(&self, entity: Self::Entity) -> Option<Self::Entity>;
    fn children(&self, entity: Self::Entity) -> Vec<Self::Entity>;
    fn has_geometry(&self, entity: Self::Entity) -> bool;
    fn set_visible(&mut self, entity: Self::Entity, visible: bool) -> bool;

    // Material parameters.
    fn appearance(&self, entity: Self::Entity) -> Option<Appearance>;
    fn set_appearance(&mut self, entity: Self::Entity, appearance: &Appearance) -> bool;
    fn has_tintable_parameter(&self, entity: Self::Entity) -> bool;

    // Completion fences. `poll_fence` must never block.
    fn create_fence(&mut self) -> FenceId;
    fn poll_fence(&mut self, fence: FenceId) -> FenceStatus;
    fn destroy_fence(&mut self, fence: FenceId);

    // Skeletal animation.
    fn animation_count(&self) -> usize;
    fn apply_animation(&mut self, index: usize, seconds: f32);
    fn update_bone_matrices(&mut self);

    // Camera, viewport and picking. Pick results are delivered after a frame.
    fn set_viewport(&mut self, width: u32, height: u32);
    fn set_projection(&mut self, projection: &Projection);
    fn request_pick(&mut self, x: u32, y: u32);
    fn poll_picks(&mut self) -> Vec<PickHit<Self::Entity>>;

    // Environment.
    fn load_environment(
        &mut self,
        ibl: &[u8],
        skybox: &[u8],
        intensity: f32,
    ) -> Result<(), EngineError>;
    fn set_view_options(&mut self, options: &ViewOptions);

    fn render(&mut self, frame_time: Instant) -> Result<(), EngineError>;
}
