//! Selection, highlighting and frame-lifecycle core of an embeddable 3D
//! model view.
//!
//! A host hands the view model bytes and commands; the view tracks which
//! scene entities are selected, paints them with a highlight color, applies
//! preselections once a load has finished, and pushes `selectionChanged`
//! events back. Rendering goes through the [`engine::SceneEngine`] trait;
//! [`engine::HeadlessEngine`] is a binding that reads glTF structure only.

pub mod app;
pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod render;
pub mod scene;

pub use app::{FrameDriver, FrameTarget, ModelView, ViewerCommand};
pub use assets::{LoadRequest, ModelFormat, ResourceMap};
pub use config::ViewerConfig;
pub use engine::{HeadlessEngine, NodeHandle, SceneEngine};
pub use error::ViewerError;
pub use scene::{SelectedEntity, ViewerEvent};
