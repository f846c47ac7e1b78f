//! Per-frame presentation concerns of the view: highlight colors and
//! material overrides, tap picking and the zoomable camera.

pub mod camera;
pub mod color;
pub mod highlight;
pub mod pick;

pub use camera::CameraRig;
pub use color::{ColorConfig, PatchColors, Rgba, DEFAULT_HIGHLIGHT_COLOR, LEGACY_HIGHLIGHT_COLOR};
pub use highlight::MaterialHighlightStore;
pub use pick::{find_drawable, PickTarget, PickingAdapter};
