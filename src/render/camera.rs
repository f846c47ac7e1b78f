use crate::config::CameraConfig;
use crate::engine::{Fov, Projection};
use crate::error::ViewerError;

/// Fixed-position perspective camera whose zoom narrows the field of view.
///
/// The field of view is `default_fov_deg / zoom`, so zoom 2.0 halves it.
#[derive(Debug, Clone)]
pub struct CameraRig {
    config: CameraConfig,
    zoom: f64,
    viewport: (u32, u32),
}

impl CameraRig {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            zoom: 1.0,
            viewport: (0, 0),
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn fov_for_zoom(&self, zoom: f64) -> f64 {
        self.config.default_fov_deg / zoom
    }

    /// Sets the zoom level. Returns the projection to apply, or `None` while
    /// the surface has no size yet (the zoom applies on the next resize).
    pub fn set_zoom(&mut self, zoom: f64) -> Result<Option<Projection>, ViewerError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(ViewerError::invalid(format!(
                "zoom must be a finite number greater than 0, got {zoom}"
            )));
        }
        self.zoom = zoom;
        Ok(self.projection())
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) -> Option<Projection> {
        self.viewport = (width, height);
        self.projection()
    }

    pub fn projection(&self) -> Option<Projection> {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Projection {
            fov_deg: self.fov_for_zoom(self.zoom),
            aspect: width as f64 / height as f64,
            near: self.config.near,
            far: self.config.far,
            direction: Fov::Vertical,
        })
    }
}
