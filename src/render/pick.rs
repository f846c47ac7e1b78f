//! Tap picking.
//!
//! Surface taps are converted to the engine's bottom-left pixel convention
//! and queued as engine pick queries. Results arrive after the next rendered
//! frame and are resolved here to the node the user meant to select.
//!
//! The selectable-node walk is a best-effort heuristic: exporters name
//! sub-meshes things like `Mesh.001` or leave them unnamed, so the walk skips
//! names matching the configured artifact patterns. It cannot be correct for
//! every exporter.

use crate::config::{ConfigError, PickingConfig};
use crate::engine::{PickHit, SceneEngine};
use crate::scene::selection::UNNAMED_ENTITY;
use regex::Regex;

/// What a pick resolved to: the node to record as selected, and the node
/// whose material is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickTarget<K> {
    pub selectable: K,
    pub drawable: K,
}

pub struct PickingAdapter {
    flip_y: bool,
    artifact_patterns: Vec<Regex>,
}

impl PickingAdapter {
    pub fn new(config: &PickingConfig) -> Result<Self, ConfigError> {
        let artifact_patterns = config
            .artifact_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            flip_y: config.flip_y,
            artifact_patterns,
        })
    }

    /// Surface coordinates (top-left origin) to engine pixel coordinates.
    pub fn to_engine_coords(&self, x: f32, y: f32, surface_height: u32) -> (u32, u32) {
        let px = x.max(0.0) as u32;
        let py = y.max(0.0) as u32;
        if self.flip_y {
            let flipped = surface_height
                .saturating_sub(py)
                .min(surface_height.saturating_sub(1));
            (px, flipped)
        } else {
            (px, py)
        }
    }

    /// Queue an engine pick for a tap. The hit is delivered frame-delayed.
    pub fn request<E: SceneEngine + ?Sized>(
        &self,
        engine: &mut E,
        x: f32,
        y: f32,
        surface_height: u32,
    ) {
        let (px, py) = self.to_engine_coords(x, y, surface_height);
        log::debug!("Pick requested at surface ({x}, {y}) -> engine ({px}, {py})");
        engine.request_pick(px, py);
    }

    pub fn is_selectable_name(&self, name: Option<&str>) -> bool {
        match name {
            None => false,
            Some(name) if name.is_empty() || name == UNNAMED_ENTITY => false,
            Some(name) => !self
                .artifact_patterns
                .iter()
                .any(|pattern| pattern.is_match(name)),
        }
    }

    /// Resolves a delivered hit. Misses and stale entities yield `None`.
    pub fn resolve<E: SceneEngine + ?Sized>(
        &self,
        engine: &E,
        hit: &PickHit<E::Entity>,
    ) -> Option<PickTarget<E::Entity>> {
        let entity = hit.entity?;
        if !engine.is_live(entity) {
            log::trace!("Discarding pick of stale entity {:?}", entity);
            return None;
        }

        let Some(drawable) = find_drawable(engine, entity) else {
            log::debug!("Picked entity {:?} carries no geometry", entity);
            return None;
        };

        let mut selectable = entity;
        let mut cursor = Some(entity);
        while let Some(current) = cursor {
            if self.is_selectable_name(engine.name(current).as_deref()) {
                selectable = current;
                break;
            }
            cursor = engine.parent(current);
        }

        Some(PickTarget {
            selectable,
            drawable,
        })
    }
}

/// `entity` itself when it carries geometry, else its first descendant
/// (depth first) that does.
pub fn find_drawable<E: SceneEngine + ?Sized>(engine: &E, entity: E::Entity) -> Option<E::Entity> {
    let mut stack = vec![entity];
    while let Some(current) = stack.pop() {
        if engine.has_geometry(current) {
            return Some(current);
        }
        let mut children = engine.children(current);
        children.reverse();
        stack.extend(children);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::loaded_engine;
    use crate::engine::HeadlessEngine;

    fn adapter() -> PickingAdapter {
        PickingAdapter::new(&PickingConfig::default()).unwrap()
    }

    fn hit(engine: &HeadlessEngine, name: &str) -> PickHit<crate::engine::NodeHandle> {
        PickHit {
            x: 0,
            y: 0,
            entity: engine.find_by_name(name),
        }
    }

    #[test]
    fn flips_y_to_bottom_left_origin() {
        let picking = adapter();
        assert_eq!(picking.to_engine_coords(10.0, 57.0, 200), (10, 143));
        assert_eq!(picking.to_engine_coords(10.0, 0.0, 200), (10, 199));

        let raw = PickingAdapter::new(&PickingConfig {
            flip_y: false,
            ..PickingConfig::default()
        })
        .unwrap();
        assert_eq!(raw.to_engine_coords(10.0, 57.0, 200), (10, 57));
    }

    #[test]
    fn exporter_names_are_not_selectable() {
        let picking = adapter();
        assert!(picking.is_selectable_name(Some("Wheel")));
        assert!(!picking.is_selectable_name(Some("Mesh.001")));
        assert!(!picking.is_selectable_name(Some("Door.002")));
        assert!(!picking.is_selectable_name(Some("")));
        assert!(!picking.is_selectable_name(Some("Unnamed Entity")));
        assert!(!picking.is_selectable_name(None));
    }

    #[test]
    fn submesh_hit_walks_up_to_named_ancestor() {
        let engine = loaded_engine();
        let target = adapter()
            .resolve(&engine, &hit(&engine, "Mesh.001"))
            .unwrap();
        assert_eq!(Some(target.selectable), engine.find_by_name("Body"));
        assert_eq!(Some(target.drawable), engine.find_by_name("Mesh.001"));
    }

    #[test]
    fn named_hit_selects_itself() {
        let engine = loaded_engine();
        let target = adapter().resolve(&engine, &hit(&engine, "Wheel")).unwrap();
        assert_eq!(target.selectable, target.drawable);
        assert_eq!(Some(target.selectable), engine.find_by_name("Wheel"));
    }

    #[test]
    fn unnamed_root_falls_back_to_hit() {
        let engine = loaded_engine();
        let unnamed = engine
            .entities()
            .into_iter()
            .find(|&e| engine.name(e).is_none())
            .unwrap();
        let target = adapter()
            .resolve(
                &engine,
                &PickHit {
                    x: 0,
                    y: 0,
                    entity: Some(unnamed),
                },
            )
            .unwrap();
        assert_eq!(target.selectable, unnamed);
        assert_eq!(target.drawable, unnamed);
    }

    #[test]
    fn grouping_node_resolves_down_to_geometry() {
        let engine = loaded_engine();
        let body = engine.find_by_name("Body").unwrap();
        assert_eq!(find_drawable(&engine, body), engine.find_by_name("Mesh.001"));
        let car = engine.find_by_name("Car").unwrap();
        assert_eq!(find_drawable(&engine, car), engine.find_by_name("Wheel"));
    }

    #[test]
    fn miss_resolves_to_none() {
        let engine = loaded_engine();
        let miss = PickHit {
            x: 5,
            y: 5,
            entity: None,
        };
        assert_eq!(adapter().resolve(&engine, &miss), None);
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let config = PickingConfig {
            artifact_patterns: vec!["(".to_string()],
            ..PickingConfig::default()
        };
        assert!(matches!(
            PickingAdapter::new(&config),
            Err(ConfigError::Pattern { .. })
        ));
    }
}
