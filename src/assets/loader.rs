//! Model replacement and load completion tracking.

use crate::assets::{LoadRequest, ModelFormat};
use crate::engine::{FenceId, FenceStatus, SceneEngine};
use crate::error::ViewerError;
use crate::render::color::{ColorConfig, Rgba};
use crate::render::highlight::MaterialHighlightStore;
use crate::render::pick::find_drawable;
use crate::scene::selection::{Selected, SelectionRegistry};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading { generation: u64 },
    Ready { generation: u64, load_time: Duration },
    Failed { name: String, reason: String },
}

/// Entity names to select once the current load completes.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPreselection {
    pub names: Vec<String>,
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Copy)]
struct LoadFence {
    fence: FenceId,
    generation: u64,
    started: Instant,
}

/// Result of polling the in-flight load fence.
#[derive(Debug, Clone, PartialEq)]
pub enum FenceOutcome {
    /// No load in flight.
    Idle,
    Pending,
    /// Load finished; carries the preselection to apply, if one was requested.
    Ready(Option<PendingPreselection>),
    Failed,
}

pub struct ModelLoadController {
    state: LoadState,
    generation: u64,
    pending: Option<PendingPreselection>,
    fence: Option<LoadFence>,
    colors: ColorConfig,
    auto_scale: bool,
}

impl ModelLoadController {
    pub fn new(auto_scale: bool) -> Self {
        Self {
            state: LoadState::Idle,
            generation: 0,
            pending: None,
            fence: None,
            colors: ColorConfig::default(),
            auto_scale,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Scene generations installed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Color tables of the installed model.
    pub fn colors(&self) -> &ColorConfig {
        &self.colors
    }

    pub fn pending(&self) -> Option<&PendingPreselection> {
        self.pending.as_ref()
    }

    pub fn has_fence(&self) -> bool {
        self.fence.is_some()
    }

    /// Replaces the current model.
    ///
    /// Selection and highlights of the previous scene are dropped before the
    /// engine sees the new bytes. A decode failure keeps the previous scene
    /// installed with nothing selected.
    pub fn load_model<E: SceneEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        selection: &mut SelectionRegistry<E::Entity>,
        highlights: &mut MaterialHighlightStore<E::Entity>,
        request: LoadRequest,
    ) -> Result<(), ViewerError> {
        let Some(format) = ModelFormat::from_name(&request.name) else {
            return Err(ViewerError::UnsupportedFormat { name: request.name });
        };
        log::info!(
            "Loading model {} ({} bytes, {}, {} resources)",
            request.name,
            request.bytes.len(),
            format,
            request.resources.len()
        );

        highlights.reset_all(engine);
        selection.clear();

        if let Some(previous) = self.fence.take() {
            log::debug!(
                "Superseding load of generation {} before its fence resolved",
                previous.generation
            );
            engine.destroy_fence(previous.fence);
        }

        self.pending = request
            .preselected
            .filter(|names| !names.is_empty())
            .map(|names| PendingPreselection {
                names,
                colors: request.colors.clone(),
            });

        if let Err(source) = engine.load_model(&request.bytes, format, &request.resources) {
            log::error!("Failed to load model {}: {}", request.name, source);
            self.pending = None;
            self.state = LoadState::Failed {
                name: request.name.clone(),
                reason: source.to_string(),
            };
            return Err(ViewerError::LoadError {
                name: request.name,
                source,
            });
        }

        self.generation += 1;
        self.colors = request.colors;
        if self.auto_scale {
            engine.transform_to_unit_cube();
        } else {
            engine.clear_root_transform();
        }

        let fence = engine.create_fence();
        self.fence = Some(LoadFence {
            fence,
            generation: self.generation,
            started: Instant::now(),
        });
        self.state = LoadState::Loading {
            generation: self.generation,
        };
        log_scene_hierarchy(engine);
        Ok(())
    }

    /// Non-blocking check of the in-flight fence.
    pub fn poll<E: SceneEngine + ?Sized>(&mut self, engine: &mut E, now: Instant) -> FenceOutcome {
        let Some(load) = self.fence else {
            return FenceOutcome::Idle;
        };
        match engine.poll_fence(load.fence) {
            FenceStatus::Pending => FenceOutcome::Pending,
            FenceStatus::Satisfied => {
                let load_time = now.saturating_duration_since(load.started);
                log::info!("took {} ms to load the model", load_time.as_millis());
                engine.destroy_fence(load.fence);
                self.fence = None;
                self.state = LoadState::Ready {
                    generation: load.generation,
                    load_time,
                };
                FenceOutcome::Ready(self.pending.take())
            }
            FenceStatus::Error => {
                log::error!("Load fence of generation {} failed", load.generation);
                engine.destroy_fence(load.fence);
                self.fence = None;
                self.pending = None;
                self.state = LoadState::Failed {
                    name: format!("generation {}", load.generation),
                    reason: "load fence reported an error".to_string(),
                };
                FenceOutcome::Failed
            }
        }
    }

    /// Drops the installed model and any in-flight load.
    pub fn reset<E: SceneEngine + ?Sized>(&mut self, engine: &mut E) {
        if let Some(load) = self.fence.take() {
            engine.destroy_fence(load.fence);
        }
        self.pending = None;
        self.colors = ColorConfig::default();
        self.state = LoadState::Idle;
        engine.destroy_model();
    }
}

/// Selects and highlights every entity whose name is listed in `pending`.
///
/// Already-selected entities are skipped. Returns how many were added; the
/// caller notifies once for the whole batch.
pub fn apply_preselection<E: SceneEngine + ?Sized>(
    engine: &mut E,
    pending: &PendingPreselection,
    selection: &mut SelectionRegistry<E::Entity>,
    highlights: &mut MaterialHighlightStore<E::Entity>,
    default_color: Rgba,
) -> usize {
    let mut added = 0;
    for wanted in &pending.names {
        let matches: Vec<E::Entity> = engine
            .entities()
            .into_iter()
            .filter(|&entity| engine.name(entity).as_deref() == Some(wanted.as_str()))
            .collect();
        if matches.is_empty() {
            log::warn!("Preselected entity {wanted:?} not found in scene");
            continue;
        }
        for entity in matches {
            if selection.contains(entity) {
                continue;
            }
            let drawable = find_drawable(engine, entity).unwrap_or(entity);
            let color = pending.colors.resolve(Some(wanted.as_str()), default_color);
            highlights.apply(engine, drawable, color);
            selection.add_preselected(
                entity,
                Selected {
                    name: Some(wanted.clone()),
                    drawable,
                },
            );
            added += 1;
        }
    }
    log::debug!("Applied {added} preselected entities");
    added
}

/// Debug dump of the installed scene graph.
pub fn log_scene_hierarchy<E: SceneEngine + ?Sized>(engine: &E) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let entities = engine.entities();
    let mut stack: Vec<(E::Entity, usize)> = entities
        .iter()
        .rev()
        .filter(|&&entity| engine.parent(entity).is_none())
        .map(|&entity| (entity, 0))
        .collect();
    log::debug!("Scene hierarchy ({} entities):", entities.len());
    while let Some((entity, depth)) = stack.pop() {
        log::debug!(
            "{:indent$}{:?} {}{}",
            "",
            entity,
            engine.name(entity).as_deref().unwrap_or("<unnamed>"),
            if engine.has_geometry(entity) { " [mesh]" } else { "" },
            indent = depth * 2
        );
        for child in engine.children(entity).into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ResourceMap;
    use crate::engine::fixtures::car_gltf;
    use crate::engine::HeadlessEngine;
    use crate::render::color::DEFAULT_HIGHLIGHT_COLOR;

    struct Harness {
        engine: HeadlessEngine,
        selection: SelectionRegistry<crate::engine::NodeHandle>,
        highlights: MaterialHighlightStore<crate::engine::NodeHandle>,
        loader: ModelLoadController,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                engine: HeadlessEngine::new(200, 200),
                selection: SelectionRegistry::new(),
                highlights: MaterialHighlightStore::new(0.3),
                loader: ModelLoadController::new(false),
            }
        }

        fn load(&mut self, request: LoadRequest) -> Result<(), ViewerError> {
            self.loader.load_model(
                &mut self.engine,
                &mut self.selection,
                &mut self.highlights,
                request,
            )
        }

        fn render(&mut self) {
            self.engine.render(Instant::now()).unwrap();
        }
    }

    #[test]
    fn unsupported_extension_changes_nothing() {
        let mut h = Harness::new();
        let err = h
            .load(LoadRequest::new(car_gltf(), "car.obj").with_preselected(["Wheel"]))
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
        assert_eq!(h.loader.state(), &LoadState::Idle);
        assert!(h.loader.pending().is_none());
    }

    #[test]
    fn fence_completion_hands_over_preselection_once() {
        let mut h = Harness::new();
        h.load(LoadRequest::new(car_gltf(), "car.gltf").with_preselected(["Wheel", "Door"]))
            .unwrap();
        assert_eq!(h.loader.state(), &LoadState::Loading { generation: 1 });
        assert_eq!(h.loader.poll(&mut h.engine, Instant::now()), FenceOutcome::Pending);

        h.render();
        let FenceOutcome::Ready(Some(pending)) = h.loader.poll(&mut h.engine, Instant::now())
        else {
            panic!("expected ready with a preselection");
        };
        assert_eq!(pending.names, vec!["Wheel".to_string(), "Door".to_string()]);
        assert!(matches!(h.loader.state(), LoadState::Ready { generation: 1, .. }));
        assert_eq!(h.loader.poll(&mut h.engine, Instant::now()), FenceOutcome::Idle);
        assert_eq!(h.engine.fences_in_flight(), 0);
    }

    #[test]
    fn empty_preselection_is_not_pending() {
        let mut h = Harness::new();
        h.load(LoadRequest::new(car_gltf(), "car.gltf").with_preselected(Vec::<String>::new()))
            .unwrap();
        assert!(h.loader.pending().is_none());
    }

    #[test]
    fn superseding_load_discards_first_preselection() {
        let mut h = Harness::new();
        h.load(LoadRequest::new(car_gltf(), "a.gltf").with_preselected(["Wheel"]))
            .unwrap();
        h.load(LoadRequest::new(car_gltf(), "b.gltf")).unwrap();
        assert_eq!(h.engine.fences_in_flight(), 1);

        h.render();
        assert_eq!(
            h.loader.poll(&mut h.engine, Instant::now()),
            FenceOutcome::Ready(None)
        );
        assert_eq!(h.loader.generation(), 2);
    }

    #[test]
    fn decode_failure_keeps_previous_scene() {
        let mut h = Harness::new();
        h.load(LoadRequest::new(car_gltf(), "car.gltf")).unwrap();
        let wheel = h.engine.find_by_name("Wheel").unwrap();

        let err = h
            .load(LoadRequest::new(b"{ not json".to_vec(), "broken.gltf").with_preselected(["Door"]))
            .unwrap_err();
        assert_eq!(err.code(), "LOAD_ERROR");
        assert!(matches!(h.loader.state(), LoadState::Failed { .. }));
        assert!(h.loader.pending().is_none());
        assert!(h.engine.is_live(wheel));
        assert_eq!(h.loader.generation(), 1);
    }

    #[test]
    fn load_clears_previous_selection_and_restores_materials() {
        let mut h = Harness::new();
        h.load(LoadRequest::new(car_gltf(), "car.gltf")).unwrap();
        let wheel = h.engine.find_by_name("Wheel").unwrap();
        let before = h.engine.appearance(wheel).unwrap();
        h.highlights
            .apply(&mut h.engine, wheel, DEFAULT_HIGHLIGHT_COLOR);
        h.selection.toggle(
            wheel,
            Selected {
                name: Some("Wheel".to_string()),
                drawable: wheel,
            },
        );

        let err = h.load(LoadRequest::new(Vec::new(), "empty.glb")).unwrap_err();
        assert_eq!(err.code(), "LOAD_ERROR");
        assert!(h.selection.is_empty());
        assert!(h.highlights.is_empty());
        assert_eq!(h.engine.appearance(wheel).unwrap(), before);
    }

    #[test]
    fn auto_scale_fits_model_into_unit_cube() {
        let mut h = Harness::new();
        h.loader = ModelLoadController::new(true);
        h.load(LoadRequest::new(car_gltf(), "car.gltf")).unwrap();
        assert_ne!(h.engine.root_transform(), glam::Mat4::IDENTITY);
    }

    #[test]
    fn preselection_matches_names_and_skips_selected() {
        let mut h = Harness::new();
        h.load(LoadRequest::new(car_gltf(), "car.gltf").with_resources(ResourceMap::new()))
            .unwrap();
        let pending = PendingPreselection {
            names: vec!["Wheel".into(), "Body".into(), "Ghost".into(), "Wheel".into()],
            colors: ColorConfig::default(),
        };
        let added = apply_preselection(
            &mut h.engine,
            &pending,
            &mut h.selection,
            &mut h.highlights,
            DEFAULT_HIGHLIGHT_COLOR,
        );
        assert_eq!(added, 2);

        let body = h.engine.find_by_name("Body").unwrap();
        let mesh = h.engine.find_by_name("Mesh.001").unwrap();
        assert_eq!(h.selection.get(body).map(|s| s.drawable), Some(mesh));
        assert!(h.highlights.is_highlighted(mesh));
        assert_eq!(
            h.engine.appearance(mesh).unwrap().primitives[0].base_color_rgba,
            DEFAULT_HIGHLIGHT_COLOR.0
        );
    }

    #[test]
    fn reset_destroys_model_and_fence() {
        let mut h = Harness::new();
        h.load(LoadRequest::new(car_gltf(), "car.gltf")).unwrap();
        h.loader.reset(&mut h.engine);
        assert_eq!(h.loader.state(), &LoadState::Idle);
        assert!(!h.loader.has_fence());
        assert!(h.engine.entities().is_empty());
    }
}
