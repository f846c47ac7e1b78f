pub mod commands;
pub mod dispatch;
pub mod timing;

pub use commands::{
    LoadEnvironmentArgs, LoadModelArgs, MethodCall, PartGroup, PartGroupVisibilityArgs,
    SetZoomArgs, ViewerCommand,
};
pub use dispatch::{channel, CommandQueue, CommandReply, CommandSender, PendingCall};
pub use timing::{FrameDriver, FrameStats, FrameTarget};

use crate::assets::{apply_preselection, FenceOutcome, LoadRequest, LoadState, ModelLoadController};
use crate::config::{ConfigError, ViewerConfig};
use crate::engine::{EngineError, PickHit, SceneEngine};
use crate::error::ViewerError;
use crate::render::{CameraRig, MaterialHighlightStore, PickingAdapter};
use crate::scene::{EventNotifier, Selected, SelectionListener, SelectionRegistry};
use std::time::{Duration, Instant};

/// An embeddable model view: one engine, one scene, one selection.
///
/// Every method must be called on the thread that owns the view and drives
/// its frames. Other threads reach it through [`dispatch::channel`].
pub struct ModelView<E: SceneEngine> {
    engine: E,
    config: ViewerConfig,
    loader: ModelLoadController,
    selection: SelectionRegistry<E::Entity>,
    highlights: MaterialHighlightStore<E::Entity>,
    picking: PickingAdapter,
    camera: CameraRig,
    notifier: EventNotifier<E::Entity>,
    surface: (u32, u32),
    destroyed: bool,
}

impl<E: SceneEngine> ModelView<E> {
    pub fn new(engine: E, config: ViewerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let picking = PickingAdapter::new(&config.picking)?;
        log::info!(
            "Model view created (auto_scale={}, default fov {}°)",
            config.auto_scale,
            config.camera.default_fov_deg
        );
        Ok(Self {
            engine,
            loader: ModelLoadController::new(config.auto_scale),
            selection: SelectionRegistry::new(),
            highlights: MaterialHighlightStore::new(config.highlight.emissive_strength),
            picking,
            camera: CameraRig::new(config.camera.clone()),
            notifier: EventNotifier::new(),
            surface: (0, 0),
            destroyed: false,
            config,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn selection(&self) -> &SelectionRegistry<E::Entity> {
        &self.selection
    }

    pub fn highlights(&self) -> &MaterialHighlightStore<E::Entity> {
        &self.highlights
    }

    pub fn load_state(&self) -> &LoadState {
        self.loader.state()
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    /// Selection notifications pushed so far, listener replays excluded.
    pub fn events_sent(&self) -> u64 {
        self.notifier.sent()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Surface resize. Also applies a zoom requested before the first layout.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
        self.engine.set_viewport(width, height);
        if let Some(projection) = self.camera.set_viewport(width, height) {
            self.engine.set_projection(&projection);
        }
    }

    /// Attaches a listener and replays the current selection to it.
    pub fn add_listener(&mut self, listener: Box<dyn SelectionListener<E::Entity>>) {
        self.notifier.attach(listener, self.selection.snapshot());
    }

    pub fn load_model(&mut self, request: LoadRequest) -> Result<(), ViewerError> {
        self.ensure_open()?;
        let had_selection = !self.selection.is_empty();
        let result = self.loader.load_model(
            &mut self.engine,
            &mut self.selection,
            &mut self.highlights,
            request,
        );
        if had_selection && self.selection.is_empty() {
            self.notify();
        }
        result
    }

    pub fn load_environment(&mut self, ibl: &[u8], skybox: &[u8]) -> Result<(), ViewerError> {
        self.ensure_open()?;
        if ibl.is_empty() || skybox.is_empty() {
            return Err(ViewerError::invalid(
                "loadEnvironment: iblBytes and skyboxBytes are required",
            ));
        }
        self.engine
            .load_environment(ibl, skybox, self.config.environment.ibl_intensity)
            .map_err(|err| ViewerError::invalid(format!("loadEnvironment: {err}")))?;
        self.engine.set_view_options(&self.config.view_options);
        log::info!(
            "Environment loaded (ibl {} bytes, skybox {} bytes, intensity {})",
            ibl.len(),
            skybox.len(),
            self.config.environment.ibl_intensity
        );
        Ok(())
    }

    pub fn set_zoom_level(&mut self, zoom: f64) -> Result<(), ViewerError> {
        self.ensure_open()?;
        if let Some(projection) = self.camera.set_zoom(zoom)? {
            self.engine.set_projection(&projection);
        }
        log::debug!("Zoom level set to {zoom}");
        Ok(())
    }

    /// Deselects `ids`, or everything when `None`. Always notifies.
    pub fn unselect_entities(&mut self, ids: Option<&[E::Entity]>) -> Result<(), ViewerError> {
        self.ensure_open()?;
        let removed = match ids {
            None => self.selection.drain(),
            Some(ids) => ids
                .iter()
                .filter_map(|&id| self.selection.remove(id).map(|selected| (id, selected)))
                .collect(),
        };
        for (_, selected) in &removed {
            self.release_highlight(selected.drawable);
        }
        log::debug!("Unselected {} entities", removed.len());
        self.notify();
        Ok(())
    }

    /// Shows or hides every part of the groups named in the visibility map.
    pub fn set_part_group_visibility(
        &mut self,
        args: &PartGroupVisibilityArgs,
    ) -> Result<(), ViewerError> {
        self.ensure_open()?;
        args.validate()?;
        let entities = self.engine.entities();
        for (group_name, &visible) in &args.visibility {
            let Some(group) = args.groups.iter().find(|group| &group.name == group_name) else {
                continue;
            };
            let mut changed = 0;
            for part in &group.parts {
                for &entity in &entities {
                    if self.engine.name(entity).as_deref() == Some(part.as_str())
                        && self.engine.set_visible(entity, visible)
                    {
                        changed += 1;
                    }
                }
            }
            if changed == 0 {
                log::warn!("Part group {group_name:?} matched no entities");
            }
            log::debug!(
                "Part group {group_name:?} {} ({changed} entities)",
                if visible { "shown" } else { "hidden" }
            );
        }
        Ok(())
    }

    /// Surface tap in top-left-origin pixels. Resolved after the next frame.
    pub fn on_tap(&mut self, x: f32, y: f32) {
        if self.destroyed {
            return;
        }
        self.picking
            .request(&mut self.engine, x, y, self.surface.1);
    }

    pub fn handle(&mut self, command: ViewerCommand<E::Entity>) -> Result<(), ViewerError> {
        match command {
            ViewerCommand::LoadModel(args) => self.load_model(args.into_request()?),
            ViewerCommand::LoadEnvironment(args) => {
                self.load_environment(&args.ibl_bytes, &args.skybox_bytes)
            }
            ViewerCommand::SetZoomLevel(args) => self.set_zoom_level(args.zoom),
            ViewerCommand::UnselectEntities(ids) => self.unselect_entities(ids.as_deref()),
            ViewerCommand::SetPartGroupVisibility(args) => self.set_part_group_visibility(&args),
        }
    }

    pub fn handle_call(&mut self, call: MethodCall) -> Result<(), ViewerError> {
        let method = call.method.clone();
        let result = ViewerCommand::from_call(call).and_then(|command| self.handle(command));
        if let Err(err) = &result {
            log::warn!("{method} failed: {} ({err})", err.code());
        }
        result
    }

    /// Runs every queued command. Returns how many were handled.
    pub fn drain_commands(&mut self, queue: &CommandQueue<E::Entity>) -> usize {
        let mut handled = 0;
        for call in queue.try_iter() {
            call.run_with(|command| {
                let result = self.handle(command);
                if let Err(err) = &result {
                    log::warn!("Queued command failed: {} ({err})", err.code());
                }
                result
            });
            handled += 1;
        }
        handled
    }

    /// Tears the view down. Later commands fail with `VIEW_CLOSED`.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.highlights.clear();
        self.selection.clear();
        self.loader.reset(&mut self.engine);
        self.notifier.detach_all();
        self.destroyed = true;
        log::info!("Model view destroyed");
    }

    fn ensure_open(&self) -> Result<(), ViewerError> {
        if self.destroyed {
            Err(ViewerError::ViewClosed)
        } else {
            Ok(())
        }
    }

    /// Restores `drawable` unless another selected entity still paints it.
    fn release_highlight(&mut self, drawable: E::Entity) {
        if self.selection.uses_drawable(drawable) {
            log::debug!("Highlight on {:?} kept for another selected entity", drawable);
            return;
        }
        self.highlights.reset(&mut self.engine, drawable);
    }

    fn notify(&mut self) {
        self.notifier.notify(self.selection.snapshot());
    }

    fn on_pick(&mut self, hit: PickHit<E::Entity>) {
        let Some(target) = self.picking.resolve(&self.engine, &hit) else {
            log::debug!("Tap at ({}, {}) hit nothing selectable", hit.x, hit.y);
            return;
        };
        let name = self.engine.name(target.selectable);
        let previous = self.selection.get(target.selectable).map(|s| s.drawable);
        let selected = self.selection.toggle(
            target.selectable,
            Selected {
                name: name.clone(),
                drawable: target.drawable,
            },
        );
        if selected {
            let color = self
                .loader
                .colors()
                .resolve(name.as_deref(), self.config.highlight.default_color);
            self.highlights
                .apply(&mut self.engine, target.drawable, color);
        } else {
            self.release_highlight(previous.unwrap_or(target.drawable));
        }
        log::debug!(
            "{} {:?} ({})",
            if selected { "Selected" } else { "Deselected" },
            target.selectable,
            name.as_deref().unwrap_or("<unnamed>")
        );
        self.notify();
    }
}

impl<E: SceneEngine> FrameTarget for ModelView<E> {
    fn poll_load_fence(&mut self, now: Instant) {
        match self.loader.poll(&mut self.engine, now) {
            FenceOutcome::Ready(Some(pending)) => {
                apply_preselection(
                    &mut self.engine,
                    &pending,
                    &mut self.selection,
                    &mut self.highlights,
                    self.config.highlight.default_color,
                );
                self.notify();
            }
            FenceOutcome::Ready(None)
            | FenceOutcome::Idle
            | FenceOutcome::Pending
            | FenceOutcome::Failed => {}
        }
    }

    fn advance_animation(&mut self, elapsed: Duration) {
        if self.engine.animation_count() > 0 {
            self.engine.apply_animation(0, elapsed.as_secs_f32());
            self.engine.update_bone_matrices();
        }
    }

    fn render_frame(&mut self, now: Instant) -> Result<(), EngineError> {
        self.engine.render(now)
    }

    fn deliver_picks(&mut self) {
        for hit in self.engine.poll_picks() {
            self.on_pick(hit);
        }
    }
}
