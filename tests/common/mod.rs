#![allow(dead_code)]

use interactive3d::assets::LoadState;
use interactive3d::{
    FrameDriver, HeadlessEngine, LoadRequest, ModelView, NodeHandle, SceneEngine, ViewerConfig,
    ViewerEvent,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

/// Surface taps (200×200, top-left origin) onto the car fixture.
pub const TAP_BODY: (f32, f32) = (100.0, 100.0);
pub const TAP_WHEEL: (f32, f32) = (57.0, 100.0);
pub const TAP_DOOR: (f32, f32) = (143.0, 100.0);
pub const TAP_UNNAMED: (f32, f32) = (100.0, 57.0);
pub const TAP_EMPTY: (f32, f32) = (100.0, 190.0);

/// Car root at z = -4 with `Wheel` (left), `Door` (right) and `Body`, whose
/// geometry is the exporter-named child `Mesh.001` (center). An unnamed box
/// floats above the car.
pub const CAR_GLTF: &[u8] = include_bytes!("../fixtures/car.gltf");

pub fn car_gltf() -> Vec<u8> {
    CAR_GLTF.to_vec()
}

/// The same document in a binary container with a JSON chunk only.
pub fn car_glb() -> Vec<u8> {
    let mut json = car_gltf();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let total = 12 + 8 + json.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb
}

pub fn test_config() -> ViewerConfig {
    ViewerConfig {
        auto_scale: false,
        ..ViewerConfig::default()
    }
}

pub type Events = Rc<RefCell<Vec<ViewerEvent<NodeHandle>>>>;

/// A view on a 200×200 surface with a recording listener and a running
/// frame driver.
pub struct Harness {
    pub view: ModelView<HeadlessEngine>,
    pub driver: FrameDriver,
    pub events: Events,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ViewerConfig) -> Self {
        let mut view =
            ModelView::new(HeadlessEngine::new(200, 200), config).expect("valid config");
        view.set_viewport(200, 200);
        let events: Events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        view.add_listener(Box::new(move |event: &ViewerEvent<NodeHandle>| {
            sink.borrow_mut().push(event.clone())
        }));
        events.borrow_mut().clear();

        let mut driver = FrameDriver::new(Instant::now());
        driver.start();
        Self {
            view,
            driver,
            events,
        }
    }

    pub fn frame(&mut self) {
        assert!(self.driver.tick(Instant::now(), &mut self.view));
    }

    /// Loads and runs frames until the load fence has been observed.
    pub fn load_ready(&mut self, request: LoadRequest) {
        self.view.load_model(request).expect("model loads");
        self.frame();
        self.frame();
        assert!(
            matches!(self.view.load_state(), LoadState::Ready { .. }),
            "load did not complete: {:?}",
            self.view.load_state()
        );
    }

    pub fn load_car(&mut self) {
        self.load_ready(LoadRequest::new(car_gltf(), "car.gltf"));
    }

    pub fn tap(&mut self, (x, y): (f32, f32)) {
        self.view.on_tap(x, y);
        self.frame();
    }

    pub fn entity(&self, name: &str) -> NodeHandle {
        self.view
            .engine()
            .find_by_name(name)
            .unwrap_or_else(|| panic!("no entity named {name}"))
    }

    pub fn base_color(&self, name: &str) -> [f32; 4] {
        self.view
            .engine()
            .appearance(self.entity(name))
            .expect("entity has geometry")
            .primitives[0]
            .base_color_rgba
    }

    pub fn event_count(&self) -> usize {
        self.events.borrow().len()
    }

    /// Names carried by the most recent event.
    pub fn last_event_names(&self) -> Vec<String> {
        let events = self.events.borrow();
        match events.last() {
            Some(ViewerEvent::SelectionChanged { selected_entities }) => selected_entities
                .iter()
                .map(|entity| entity.name.clone())
                .collect(),
            None => panic!("no event was emitted"),
        }
    }
}
