//! Headless [`SceneEngine`] binding backed by the `gltf` crate.
//!
//! Reads the structure of a GLB/GLTF document (node tree, names, material
//! factors, accessor bounds) without decoding vertex or image data. Picking
//! ray-casts against per-node bounding boxes; fences signal once a frame has
//! been rendered after they were created, the way a GPU fence would.

use super::{
    Appearance, EngineError, FenceId, FenceStatus, Fov, MaterialParams, PickHit, Projection,
    ResourceResolver, SceneEngine, ViewOptions,
};
use crate::assets::ModelFormat;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::time::Instant;

/// Where `transform_to_unit_cube` centers the model, in front of the camera.
const UNIT_CUBE_CENTER: Vec3 = Vec3::new(0.0, 0.0, -4.0);

/// Generational node handle. Serialized as one `u64` (generation in the high
/// word) so a handle from a replaced scene never resolves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    generation: u32,
    index: u32,
}

impl NodeHandle {
    pub fn new(generation: u32, index: u32) -> Self {
        Self { generation, index }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            generation: (bits >> 32) as u32,
            index: bits as u32,
        }
    }
}

impl Serialize for NodeHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.to_bits())
    }
}

impl<'de> Deserialize<'de> for NodeHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_bits)
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: Option<String>,
    parent: Option<usize>,
    children: Vec<usize>,
    local: Mat4,
    bounds: Option<(Vec3, Vec3)>,
    materials: Vec<MaterialParams>,
    visible: bool,
}

impl Node {
    fn from_gltf(node: &gltf::Node<'_>) -> Self {
        let mut materials = Vec::new();
        let mut bounds: Option<(Vec3, Vec3)> = None;
        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                let material = primitive.material();
                let pbr = material.pbr_metallic_roughness();
                materials.push(MaterialParams {
                    base_color_rgba: pbr.base_color_factor(),
                    metallic: pbr.metallic_factor(),
                    roughness: pbr.roughness_factor(),
                    emissive_rgb: material.emissive_factor(),
                });
                if let Some((min, max)) = primitive_bounds(&primitive) {
                    bounds = Some(match bounds {
                        Some((lo, hi)) => (lo.min(min), hi.max(max)),
                        None => (min, max),
                    });
                }
            }
        }
        Self {
            name: node.name().map(str::to_string),
            parent: None,
            children: node.children().map(|child| child.index()).collect(),
            local: Mat4::from_cols_array_2d(&node.transform().matrix()),
            bounds,
            materials,
            visible: true,
        }
    }
}

fn primitive_bounds(primitive: &gltf::Primitive<'_>) -> Option<(Vec3, Vec3)> {
    let accessor = primitive.get(&gltf::Semantic::Positions)?;
    let min: [f32; 3] = serde_json::from_value(accessor.min()?).ok()?;
    let max: [f32; 3] = serde_json::from_value(accessor.max()?).ok()?;
    Some((Vec3::from(min), Vec3::from(max)))
}

struct LoadedScene {
    generation: u32,
    nodes: Vec<Node>,
    animations: usize,
}

impl LoadedScene {
    fn world_matrix(&self, index: usize) -> Mat4 {
        let mut matrix = self.nodes[index].local;
        let mut parent = self.nodes[index].parent;
        while let Some(p) = parent {
            matrix = self.nodes[p].local * matrix;
            parent = self.nodes[p].parent;
        }
        matrix
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentInfo {
    pub ibl_bytes: usize,
    pub skybox_bytes: usize,
    pub intensity: f32,
}

pub struct HeadlessEngine {
    scene: Option<LoadedScene>,
    generation: u32,
    root_transform: Mat4,
    viewport: (u32, u32),
    projection: Projection,
    fences: HashMap<u64, bool>,
    next_fence: u64,
    queued_picks: Vec<(u32, u32)>,
    delivered_picks: Vec<PickHit<NodeHandle>>,
    frames_rendered: u64,
    animation_time: Option<f32>,
    bone_updates: u64,
    environment: Option<EnvironmentInfo>,
    view_options: Option<ViewOptions>,
    missing_resources: Vec<String>,
}

impl HeadlessEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            scene: None,
            generation: 0,
            root_transform: Mat4::IDENTITY,
            viewport: (width, height),
            projection: Projection {
                fov_deg: 50.0,
                aspect: aspect_of(width, height),
                near: 0.1,
                far: 100.0,
                direction: Fov::Vertical,
            },
            fences: HashMap::new(),
            next_fence: 1,
            queued_picks: Vec::new(),
            delivered_picks: Vec::new(),
            frames_rendered: 0,
            animation_time: None,
            bone_updates: 0,
            environment: None,
            view_options: None,
            missing_resources: Vec::new(),
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn root_transform(&self) -> Mat4 {
        self.root_transform
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn environment(&self) -> Option<EnvironmentInfo> {
        self.environment
    }

    pub fn view_options(&self) -> Option<ViewOptions> {
        self.view_options
    }

    pub fn animation_time(&self) -> Option<f32> {
        self.animation_time
    }

    pub fn bone_updates(&self) -> u64 {
        self.bone_updates
    }

    /// External resources the last load could not resolve.
    pub fn missing_resources(&self) -> &[String] {
        &self.missing_resources
    }

    pub fn fences_in_flight(&self) -> usize {
        self.fences.len()
    }

    pub fn is_visible(&self, entity: NodeHandle) -> bool {
        self.node(entity).is_some_and(|node| node.visible)
    }

    /// Looks up the first entity carrying `name` in the current scene.
    pub fn find_by_name(&self, name: &str) -> Option<NodeHandle> {
        let scene = self.scene.as_ref()?;
        scene
            .nodes
            .iter()
            .position(|node| node.name.as_deref() == Some(name))
            .map(|index| NodeHandle::new(scene.generation, index as u32))
    }

    fn node(&self, entity: NodeHandle) -> Option<&Node> {
        let scene = self.scene.as_ref()?;
        if scene.generation != entity.generation {
            return None;
        }
        scene.nodes.get(entity.index as usize)
    }

    fn node_mut(&mut self, entity: NodeHandle) -> Option<&mut Node> {
        let scene = self.scene.as_mut()?;
        if scene.generation != entity.generation {
            return None;
        }
        scene.nodes.get_mut(entity.index as usize)
    }

    fn handle(&self, index: usize) -> Option<NodeHandle> {
        self.scene
            .as_ref()
            .map(|scene| NodeHandle::new(scene.generation, index as u32))
    }

    fn resolve_queued_picks(&mut self) {
        let queued = std::mem::take(&mut self.queued_picks);
        for (x, y) in queued {
            let entity = self.ray_cast(x, y);
            self.delivered_picks.push(PickHit { x, y, entity });
        }
    }

    fn ray_cast(&self, x: u32, y: u32) -> Option<NodeHandle> {
        let scene = self.scene.as_ref()?;
        let dir = self.pick_ray(x, y)?;
        let origin = Vec3::ZERO;

        let mut best: Option<(f32, usize)> = None;
        for (index, node) in scene.nodes.iter().enumerate() {
            if !node.visible {
                continue;
            }
            let Some((min, max)) = node.bounds else {
                continue;
            };
            let world = self.root_transform * scene.world_matrix(index);
            if let Some(distance) = ray_hit_box(origin, dir, world, min, max) {
                if best.map_or(true, |(nearest, _)| distance < nearest) {
                    best = Some((distance, index));
                }
            }
        }
        best.map(|(_, index)| NodeHandle::new(scene.generation, index as u32))
    }

    /// Camera sits at the origin looking down -Z; pixel coordinates are
    /// bottom-left origin.
    fn pick_ray(&self, x: u32, y: u32) -> Option<Vec3> {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return None;
        }
        let ndc_x = ((x as f32 + 0.5) / width as f32) * 2.0 - 1.0;
        let ndc_y = ((y as f32 + 0.5) / height as f32) * 2.0 - 1.0;
        let half = (self.projection.fov_deg.to_radians() * 0.5).tan() as f32;
        let aspect = self.projection.aspect as f32;
        let (tan_x, tan_y) = match self.projection.direction {
            Fov::Vertical => (half * aspect, half),
            Fov::Horizontal => (half, half / aspect.max(f32::EPSILON)),
        };
        Some(Vec3::new(ndc_x * tan_x, ndc_y * tan_y, -1.0).normalize())
    }

    fn set_subtree_visible(&mut self, index: usize, visible: bool) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            if let Some(node) = scene.nodes.get_mut(current) {
                node.visible = visible;
                stack.extend(node.children.iter().copied());
            }
        }
    }
}

fn aspect_of(width: u32, height: u32) -> f64 {
    if height == 0 {
        1.0
    } else {
        width as f64 / height as f64
    }
}

/// First node whose parent chain never reaches a root. Every node has at
/// most one parent here, so a chain longer than the node count loops.
fn find_cycle(nodes: &[Node]) -> Option<usize> {
    (0..nodes.len()).find(|&start| {
        let mut parent = nodes[start].parent;
        for _ in 0..nodes.len() {
            match parent {
                Some(p) => parent = nodes[p].parent,
                None => return false,
            }
        }
        true
    })
}

fn box_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}

fn ray_hit_box(origin: Vec3, dir: Vec3, world: Mat4, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = world.inverse();
    if !inv.to_cols_array().iter().all(|v| v.is_finite()) {
        return None;
    }
    let origin_local = inv.transform_point3(origin);
    let dir_local = inv.transform_vector3(dir);
    if dir_local.length_squared() <= f32::EPSILON {
        return None;
    }
    let (_, hit_local) = ray_aabb_intersection(origin_local, dir_local.normalize(), min, max)?;
    let hit_world = world.transform_point3(hit_local);
    Some((hit_world - origin).length())
}

fn ray_aabb_intersection(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    let origin_arr = origin.to_array();
    let dir_arr = dir.to_array();
    let min_arr = min.to_array();
    let max_arr = max.to_array();
    for axis in 0..3 {
        let o = origin_arr[axis];
        let d = dir_arr[axis];
        if d.abs() < 1e-6 {
            if o < min_arr[axis] || o > max_arr[axis] {
                return None;
            }
        } else {
            let inv_d = 1.0 / d;
            let mut t1 = (min_arr[axis] - o) * inv_d;
            let mut t2 = (max_arr[axis] - o) * inv_d;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
    }
    if t_max < 0.0 {
        return None;
    }
    let t_hit = if t_min >= 0.0 { t_min } else { t_max };
    Some((t_hit, origin + dir * t_hit))
}

impl SceneEngine for HeadlessEngine {
    type Entity = NodeHandle;

    fn load_model(
        &mut self,
        bytes: &[u8],
        format: ModelFormat,
        resources: &dyn ResourceResolver,
    ) -> Result<(), EngineError> {
        if format == ModelFormat::Glb && !bytes.starts_with(b"glTF") {
            return Err(EngineError::Decode(
                "GLB container header missing".to_string(),
            ));
        }
        let document =
            gltf::Gltf::from_slice(bytes).map_err(|err| EngineError::Decode(err.to_string()))?;

        let mut missing = Vec::new();
        for buffer in document.buffers() {
            if let gltf::buffer::Source::Uri(uri) = buffer.source() {
                if !uri.starts_with("data:") && resources.resolve(uri).is_empty() {
                    missing.push(uri.to_string());
                }
            }
        }
        for image in document.images() {
            if let gltf::image::Source::Uri { uri, .. } = image.source() {
                if !uri.starts_with("data:") && resources.resolve(uri).is_empty() {
                    missing.push(uri.to_string());
                }
            }
        }

        let mut nodes: Vec<Node> = document.nodes().map(|node| Node::from_gltf(&node)).collect();
        for node in document.nodes() {
            for child in node.children() {
                let slot = &mut nodes[child.index()].parent;
                if slot.is_some() {
                    return Err(EngineError::Decode(format!(
                        "node {} has more than one parent",
                        child.index()
                    )));
                }
                *slot = Some(node.index());
            }
        }
        if let Some(index) = find_cycle(&nodes) {
            return Err(EngineError::Decode(format!(
                "node hierarchy contains a cycle through node {index}"
            )));
        }

        self.generation = self.generation.wrapping_add(1);
        log::debug!(
            "Headless scene generation {}: {} nodes, {} animations, {} missing resources",
            self.generation,
            nodes.len(),
            document.animations().count(),
            missing.len()
        );
        self.scene = Some(LoadedScene {
            generation: self.generation,
            nodes,
            animations: document.animations().count(),
        });
        self.missing_resources = missing;
        self.queued_picks.clear();
        self.delivered_picks.clear();
        self.animation_time = None;
        Ok(())
    }

    fn destroy_model(&mut self) {
        self.scene = None;
        self.root_transform = Mat4::IDENTITY;
        self.queued_picks.clear();
        self.delivered_picks.clear();
        self.fences.clear();
        self.animation_time = None;
    }

    fn transform_to_unit_cube(&mut self) {
        let Some(scene) = &self.scene else {
            return;
        };
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for (index, node) in scene.nodes.iter().enumerate() {
            let Some((lo, hi)) = node.bounds else {
                continue;
            };
            let world = scene.world_matrix(index);
            for corner in box_corners(lo, hi) {
                let point = world.transform_point3(corner);
                min = min.min(point);
                max = max.max(point);
            }
        }
        if !min.is_finite() || !max.is_finite() {
            self.root_transform = Mat4::from_translation(UNIT_CUBE_CENTER);
            return;
        }
        let center = (min + max) * 0.5;
        let max_extent = (max - min).max_element();
        let scale = if max_extent > 0.0 { 2.0 / max_extent } else { 1.0 };
        self.root_transform = Mat4::from_translation(UNIT_CUBE_CENTER)
            * Mat4::from_scale(Vec3::splat(scale))
            * Mat4::from_translation(-center);
    }

    fn clear_root_transform(&mut self) {
        self.root_transform = Mat4::IDENTITY;
    }

    fn entities(&self) -> Vec<NodeHandle> {
        match &self.scene {
            Some(scene) => (0..scene.nodes.len())
                .map(|index| NodeHandle::new(scene.generation, index as u32))
                .collect(),
            None => Vec::new(),
        }
    }

    fn is_live(&self, entity: NodeHandle) -> bool {
        self.node(entity).is_some()
    }

    fn name(&self, entity: NodeHandle) -> Option<String> {
        self.node(entity).and_then(|node| node.name.clone())
    }

    fn parent(&self, entity: NodeHandle) -> Option<NodeHandle> {
        let parent = self.node(entity)?.parent?;
        self.handle(parent)
    }

    fn children(&self, entity: NodeHandle) -> Vec<NodeHandle> {
        let Some(node) = self.node(entity) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter_map(|&child| self.handle(child))
            .collect()
    }

    fn has_geometry(&self, entity: NodeHandle) -> bool {
        self.node(entity).is_some_and(|node| !node.materials.is_empty())
    }

    fn set_visible(&mut self, entity: NodeHandle, visible: bool) -> bool {
        if self.node(entity).is_none() {
            return false;
        }
        self.set_subtree_visible(entity.index as usize, visible);
        true
    }

    fn appearance(&self, entity: NodeHandle) -> Option<Appearance> {
        let node = self.node(entity)?;
        if node.materials.is_empty() {
            return None;
        }
        Some(Appearance::new(node.materials.clone()))
    }

    fn set_appearance(&mut self, entity: NodeHandle, appearance: &Appearance) -> bool {
        let Some(node) = self.node_mut(entity) else {
            return false;
        };
        if node.materials.len() != appearance.primitives.len() {
            return false;
        }
        node.materials.copy_from_slice(&appearance.primitives);
        true
    }

    fn has_tintable_parameter(&self, entity: NodeHandle) -> bool {
        self.has_geometry(entity)
    }

    fn create_fence(&mut self) -> FenceId {
        let id = self.next_fence;
        self.next_fence += 1;
        self.fences.insert(id, false);
        FenceId(id)
    }

    fn poll_fence(&mut self, fence: FenceId) -> FenceStatus {
        match self.fences.get(&fence.0) {
            Some(true) => FenceStatus::Satisfied,
            Some(false) => FenceStatus::Pending,
            None => FenceStatus::Error,
        }
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        self.fences.remove(&fence.0);
    }

    fn animation_count(&self) -> usize {
        self.scene.as_ref().map_or(0, |scene| scene.animations)
    }

    fn apply_animation(&mut self, index: usize, seconds: f32) {
        if index < self.animation_count() {
            self.animation_time = Some(seconds);
        }
    }

    fn update_bone_matrices(&mut self) {
        self.bone_updates += 1;
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn set_projection(&mut self, projection: &Projection) {
        self.projection = *projection;
    }

    fn request_pick(&mut self, x: u32, y: u32) {
        self.queued_picks.push((x, y));
    }

    fn poll_picks(&mut self) -> Vec<PickHit<NodeHandle>> {
        std::mem::take(&mut self.delivered_picks)
    }

    fn load_environment(
        &mut self,
        ibl: &[u8],
        skybox: &[u8],
        intensity: f32,
    ) -> Result<(), EngineError> {
        if ibl.is_empty() || skybox.is_empty() {
            return Err(EngineError::Environment(
                "indirect light and skybox data must not be empty".to_string(),
            ));
        }
        self.environment = Some(EnvironmentInfo {
            ibl_bytes: ibl.len(),
            skybox_bytes: skybox.len(),
            intensity,
        });
        Ok(())
    }

    fn set_view_options(&mut self, options: &ViewOptions) {
        self.view_options = Some(*options);
    }

    fn render(&mut self, _frame_time: Instant) -> Result<(), EngineError> {
        self.frames_rendered += 1;
        for signaled in self.fences.values_mut() {
            *signaled = true;
        }
        self.resolve_queued_picks();
        Ok(())
    }
}

/// Shared glTF fixture, also loaded by the integration tests.
///
/// `tests/fixtures/car.gltf`: a car root at z = -4 with `Wheel` (left),
/// `Door` (right), `Body` whose geometry lives on an exporter-named child
/// `Mesh.001` (center), plus an unnamed top-level box above the car.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::collections::HashMap;

    pub const CAR_GLTF: &[u8] =
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/car.gltf"));

    pub fn car_gltf() -> Vec<u8> {
        CAR_GLTF.to_vec()
    }

    pub struct NoResources;

    impl ResourceResolver for NoResources {
        fn resolve(&self, _uri: &str) -> &[u8] {
            &[]
        }
    }

    pub struct Resources(pub HashMap<String, Vec<u8>>);

    impl ResourceResolver for Resources {
        fn resolve(&self, uri: &str) -> &[u8] {
            self.0.get(uri).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    /// Engine with the car loaded untransformed in a 200×200 viewport.
    pub fn loaded_engine() -> HeadlessEngine {
        let mut engine = HeadlessEngine::new(200, 200);
        engine
            .load_model(&car_gltf(), ModelFormat::Gltf, &NoResources)
            .expect("fixture loads");
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[test]
    fn node_tree_is_read_from_document() {
        let engine = loaded_engine();
        assert_eq!(engine.entities().len(), 6);

        let wheel = engine.find_by_name("Wheel").unwrap();
        let car = engine.find_by_name("Car").unwrap();
        let mesh = engine.find_by_name("Mesh.001").unwrap();
        let body = engine.find_by_name("Body").unwrap();

        assert_eq!(engine.parent(wheel), Some(car));
        assert_eq!(engine.parent(mesh), Some(body));
        assert_eq!(engine.children(body), vec![mesh]);
        assert!(engine.has_geometry(wheel));
        assert!(!engine.has_geometry(body));
        assert_eq!(engine.name(NodeHandle::new(wheel.generation(), 5)), None);
    }

    #[test]
    fn material_factors_become_appearance() {
        let engine = loaded_engine();
        let wheel = engine.find_by_name("Wheel").unwrap();
        let appearance = engine.appearance(wheel).unwrap();
        assert_eq!(appearance.primitives.len(), 1);
        assert_eq!(appearance.primitives[0].base_color_rgba, [0.8, 0.8, 0.8, 1.0]);
        assert_eq!(appearance.primitives[0].roughness, 0.5);
        assert!(engine.appearance(engine.find_by_name("Car").unwrap()).is_none());
    }

    #[test]
    fn missing_resources_are_recorded_not_fatal() {
        let engine = loaded_engine();
        assert_eq!(engine.missing_resources(), ["car.bin".to_string()]);

        let mut engine = HeadlessEngine::new(10, 10);
        let resources = Resources(HashMap::from([("car.bin".to_string(), vec![0u8; 384])]));
        engine
            .load_model(&car_gltf(), ModelFormat::Gltf, &resources)
            .unwrap();
        assert!(engine.missing_resources().is_empty());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let mut engine = HeadlessEngine::new(10, 10);
        let err = engine
            .load_model(b"definitely not gltf", ModelFormat::Gltf, &NoResources)
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));

        let err = engine
            .load_model(&car_gltf(), ModelFormat::Glb, &NoResources)
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn cyclic_or_shared_children_are_rejected() {
        let document = |nodes: serde_json::Value| {
            serde_json::to_vec(&serde_json::json!({
                "asset": { "version": "2.0" },
                "scenes": [{ "nodes": [0] }],
                "nodes": nodes
            }))
            .unwrap()
        };
        let mut engine = loaded_engine();
        let wheel = engine.find_by_name("Wheel").unwrap();

        let cyclic = document(serde_json::json!([
            { "name": "A", "children": [1] },
            { "name": "B", "children": [0] }
        ]));
        let err = engine
            .load_model(&cyclic, ModelFormat::Gltf, &NoResources)
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));

        let shared = document(serde_json::json!([
            { "name": "A", "children": [2] },
            { "name": "B", "children": [2] },
            { "name": "C" }
        ]));
        let err = engine
            .load_model(&shared, ModelFormat::Gltf, &NoResources)
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));

        assert!(engine.is_live(wheel));
    }

    #[test]
    fn handles_from_replaced_scene_are_stale() {
        let mut engine = loaded_engine();
        let wheel = engine.find_by_name("Wheel").unwrap();
        engine
            .load_model(&car_gltf(), ModelFormat::Gltf, &NoResources)
            .unwrap();
        assert!(!engine.is_live(wheel));
        assert!(engine.name(wheel).is_none());
        assert!(engine.is_live(engine.find_by_name("Wheel").unwrap()));
    }

    #[test]
    fn handle_bits_roundtrip_through_json() {
        let handle = NodeHandle::new(3, 7);
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, ((3u64 << 32) | 7).to_string());
        let parsed: NodeHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, handle);
    }

    #[test]
    fn unit_cube_centers_model_in_front_of_camera() {
        let mut engine = loaded_engine();
        engine.transform_to_unit_cube();
        // Model bounds: x [-1, 1], y [-0.25, 0.875], z [-4.25, -3.75].
        let center = Vec3::new(0.0, 0.3125, -4.0);
        let mapped = engine.root_transform().transform_point3(center);
        assert_relative_eq!(mapped.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(mapped.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(mapped.z, -4.0, epsilon = 1e-5);

        engine.clear_root_transform();
        assert_eq!(engine.root_transform(), Mat4::IDENTITY);
    }

    #[test]
    fn picks_resolve_after_a_rendered_frame() {
        let mut engine = loaded_engine();
        engine.request_pick(100, 100);
        engine.request_pick(57, 100);
        engine.request_pick(143, 100);
        engine.request_pick(100, 10);
        assert!(engine.poll_picks().is_empty());

        engine.render(Instant::now()).unwrap();
        let hits = engine.poll_picks();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].entity, engine.find_by_name("Mesh.001"));
        assert_eq!(hits[1].entity, engine.find_by_name("Wheel"));
        assert_eq!(hits[2].entity, engine.find_by_name("Door"));
        assert_eq!(hits[3].entity, None);
        assert!(engine.poll_picks().is_empty());
    }

    #[test]
    fn hidden_subtrees_are_not_pickable() {
        let mut engine = loaded_engine();
        let body = engine.find_by_name("Body").unwrap();
        assert!(engine.set_visible(body, false));
        assert!(!engine.is_visible(engine.find_by_name("Mesh.001").unwrap()));

        engine.request_pick(100, 100);
        engine.render(Instant::now()).unwrap();
        assert_eq!(engine.poll_picks()[0].entity, None);
    }

    #[test]
    fn fence_signals_after_next_frame() {
        let mut engine = loaded_engine();
        let fence = engine.create_fence();
        assert_eq!(engine.poll_fence(fence), FenceStatus::Pending);
        engine.render(Instant::now()).unwrap();
        assert_eq!(engine.poll_fence(fence), FenceStatus::Satisfied);
        engine.destroy_fence(fence);
        assert_eq!(engine.poll_fence(fence), FenceStatus::Error);
        assert_eq!(engine.fences_in_flight(), 0);
    }

    #[test]
    fn empty_environment_is_rejected() {
        let mut engine = HeadlessEngine::new(10, 10);
        assert!(engine.load_environment(&[], &[1], 1.0).is_err());
        engine.load_environment(&[1, 2], &[3], 30_000.0).unwrap();
        assert_eq!(
            engine.environment(),
            Some(EnvironmentInfo {
                ibl_bytes: 2,
                skybox_bytes: 1,
                intensity: 30_000.0
            })
        );
    }
}
