use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    f32::consts::PI,
    rc::Rc,
};

use fitment_ngin::{
    Point3, Vector3,
    data_structures::{
        bounds::Aabb,
        instance::Instance,
        material::Material,
        mesh::{Mesh, Primitive},
        scene_graph::{NodeId, SceneAsset, SceneNode},
    },
    error::{AssetError, FetchError},
    flow::ViewerEvents,
    resources::source::{Fetch, SignUrl},
};
use futures::{FutureExt, channel::oneshot, future::LocalBoxFuture};
use serde_json::json;

pub const SEGMENTS: usize = 32;

/// The eight corners of an axis-aligned box.
pub fn box_mesh(name: &str, min: [f32; 3], max: [f32; 3], material: Option<usize>) -> Mesh {
    let mut positions = Vec::with_capacity(8);
    for x in [min[0], max[0]] {
        for y in [min[1], max[1]] {
            for z in [min[2], max[2]] {
                positions.push(Point3::new(x, y, z));
            }
        }
    }
    Mesh::new(name, vec![Primitive { positions, material }])
}

/// A closed cylinder centered on the origin. `axle` is 0, 1 or 2 for X, Y or Z.
pub fn cylinder_mesh(
    name: &str,
    radius: f32,
    width: f32,
    axle: usize,
    material: Option<usize>,
) -> Mesh {
    let (a, b) = match axle {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let mut positions = Vec::with_capacity(SEGMENTS * 2);
    for cap in [-width / 2.0, width / 2.0] {
        for i in 0..SEGMENTS {
            let angle = 2.0 * PI * i as f32 / SEGMENTS as f32;
            let mut p = [0.0; 3];
            p[axle] = cap;
            p[a] = radius * angle.cos();
            p[b] = radius * angle.sin();
            positions.push(Point3::new(p[0], p[1], p[2]));
        }
    }
    Mesh::new(name, vec![Primitive { positions, material }])
}

pub fn at(x: f32, y: f32, z: f32) -> Instance {
    Instance::from(Vector3::new(x, y, z))
}

/// A body box of 4 x 1 x 2 centered above the origin, long along X.
pub fn body(asset: &mut SceneAsset, parent: Option<NodeId>) -> NodeId {
    asset.add_node(
        parent,
        SceneNode::new("body").with_mesh(box_mesh("body", [-2.0, -0.2, -1.0], [2.0, 0.8, 1.0], None)),
    )
}

pub const WHEEL_SPOTS: [(f32, f32); 4] = [(1.4, 0.9), (1.4, -0.9), (-1.4, 0.9), (-1.4, -0.9)];

/// Chassis whose wheels are named, with disc-shaped wheel meshes of
/// diameter 0.7 spinning around Z.
pub fn chassis_with_named_wheels(names: [&str; 4]) -> SceneAsset {
    let mut asset = SceneAsset::new("models/chassis.glb");
    asset.add_material(Material::new("paint", [0.6, 0.1, 0.1, 1.0]));
    let root = asset.add_node(None, SceneNode::new("Car"));
    body(&mut asset, Some(root));
    for (name, (x, z)) in names.iter().zip(WHEEL_SPOTS) {
        asset.add_node(
            Some(root),
            SceneNode::new(name)
                .with_local(at(x, -0.15, z))
                .with_mesh(cylinder_mesh(name, 0.35, 0.25, 2, None)),
        );
    }
    asset
}

/// Chassis without any wheel names but with four cylinders of diameter 0.4
/// resting at y = -0.3.
pub fn chassis_with_unnamed_cylinders() -> SceneAsset {
    let mut asset = SceneAsset::new("models/chassis.glb");
    let root = asset.add_node(None, SceneNode::new("Car"));
    body(&mut asset, Some(root));
    for (idx, (x, z)) in WHEEL_SPOTS.iter().enumerate() {
        let name = format!("part_{idx}");
        asset.add_node(
            Some(root),
            SceneNode::new(&name)
                .with_local(at(*x, -0.3, *z))
                .with_mesh(cylinder_mesh(&name, 0.2, 0.2, 2, None)),
        );
    }
    asset
}

/// Chassis with nothing wheel-like at all.
pub fn plain_chassis() -> SceneAsset {
    let mut asset = SceneAsset::new("models/chassis.glb");
    let root = asset.add_node(None, SceneNode::new("Car"));
    body(&mut asset, Some(root));
    asset.add_node(
        Some(root),
        SceneNode::new("cabin").with_mesh(box_mesh("cabin", [-1.0, 0.8, -0.8], [1.0, 1.4, 0.8], None)),
    );
    asset
}

/// A tire lying flat (axle along Y) around an off-center pivot.
pub fn flat_tire(radius: f32, width: f32) -> SceneAsset {
    let mut asset = SceneAsset::new("models/tire.glb");
    let rubber = asset.add_material(Material::new("rubber", [0.95, 0.95, 0.95, 1.0]));
    let root = asset.add_node(None, SceneNode::new("Tire").with_local(at(0.3, 0.1, -0.2)));
    asset.add_node(
        Some(root),
        SceneNode::new("tread").with_mesh(cylinder_mesh("tread", radius, width, 1, Some(rubber))),
    );
    asset
}

/// A cube-shaped backdrop of the given size around `center`.
pub fn backdrop(center: [f32; 3], size: f32) -> SceneAsset {
    let mut asset = SceneAsset::new("models/showroom.glb");
    let h = size / 2.0;
    asset.add_node(
        None,
        SceneNode::new("room").with_mesh(box_mesh(
            "room",
            [center[0] - h, center[1] - h, center[2] - h],
            [center[0] + h, center[1] + h, center[2] + h],
            None,
        )),
    );
    asset
}

fn pad(bytes: &mut Vec<u8>, with: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(with);
    }
}

/// Serializes a scene to a binary glTF container with one accessor per
/// primitive.
pub fn to_glb(asset: &SceneAsset) -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    let mut buffer_views = Vec::new();
    let mut accessors = Vec::new();
    let mut meshes = Vec::new();
    let mut nodes = Vec::new();

    // glTF node indices are arena indices.
    let mut ids = asset.traverse();
    ids.sort();
    for id in ids {
        let node = asset.node(id).unwrap();
        let l = node.local;
        let mut json_node = json!({
            "name": node.name,
            "translation": [l.position.x, l.position.y, l.position.z],
            "rotation": [l.rotation.v.x, l.rotation.v.y, l.rotation.v.z, l.rotation.s],
            "scale": [l.scale.x, l.scale.y, l.scale.z],
        });
        if !node.children.is_empty() {
            json_node["children"] = json!(node.children.iter().map(|c| c.index()).collect::<Vec<_>>());
        }
        if let Some(mesh) = &node.mesh {
            let mut primitives = Vec::new();
            for primitive in &mesh.primitives {
                let offset = bin.len();
                for p in &primitive.positions {
                    for v in [p.x, p.y, p.z] {
                        bin.extend_from_slice(&v.to_le_bytes());
                    }
                }
                let bounds = Aabb::from_points(primitive.positions.iter().copied());
                buffer_views.push(json!({
                    "buffer": 0,
                    "byteOffset": offset,
                    "byteLength": primitive.positions.len() * 12,
                }));
                accessors.push(json!({
                    "bufferView": buffer_views.len() - 1,
                    "componentType": 5126,
                    "count": primitive.positions.len(),
                    "type": "VEC3",
                    "min": [bounds.min.x, bounds.min.y, bounds.min.z],
                    "max": [bounds.max.x, bounds.max.y, bounds.max.z],
                }));
                let mut json_primitive = json!({
                    "attributes": { "POSITION": accessors.len() - 1 },
                    "mode": 0,
                });
                if let Some(material) = primitive.material {
                    json_primitive["material"] = json!(material);
                }
                primitives.push(json_primitive);
            }
            let mut json_mesh = json!({ "name": mesh.name, "primitives": primitives });
            if let Some(cylinder) = mesh.cylinder {
                json_mesh["extras"] = json!({
                    "radiusTop": cylinder.radius_top,
                    "radiusBottom": cylinder.radius_bottom,
                    "height": cylinder.height,
                });
            }
            meshes.push(json_mesh);
            json_node["mesh"] = json!(meshes.len() - 1);
        }
        nodes.push(json_node);
    }

    let materials: Vec<_> = asset
        .materials
        .iter()
        .map(|m| {
            json!({
                "name": m.name,
                "pbrMetallicRoughness": {
                    "baseColorFactor": m.base_color,
                    "metallicFactor": m.metallic,
                    "roughnessFactor": m.roughness,
                },
                "doubleSided": m.double_sided,
            })
        })
        .collect();

    pad(&mut bin, 0);
    let mut document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": asset.roots().iter().map(|r| r.index()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": meshes,
        "materials": materials,
    });
    if !bin.is_empty() {
        document["buffers"] = json!([{ "byteLength": bin.len() }]);
        document["bufferViews"] = json!(buffer_views);
        document["accessors"] = json!(accessors);
    }
    let mut json_chunk = serde_json::to_vec(&document).unwrap();
    pad(&mut json_chunk, b' ');

    let mut total = 12 + 8 + json_chunk.len();
    if !bin.is_empty() {
        total += 8 + bin.len();
    }
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json_chunk);
    if !bin.is_empty() {
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
    }
    glb
}

/// In-memory byte source. Clones share state, so tests keep a handle after
/// handing one to the loader.
#[derive(Clone, Default)]
pub struct MemorySource {
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    forbidden: Rc<RefCell<HashSet<String>>>,
    hanging: Rc<RefCell<HashSet<String>>>,
    gates: Rc<RefCell<HashMap<String, oneshot::Receiver<()>>>>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &str, bytes: Vec<u8>) -> &Self {
        self.files.borrow_mut().insert(location.to_string(), bytes);
        self
    }

    pub fn insert_scene(&self, location: &str, asset: &SceneAsset) -> &Self {
        self.insert(location, to_glb(asset))
    }

    pub fn forbid(&self, location: &str) -> &Self {
        self.forbidden.borrow_mut().insert(location.to_string());
        self
    }

    /// Requests for `location` never complete.
    pub fn hang(&self, location: &str) -> &Self {
        self.hanging.borrow_mut().insert(location.to_string());
        self
    }

    /// The next request for `location` waits until the returned sender fires.
    pub fn gate(&self, location: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(location.to_string(), rx);
        tx
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, location: &str) -> usize {
        self.requests.borrow().iter().filter(|r| *r == location).count()
    }
}

impl Fetch for MemorySource {
    fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        self.requests.borrow_mut().push(location.to_string());
        let gate = self.gates.borrow_mut().remove(location);
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.hanging.borrow().contains(location) {
                futures::future::pending::<()>().await;
            }
            if self.forbidden.borrow().contains(location) {
                return Err(FetchError::Forbidden);
            }
            self.files
                .borrow()
                .get(location)
                .cloned()
                .ok_or(FetchError::NotFound)
        }
        .boxed_local()
    }
}

/// Signed-url exchange answering with a fixed result.
#[derive(Clone)]
pub struct StubSigner {
    answer: Result<String, String>,
    calls: Rc<Cell<usize>>,
}

impl StubSigner {
    pub fn signing_to(url: &str) -> Self {
        Self {
            answer: Ok(url.to_string()),
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Err(reason.to_string()),
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl SignUrl for StubSigner {
    fn sign<'a>(&'a self, _path: &'a str) -> LocalBoxFuture<'a, anyhow::Result<String>> {
        self.calls.set(self.calls.get() + 1);
        let answer = self.answer.clone();
        async move { answer.map_err(|reason| anyhow::anyhow!(reason)) }.boxed_local()
    }
}

/// Host that writes down every callback.
#[derive(Default)]
pub struct RecordingHost {
    pub log: Vec<&'static str>,
    pub errors: Vec<AssetError>,
}

impl RecordingHost {
    pub fn count(&self, entry: &str) -> usize {
        self.log.iter().filter(|e| **e == entry).count()
    }
}

impl ViewerEvents for RecordingHost {
    fn on_background_load(&mut self) {
        self.log.push("background");
    }

    fn on_chassis_load(&mut self) {
        self.log.push("chassis");
    }

    fn on_tires_load(&mut self) {
        self.log.push("tires");
    }

    fn on_tires_missing(&mut self) {
        self.log.push("tires_missing");
    }

    fn on_ready(&mut self) {
        self.log.push("ready");
    }

    fn on_error(&mut self, error: &AssetError) {
        self.log.push("error");
        self.errors.push(error.clone());
    }
}
