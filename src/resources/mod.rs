use std::{cell::RefCell, collections::HashMap, rc::Rc};

use cgmath::{Point3, Quaternion, Vector3};
use futures::{
    FutureExt,
    future::{LocalBoxFuture, Shared},
};

use crate::{
    config::AssetConfig,
    data_structures::{
        instance::Instance,
        material::Material,
        mesh::{CylinderParams, Mesh, Primitive},
        scene_graph::{NodeId, SceneAsset, SceneNode},
    },
    error::{AssetError, FetchError},
    resources::source::{Fetch, HttpSource, SignUrl, SignedUrlEndpoint},
};

/**
 * This module contains all logic for resolving and loading 3D assets from external sources.
 */
pub mod source;

/// Where a requested path is actually fetched from.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub location: String,
    /// The path needed a signed URL but the exchange failed; the original
    /// path is used as a last resort.
    pub signing_failed: bool,
}

type LoadResult = Result<Rc<SceneAsset>, AssetError>;
type SharedLoad = Shared<LocalBoxFuture<'static, LoadResult>>;

/// Resolves, fetches, parses and caches scene templates.
///
/// Templates are handed out as `Rc<SceneAsset>` and are never mutated after
/// insertion; callers clone before they modify. The cache lives until
/// [`AssetLoader::clear`] is called on viewer teardown. Concurrent requests
/// for a path that is still loading wait on the same load.
pub struct AssetLoader {
    transport: Rc<Transport>,
    cache: RefCell<HashMap<String, Rc<SceneAsset>>>,
    in_flight: RefCell<HashMap<String, SharedLoad>>,
}

struct Transport {
    source: Box<dyn Fetch>,
    signer: Option<Box<dyn SignUrl>>,
    private_segment: String,
}

impl AssetLoader {
    pub fn new(
        source: Box<dyn Fetch>,
        signer: Option<Box<dyn SignUrl>>,
        private_segment: &str,
    ) -> Self {
        Self {
            transport: Rc::new(Transport {
                source,
                signer,
                private_segment: private_segment.to_string(),
            }),
            cache: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        let signer = config
            .signed_url_endpoint
            .as_deref()
            .map(|endpoint| Box::new(SignedUrlEndpoint::new(endpoint)) as Box<dyn SignUrl>);
        Self::new(
            Box::new(HttpSource::new(&config.base_dir)),
            signer,
            &config.private_segment,
        )
    }

    pub fn is_private(&self, path: &str) -> bool {
        self.transport.is_private(path)
    }

    /// Substitutes a signed URL for private paths. Never fails: a failed
    /// exchange degrades to the original path.
    pub async fn resolve(&self, path: &str) -> Resolved {
        self.transport.resolve(path).await
    }

    pub fn cached(&self, path: &str) -> Option<Rc<SceneAsset>> {
        self.cache.borrow().get(path).cloned()
    }

    pub async fn load(&self, path: &str) -> LoadResult {
        if let Some(asset) = self.cached(path) {
            log::debug!("{path} served from cache");
            return Ok(asset);
        }
        let running = self.in_flight.borrow().get(path).cloned();
        let load = match running {
            Some(load) => {
                log::debug!("{path} is already loading, waiting on it");
                load
            }
            None => {
                let transport = Rc::clone(&self.transport);
                let owned = path.to_string();
                let load = async move { transport.load_template(&owned).await.map(Rc::new) }
                    .boxed_local()
                    .shared();
                self.in_flight
                    .borrow_mut()
                    .insert(path.to_string(), load.clone());
                load
            }
        };

        let result = load.clone().await;
        {
            let mut in_flight = self.in_flight.borrow_mut();
            if in_flight.get(path).is_some_and(|current| current.ptr_eq(&load)) {
                in_flight.remove(path);
            }
        }
        if let Ok(asset) = &result {
            self.cache
                .borrow_mut()
                .entry(path.to_string())
                .or_insert_with(|| Rc::clone(asset));
        }
        result
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
        self.in_flight.borrow_mut().clear();
    }
}

impl Transport {
    fn is_private(&self, path: &str) -> bool {
        !self.private_segment.is_empty() && path.contains(&self.private_segment)
    }

    async fn resolve(&self, path: &str) -> Resolved {
        if !self.is_private(path) {
            return Resolved {
                location: path.to_string(),
                signing_failed: false,
            };
        }
        let Some(signer) = &self.signer else {
            log::warn!("{path} is in private storage but no signed-url endpoint is configured");
            return Resolved {
                location: path.to_string(),
                signing_failed: true,
            };
        };
        match signer.sign(path).await {
            Ok(location) => {
                log::debug!("signed url issued for {path}");
                Resolved {
                    location,
                    signing_failed: false,
                }
            }
            Err(e) => {
                log::warn!("signed-url exchange failed for {path}, trying the raw path: {e:#}");
                Resolved {
                    location: path.to_string(),
                    signing_failed: true,
                }
            }
        }
    }

    async fn load_template(&self, path: &str) -> Result<SceneAsset, AssetError> {
        let resolved = self.resolve(path).await;
        let bytes = self
            .source
            .fetch(&resolved.location)
            .await
            .map_err(|e| classify_fetch_error(path, e, resolved.signing_failed))?;
        let asset = load_model_gltf(path, &resolved.location, &bytes, self.source.as_ref())
            .await
            .map_err(|e| match e {
                // External buffers of a private asset fail the same way the asset would.
                AssetError::Network { .. } | AssetError::NotFound(_)
                    if resolved.signing_failed =>
                {
                    AssetError::Forbidden(path.to_string())
                }
                e => e,
            })?;
        log::info!("loaded {path} ({} nodes, {} materials)", asset.len(), asset.materials.len());
        Ok(asset)
    }
}

fn classify_fetch_error(path: &str, error: FetchError, signing_failed: bool) -> AssetError {
    match error {
        FetchError::Forbidden => AssetError::Forbidden(path.to_string()),
        _ if signing_failed => AssetError::Forbidden(path.to_string()),
        FetchError::NotFound => AssetError::NotFound(path.to_string()),
        FetchError::Other(e) => AssetError::Network {
            path: path.to_string(),
            reason: format!("{e:#}"),
        },
    }
}

fn parse_failure(path: &str, reason: impl ToString) -> AssetError {
    AssetError::ParseFailure {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Resolves a buffer uri relative to the document it was referenced from.
fn sibling_location(document: &str, uri: &str) -> String {
    if let Ok(base) = reqwest::Url::parse(document) {
        if let Ok(joined) = base.join(uri) {
            return joined.to_string();
        }
    }
    match document.rfind('/') {
        Some(idx) => format!("{}/{}", &document[..idx], uri),
        None => uri.to_string(),
    }
}

/// Parses glTF/GLB bytes into a scene template.
///
/// `path` names the asset (and the resulting [`SceneAsset::source`]),
/// `location` is where the bytes came from and anchors relative buffer uris.
pub async fn load_model_gltf(
    path: &str,
    location: &str,
    bytes: &[u8],
    source: &dyn Fetch,
) -> Result<SceneAsset, AssetError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| parse_failure(path, e))?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| parse_failure(path, "binary chunk missing"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                let uri = sibling_location(location, uri);
                let bin = source
                    .fetch(&uri)
                    .await
                    .map_err(|e| classify_fetch_error(path, e, false))?;
                buffer_data.push(bin);
            }
        }
    }

    let mut asset = SceneAsset::new(path);

    // Load materials
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let base_color = pbr.base_color_factor();
        asset.add_material(Material {
            name: material.name().unwrap_or("material").to_string(),
            base_color,
            has_base_color_texture: pbr.base_color_texture().is_some(),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            emissive: material.emissive_factor(),
            opacity: base_color[3],
            transparent: matches!(material.alpha_mode(), gltf::material::AlphaMode::Blend),
            double_sided: material.double_sided(),
            ..Default::default()
        });
    }

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| parse_failure(path, "document contains no scene"))?;
    for node in scene.nodes() {
        to_scene_node(&mut asset, None, node, &buffer_data);
    }

    Ok(asset)
}

fn cylinder_extras(extras: Option<&serde_json::value::RawValue>) -> Option<CylinderParams> {
    serde_json::from_str::<CylinderParams>(extras?.get()).ok()
}

fn to_scene_node(
    asset: &mut SceneAsset,
    parent: Option<NodeId>,
    node: gltf::scene::Node,
    buf: &[Vec<u8>],
) {
    let (translation, rotation, scale) = node.transform().decomposed();
    let local = Instance {
        position: Vector3::from(translation),
        // glTF stores quaternions as [x, y, z, w]
        rotation: Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: Vector3::from(scale),
    };

    let mesh = node.mesh().map(|mesh| {
        let primitives = mesh
            .primitives()
            .map(|primitive| {
                let reader =
                    primitive.reader(|buffer| buf.get(buffer.index()).map(|b| b.as_slice()));
                let positions = reader
                    .read_positions()
                    .map(|positions| positions.map(Point3::from).collect())
                    .unwrap_or_default();
                Primitive {
                    positions,
                    material: primitive.material().index(),
                }
            })
            .collect();
        let name = mesh.name().or(node.name()).unwrap_or("unknown_mesh");
        let mut converted = Mesh::new(name, primitives);
        converted.cylinder = cylinder_extras(mesh.extras().as_deref())
            .or_else(|| cylinder_extras(node.extras().as_deref()));
        converted
    });

    let mut scene_node = SceneNode::new(node.name().unwrap_or_default()).with_local(local);
    scene_node.mesh = mesh;
    let id = asset.add_node(parent, scene_node);
    for child in node.children() {
        to_scene_node(asset, Some(id), child, buf);
    }
}
