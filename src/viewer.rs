//! The fitment viewer: one session per requested tire.
//!
//! [`FitmentViewer`] issues the background, chassis and tire loads, applies
//! their results in dependency order (material normalization, composition,
//! wheel detection, fitment) and reports progress to the host through
//! [`ViewerEvents`]. Loads run as futures owned by the viewer; results are
//! applied only when the viewer is polled, so the scene is never touched
//! from inside a load.
//!
//! Hosts with their own frame loop call [`FitmentViewer::update`] every
//! frame. On native targets [`FitmentViewer::run`] drives a session to
//! completion (or timeout) on the tokio runtime instead.

use std::{collections::HashMap, rc::Rc};

use futures::{
    FutureExt, StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
};
use instant::Instant;

use crate::{
    camera::CameraController,
    compose::{
        BackdropPlacement, ChassisPlacement, Environment, compose_backdrop, compose_chassis,
    },
    config::Config,
    data_structures::scene_graph::SceneAsset,
    error::AssetError,
    fitment::{TireInstance, fit_all},
    flow::{LoadState, Notification, Orchestrator, Slot, Stage, ViewerEvents, dispatch},
    normalize::{normalize_chassis_materials, normalize_tire_materials},
    resources::AssetLoader,
    wheels::{WheelDetection, locate_wheels},
};

/// What the host knows about the tire to show.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TireSource {
    /// Catalog identifier, used for legacy model lookups.
    pub id: String,
    pub model_url: Option<String>,
    /// Photo for the side-by-side panel. Passed through untouched.
    pub reference_image: Option<String>,
}

impl TireSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_model_url(mut self, url: &str) -> Self {
        self.model_url = Some(url.to_string());
        self
    }

    pub fn with_reference_image(mut self, url: &str) -> Self {
        self.reference_image = Some(url.to_string());
        self
    }

    /// The model path to load: an explicit URL, else a legacy entry for the
    /// id (case-insensitive), else `None`.
    pub fn resolve_path(&self, legacy: &HashMap<String, String>) -> Option<String> {
        if let Some(url) = self.model_url.as_deref().map(str::trim) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
        let id = self.id.trim();
        if id.is_empty() {
            return None;
        }
        legacy
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id))
            .map(|(_, path)| path.clone())
    }
}

enum LoadEvent {
    Background(Result<Rc<SceneAsset>, AssetError>),
    Chassis(Result<Rc<SceneAsset>, AssetError>),
    Tire(Result<Rc<SceneAsset>, AssetError>),
}

type PendingLoad = LocalBoxFuture<'static, (u64, LoadEvent)>;

/// Everything the host renders for the current session.
#[derive(Debug)]
pub struct ViewerScene {
    pub backdrop: Option<SceneAsset>,
    pub backdrop_placement: Option<BackdropPlacement>,
    pub chassis: Option<SceneAsset>,
    pub chassis_placement: Option<ChassisPlacement>,
    pub wheels: Option<WheelDetection>,
    /// Normalized copy of the tire template; fitted copies are in `tires`.
    pub tire_template: Option<SceneAsset>,
    pub tires: Vec<TireInstance>,
    pub environment: Environment,
    pub reference_image: Option<String>,
}

impl ViewerScene {
    fn new(config: &Config) -> Self {
        Self {
            backdrop: None,
            backdrop_placement: None,
            chassis: None,
            chassis_placement: None,
            wheels: None,
            tire_template: None,
            tires: Vec::new(),
            environment: Environment::new(&config.composer),
            reference_image: None,
        }
    }
}

pub struct FitmentViewer {
    config: Config,
    loader: Rc<AssetLoader>,
    orchestrator: Orchestrator,
    pub camera: CameraController,
    pending: FuturesUnordered<PendingLoad>,
    outbox: Vec<Notification>,
    scene: ViewerScene,
}

impl FitmentViewer {
    pub fn new(config: Config) -> Self {
        let loader = AssetLoader::from_config(&config.assets);
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: Config, loader: AssetLoader) -> Self {
        Self {
            orchestrator: Orchestrator::new(config.load_timeout()),
            camera: CameraController::new(config.camera.clone()),
            loader: Rc::new(loader),
            pending: FuturesUnordered::new(),
            outbox: Vec::new(),
            scene: ViewerScene::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn loader(&self) -> &AssetLoader {
        &self.loader
    }

    pub fn scene(&self) -> &ViewerScene {
        &self.scene
    }

    pub fn is_ready(&self) -> bool {
        self.orchestrator.is_ready()
    }

    pub fn stage(&self) -> Stage {
        self.orchestrator.stage()
    }

    pub fn generation(&self) -> u64 {
        self.orchestrator.generation()
    }

    pub fn state(&self, slot: Slot) -> &LoadState {
        self.orchestrator.state(slot)
    }

    /// Starts a session for `tire`, superseding any previous one. Loads of
    /// the previous session keep running but their results are discarded.
    pub fn show(&mut self, tire: &TireSource, now: Instant) -> u64 {
        let generation = self.orchestrator.begin(now);
        self.outbox.clear();
        self.scene = ViewerScene::new(&self.config);
        self.scene.reference_image = tire.reference_image.clone();
        self.camera.reset();

        let assets = &self.config.assets;
        let (backdrop, chassis) = (assets.backdrop_path.clone(), assets.chassis_path.clone());
        self.spawn(generation, backdrop, LoadEvent::Background);
        self.spawn(generation, chassis, LoadEvent::Chassis);

        match tire.resolve_path(&self.config.assets.legacy_models) {
            Some(path) => {
                log::info!("session {generation}: tire {} from {path}", tire.id);
                self.spawn(generation, path, LoadEvent::Tire);
            }
            None => {
                log::info!("session {generation}: no 3D model for tire {:?}", tire.id);
                let out = self
                    .orchestrator
                    .settle(generation, Slot::Tires, LoadState::Missing);
                self.outbox.extend(out);
            }
        }
        generation
    }

    fn spawn(
        &mut self,
        generation: u64,
        path: String,
        wrap: fn(Result<Rc<SceneAsset>, AssetError>) -> LoadEvent,
    ) {
        let loader = Rc::clone(&self.loader);
        self.pending.push(
            async move {
                let result = loader.load(&path).await;
                (generation, wrap(result))
            }
            .boxed_local(),
        );
    }

    /// Applies every load that has finished, checks the timeout and delivers
    /// notifications. Never blocks.
    pub fn update(&mut self, now: Instant, events: &mut dyn ViewerEvents) -> bool {
        while let Some(Some((generation, event))) = self.pending.next().now_or_never() {
            self.apply(generation, event);
        }
        let out = self.orchestrator.tick(now);
        self.outbox.extend(out);
        self.flush(events);
        self.orchestrator.is_ready()
    }

    /// Drives the current session until every load has settled or the
    /// timeout expires. Loads still in flight afterwards are picked up by
    /// later calls to [`FitmentViewer::update`].
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn run(&mut self, events: &mut dyn ViewerEvents) {
        let Some(remaining) = self.orchestrator.remaining(Instant::now()) else {
            self.flush(events);
            return;
        };
        let deadline = tokio::time::sleep(remaining);
        tokio::pin!(deadline);
        loop {
            self.flush(events);
            if self.orchestrator.is_settled() || self.orchestrator.stage() == Stage::Idle {
                break;
            }
            tokio::select! {
                next = self.pending.next() => match next {
                    Some((generation, event)) => self.apply(generation, event),
                    None => break,
                },
                _ = &mut deadline => {
                    let out = self.orchestrator.expire();
                    self.outbox.extend(out);
                    self.flush(events);
                    break;
                }
            }
        }
    }

    /// Drops pending loads, clears the template cache and the scene.
    pub fn teardown(&mut self) {
        self.pending = FuturesUnordered::new();
        self.outbox.clear();
        self.orchestrator.reset();
        self.loader.clear();
        self.scene = ViewerScene::new(&self.config);
        log::debug!("viewer torn down");
    }

    fn flush(&mut self, events: &mut dyn ViewerEvents) {
        if !self.outbox.is_empty() {
            dispatch(std::mem::take(&mut self.outbox), events);
        }
    }

    fn apply(&mut self, generation: u64, event: LoadEvent) {
        if !self.orchestrator.is_current(generation) {
            log::warn!(
                "ignoring load result of superseded session {generation} (current {})",
                self.orchestrator.generation()
            );
            return;
        }
        let (slot, state) = match event {
            LoadEvent::Background(Ok(template)) => {
                let mut backdrop = (*template).clone();
                let placement = compose_backdrop(&mut backdrop, &self.config.composer);
                self.scene.backdrop = Some(backdrop);
                self.scene.backdrop_placement = Some(placement);
                (Slot::Background, LoadState::Loaded)
            }
            LoadEvent::Chassis(Ok(template)) => {
                let mut chassis = (*template).clone();
                normalize_chassis_materials(&mut chassis, &self.config.materials);
                let placement = compose_chassis(&mut chassis, &self.config.composer);
                let wheels = locate_wheels(&mut chassis, &self.config.locator);
                self.scene.chassis = Some(chassis);
                self.scene.chassis_placement = Some(placement);
                self.scene.wheels = Some(wheels);
                self.fit_tires();
                (Slot::Chassis, LoadState::Loaded)
            }
            LoadEvent::Tire(Ok(template)) => {
                let mut tire = (*template).clone();
                normalize_tire_materials(&mut tire, &self.config.materials);
                self.scene.tire_template = Some(tire);
                self.fit_tires();
                (Slot::Tires, LoadState::Loaded)
            }
            LoadEvent::Tire(Err(AssetError::NotFound(path))) => {
                log::info!("tire model {path} does not exist");
                (Slot::Tires, LoadState::Missing)
            }
            LoadEvent::Background(Err(e)) => (Slot::Background, LoadState::Failed(e)),
            LoadEvent::Chassis(Err(e)) => (Slot::Chassis, LoadState::Failed(e)),
            LoadEvent::Tire(Err(e)) => (Slot::Tires, LoadState::Failed(e)),
        };
        let out = self.orchestrator.settle(generation, slot, state);
        self.outbox.extend(out);
    }

    /// Fits the tire template onto every mount once both are known.
    fn fit_tires(&mut self) {
        let scene = &mut self.scene;
        let (Some(chassis), Some(placement), Some(wheels), Some(tire)) = (
            &scene.chassis,
            &scene.chassis_placement,
            &scene.wheels,
            &scene.tire_template,
        ) else {
            return;
        };
        scene.tires = fit_all(
            &wheels.mounts,
            chassis,
            tire,
            placement.scale,
            &self.config.fitment,
        );
        log::info!(
            "fitted {} onto {} mounts ({:?} detection)",
            tire.source(),
            scene.tires.len(),
            wheels.method
        );
    }
}

/// Sets up logging for the current target.
pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        // Fails only when a logger is already installed.
        let _ = console_log::init_with_level(log::Level::Info);
    }
}
