use std::rc::Rc;

use fitment_ngin::{
    config::Config,
    error::AssetError,
    flow::{LoadState, Notification, Orchestrator, Slot, Stage},
    resources::{AssetLoader, source::SignUrl},
    viewer::{FitmentViewer, TireSource},
};
use instant::{Duration, Instant};

use crate::common::test_utils::{
    MemorySource, RecordingHost, StubSigner, backdrop, chassis_with_named_wheels, flat_tire,
};

mod common;

const CHASSIS: &str = "models/chassis.glb";
const SHOWROOM: &str = "models/showroom.glb";

fn stocked_source() -> MemorySource {
    let source = MemorySource::new();
    source.insert_scene(
        CHASSIS,
        &chassis_with_named_wheels(["wheel_FL", "wheel_FR", "wheel_RL", "wheel_RR"]),
    );
    source.insert_scene(SHOWROOM, &backdrop([0.0, 0.0, 0.0], 24.0));
    source.insert_scene("tires/t-100.glb", &flat_tire(0.5, 0.3));
    source.insert_scene("tires/t-200.glb", &flat_tire(0.4, 0.3));
    source
}

fn viewer_with(config: Config, source: &MemorySource, signer: Option<StubSigner>) -> FitmentViewer {
    let loader = AssetLoader::new(
        Box::new(source.clone()),
        signer.map(|s| Box::new(s) as Box<dyn SignUrl>),
        &config.assets.private_segment,
    );
    FitmentViewer::with_loader(config, loader)
}

fn viewer(source: &MemorySource) -> FitmentViewer {
    viewer_with(Config::default(), source, None)
}

#[tokio::test]
async fn full_session_fits_four_tires() {
    let source = stocked_source();
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    viewer.run(&mut host).await;

    assert!(viewer.is_ready());
    assert_eq!(viewer.stage(), Stage::Ready);
    for entry in ["background", "chassis", "tires", "ready"] {
        assert_eq!(host.count(entry), 1, "{entry} in {:?}", host.log);
    }
    assert!(host.errors.is_empty());

    let scene = viewer.scene();
    let chassis = scene.chassis.as_ref().unwrap();
    let center = chassis.world_bounds().center();
    assert!(center.x.abs() < 1e-3 && center.z.abs() < 1e-3);
    assert_eq!(scene.tires.len(), 4);
    // wheels are 0.7 across before the 1.15 chassis scale
    let wheel = 0.7 * 1.15;
    for tire in &scene.tires {
        let diameter = tire.asset.world_bounds().max_dimension();
        assert!((diameter - 0.95 * wheel).abs() < 1e-3, "{diameter}");
    }
    let mut mounts: Vec<usize> = scene.tires.iter().map(|t| t.mount).collect();
    mounts.sort();
    assert_eq!(mounts, [0, 1, 2, 3]);
}

#[tokio::test]
async fn tire_without_model_is_reported_missing() {
    let source = stocked_source();
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(&TireSource::new("t-999"), Instant::now());
    viewer.run(&mut host).await;

    assert_eq!(host.count("tires_missing"), 1);
    assert_eq!(host.count("ready"), 1);
    assert_eq!(host.count("error"), 0);
    assert_eq!(*viewer.state(Slot::Tires), LoadState::Missing);
    assert!(viewer.scene().tires.is_empty());
    assert!(!source.requests().iter().any(|r| r.starts_with("tires/")));
}

#[tokio::test]
async fn tire_model_that_does_not_exist_is_missing_not_an_error() {
    let source = stocked_source();
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-300").with_model_url("tires/t-300.glb"),
        Instant::now(),
    );
    viewer.run(&mut host).await;

    assert_eq!(host.count("tires_missing"), 1);
    assert!(host.errors.is_empty());
    assert!(viewer.is_ready());
}

#[tokio::test]
async fn private_tire_with_failed_signing_reports_forbidden() {
    let path = "tires/private/t-100.glb";
    let source = stocked_source();
    let mut viewer = viewer_with(
        Config::default(),
        &source,
        Some(StubSigner::failing("signing service down")),
    );
    let mut host = RecordingHost::default();

    viewer.show(&TireSource::new("t-100").with_model_url(path), Instant::now());
    viewer.run(&mut host).await;

    assert_eq!(host.errors, [AssetError::Forbidden(path.to_string())]);
    assert_eq!(host.count("ready"), 1);
    assert_eq!(host.count("chassis"), 1);
    assert!(matches!(viewer.state(Slot::Tires), LoadState::Failed(_)));
}

#[tokio::test]
async fn missing_chassis_is_an_error_but_still_ready() {
    let source = MemorySource::new();
    source.insert_scene(SHOWROOM, &backdrop([0.0, 0.0, 0.0], 24.0));
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(&TireSource::new("t-100"), Instant::now());
    viewer.run(&mut host).await;

    assert_eq!(host.errors, [AssetError::NotFound(CHASSIS.to_string())]);
    assert!(viewer.is_ready());
}

#[tokio::test]
async fn timeout_forces_ready_while_chassis_hangs() {
    let source = stocked_source();
    source.hang(CHASSIS);
    let config = Config {
        load_timeout_ms: 50,
        ..Default::default()
    };
    let mut viewer = viewer_with(config, &source, None);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    viewer.run(&mut host).await;

    assert!(viewer.is_ready());
    assert_eq!(host.count("ready"), 1);
    assert_eq!(host.count("chassis"), 0);
    assert_eq!(*viewer.state(Slot::Chassis), LoadState::Loading);
    // the tire arrived but has nothing to be fitted onto yet
    assert!(viewer.scene().tire_template.is_some());
    assert!(viewer.scene().tires.is_empty());
}

#[test]
fn update_applies_finished_loads_in_one_frame() {
    let source = stocked_source();
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    assert!(host.log.is_empty());

    assert!(viewer.update(Instant::now(), &mut host));
    assert_eq!(viewer.scene().tires.len(), 4);
    assert_eq!(host.count("ready"), 1);

    // nothing new on the next frame
    viewer.update(Instant::now(), &mut host);
    assert_eq!(host.count("ready"), 1);
}

#[test]
fn update_times_out_on_the_frame_clock() {
    let source = stocked_source();
    source.hang(CHASSIS);
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();
    let start = Instant::now();

    viewer.show(&TireSource::new("t-100"), start);
    assert!(!viewer.update(start + Duration::from_millis(100), &mut host));
    assert!(viewer.update(start + Duration::from_millis(6001), &mut host));
    assert_eq!(host.count("ready"), 1);
}

#[test]
fn superseded_session_results_are_discarded() {
    let source = stocked_source();
    let release_first = source.gate("tires/t-100.glb");
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    let first = viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);
    assert_eq!(*viewer.state(Slot::Tires), LoadState::Loading);

    let second = viewer.show(
        &TireSource::new("t-200").with_model_url("tires/t-200.glb"),
        Instant::now(),
    );
    assert!(second > first);
    viewer.update(Instant::now(), &mut host);
    let template = viewer.scene().tire_template.as_ref().unwrap();
    assert_eq!(template.source(), "tires/t-200.glb");

    release_first.send(()).unwrap();
    viewer.update(Instant::now(), &mut host);

    let template = viewer.scene().tire_template.as_ref().unwrap();
    assert_eq!(template.source(), "tires/t-200.glb");
    assert_eq!(viewer.generation(), second);
    assert_eq!(host.count("tires"), 1);
}

#[test]
fn chassis_and_backdrop_come_from_the_cache_on_the_next_tire() {
    let source = stocked_source();
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);
    viewer.show(
        &TireSource::new("t-200").with_model_url("tires/t-200.glb"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);

    assert_eq!(source.request_count(CHASSIS), 1);
    assert_eq!(source.request_count(SHOWROOM), 1);
    assert_eq!(viewer.scene().tires.len(), 4);
}

#[test]
fn chassis_still_loading_is_not_fetched_again_by_the_next_session() {
    let source = stocked_source();
    let release = source.gate(CHASSIS);
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);
    viewer.show(
        &TireSource::new("t-200").with_model_url("tires/t-200.glb"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);
    assert!(viewer.scene().chassis.is_none());

    release.send(()).unwrap();
    viewer.update(Instant::now(), &mut host);

    assert_eq!(source.request_count(CHASSIS), 1);
    assert_eq!(host.count("chassis"), 1);
    assert_eq!(viewer.scene().tires.len(), 4);
    let template = viewer.scene().tire_template.as_ref().unwrap();
    assert_eq!(template.source(), "tires/t-200.glb");
}

#[test]
fn legacy_ids_resolve_case_insensitively() {
    let source = stocked_source();
    let mut config = Config::default();
    config
        .assets
        .legacy_models
        .insert("WINTER-100".to_string(), "tires/t-100.glb".to_string());
    let mut viewer = viewer_with(config, &source, None);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("winter-100").with_reference_image("images/winter-100.jpg"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);

    assert_eq!(source.request_count("tires/t-100.glb"), 1);
    assert_eq!(host.count("tires"), 1);
    assert_eq!(
        viewer.scene().reference_image.as_deref(),
        Some("images/winter-100.jpg")
    );
}

#[test]
fn explicit_model_url_wins_over_legacy_entry() {
    let mut legacy = std::collections::HashMap::new();
    legacy.insert("t-100".to_string(), "tires/legacy.glb".to_string());

    let explicit = TireSource::new("t-100").with_model_url("  tires/t-100.glb ");
    assert_eq!(explicit.resolve_path(&legacy).as_deref(), Some("tires/t-100.glb"));

    let blank = TireSource::new("T-100").with_model_url("   ");
    assert_eq!(blank.resolve_path(&legacy).as_deref(), Some("tires/legacy.glb"));

    assert_eq!(TireSource::new("").resolve_path(&legacy), None);
}

#[test]
fn teardown_clears_cache_and_scene() {
    let source = stocked_source();
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);
    viewer.teardown();

    assert_eq!(viewer.stage(), Stage::Idle);
    assert!(!viewer.is_ready());
    assert!(viewer.loader().cached(CHASSIS).is_none());
    assert!(viewer.scene().chassis.is_none());
    assert!(viewer.scene().tires.is_empty());
}

#[test]
fn orchestrator_waits_for_background_and_chassis() {
    let start = Instant::now();
    let mut orchestrator = Orchestrator::new(Duration::from_secs(6));
    let generation = orchestrator.begin(start);

    assert_eq!(
        orchestrator.settle(generation, Slot::Tires, LoadState::Loaded),
        [Notification::TiresLoaded]
    );
    assert_eq!(
        orchestrator.settle(generation, Slot::Background, LoadState::Loaded),
        [Notification::BackgroundLoaded]
    );
    assert!(!orchestrator.is_ready());
    assert_eq!(
        orchestrator.settle(generation, Slot::Chassis, LoadState::Loaded),
        [Notification::ChassisLoaded, Notification::Ready]
    );
    assert!(orchestrator.is_ready());
    assert!(orchestrator.is_settled());
}

#[test]
fn orchestrator_moves_to_loading_tires_when_chassis_arrives_first() {
    let mut orchestrator = Orchestrator::new(Duration::from_secs(6));
    let generation = orchestrator.begin(Instant::now());

    orchestrator.settle(generation, Slot::Chassis, LoadState::Loaded);

    assert_eq!(orchestrator.stage(), Stage::LoadingTires);
}

#[test]
fn orchestrator_ignores_stale_generations() {
    let mut orchestrator = Orchestrator::new(Duration::from_secs(6));
    let stale = orchestrator.begin(Instant::now());
    let current = orchestrator.begin(Instant::now());

    assert!(orchestrator.settle(stale, Slot::Chassis, LoadState::Loaded).is_empty());
    assert_eq!(*orchestrator.state(Slot::Chassis), LoadState::Loading);
    assert!(orchestrator.is_current(current));
    assert!(!orchestrator.is_current(stale));
}

#[test]
fn orchestrator_expires_once() {
    let start = Instant::now();
    let mut orchestrator = Orchestrator::new(Duration::from_millis(100));
    orchestrator.begin(start);

    assert!(orchestrator.tick(start + Duration::from_millis(50)).is_empty());
    assert_eq!(
        orchestrator.tick(start + Duration::from_millis(100)),
        [Notification::Ready]
    );
    assert!(orchestrator.tick(start + Duration::from_millis(200)).is_empty());
    assert_eq!(orchestrator.remaining(start), None);

    orchestrator.reset();
    assert!(orchestrator.expire().is_empty());
    assert_eq!(orchestrator.stage(), Stage::Idle);
}

#[test]
fn loads_share_the_template_cache() {
    let source = stocked_source();
    let mut viewer = viewer(&source);
    let mut host = RecordingHost::default();

    viewer.show(
        &TireSource::new("t-100").with_model_url("tires/t-100.glb"),
        Instant::now(),
    );
    viewer.update(Instant::now(), &mut host);

    let cached = viewer.loader().cached("tires/t-100.glb").unwrap();
    let again = viewer.loader().cached("tires/t-100.glb").unwrap();
    assert!(Rc::ptr_eq(&cached, &again));
    // the scene holds a normalized copy, the template keeps its authored color
    assert_eq!(cached.materials[0].base_color, [0.95, 0.95, 0.95, 1.0]);
    let template = viewer.scene().tire_template.as_ref().unwrap();
    assert_ne!(template.materials[0].base_color, cached.materials[0].base_color);
}
