//! Engine configuration.
//!
//! Every tunable constant of the pipeline lives here. Hosts usually keep the
//! defaults and override a handful of values from JSON:
//!
//! ```
//! let config = fitment_ngin::config::Config::from_json(
//!     r#"{ "fitment": { "vertical_nudge": 0.0 }, "load_timeout_ms": 5000 }"#,
//! ).unwrap();
//! assert_eq!(config.load_timeout_ms, 5000);
//! assert_eq!(config.fitment.under_fit, 0.95);
//! ```

use std::collections::HashMap;

use instant::Duration;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assets: AssetConfig,
    pub materials: MaterialConfig,
    pub locator: LocatorConfig,
    pub fitment: FitmentConfig,
    pub composer: ComposerConfig,
    pub camera: CameraConfig,
    /// Upper bound on how long the host waits before interaction is enabled.
    pub load_timeout_ms: u64,
}

impl Config {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: AssetConfig::default(),
            materials: MaterialConfig::default(),
            locator: LocatorConfig::default(),
            fitment: FitmentConfig::default(),
            composer: ComposerConfig::default(),
            camera: CameraConfig::default(),
            load_timeout_ms: 6000,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub chassis_path: String,
    pub backdrop_path: String,
    /// Local files are resolved against this directory on native targets.
    pub base_dir: String,
    /// Paths containing this segment need a signed URL before they can be fetched.
    pub private_segment: String,
    /// Endpoint answering `GET <endpoint>?url=<path>` with `{ "signedUrl": ... }`.
    pub signed_url_endpoint: Option<String>,
    /// Legacy tire identifiers that predate explicit model URLs.
    pub legacy_models: HashMap<String, String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            chassis_path: String::from("models/chassis.glb"),
            backdrop_path: String::from("models/showroom.glb"),
            base_dir: String::from("./assets"),
            private_segment: String::from("/private/"),
            signed_url_endpoint: Some(String::from("/signed-url")),
            legacy_models: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Tire materials brighter than this are treated as missing their texture.
    pub bright_threshold: f32,
    pub rubber_color: [f32; 3],
    pub rubber_roughness: f32,
    pub rubber_metallic: f32,
    /// Fraction of the base color added to a chassis material's emissive.
    pub chassis_emissive: f32,
    pub chassis_reflectivity_boost: f32,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            bright_threshold: 0.8,
            rubber_color: [0.06, 0.06, 0.06],
            rubber_roughness: 0.9,
            rubber_metallic: 0.05,
            chassis_emissive: 0.08,
            chassis_reflectivity_boost: 1.25,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Case-insensitive substrings marking a node as a wheel.
    pub wheel_tokens: Vec<String>,
    /// Tokens marking a node as a container of several wheels.
    pub container_tokens: Vec<String>,
    pub min_wheel_diameter: f32,
    pub max_wheel_diameter: f32,
    /// Accepted range of max/min bounding dimension for a disc-like wheel.
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Wheels must sit within this fraction of the chassis height above its bottom.
    pub ground_band: f32,
    /// Axles sit this fraction of the chassis length away from its center.
    pub axle_offset: f32,
    /// Wheels sit this fraction of the chassis width away from its center.
    pub track_offset: f32,
    /// Estimated wheel diameter as a fraction of the chassis length.
    pub wheel_diameter_fraction: f32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let tokens = [
            "wheel", "tire", "tyre", "rim", "fl", "fr", "rl", "rr", "front_left", "front_right",
            "rear_left", "rear_right", "frontleft", "frontright", "rearleft", "rearright",
        ];
        Self {
            wheel_tokens: tokens.iter().map(|t| t.to_string()).collect(),
            container_tokens: ["wheels", "tires", "tyres", "rims"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            min_wheel_diameter: 0.1,
            max_wheel_diameter: 2.0,
            min_aspect: 1.3,
            max_aspect: 8.0,
            ground_band: 0.6,
            axle_offset: 0.3,
            track_offset: 0.42,
            wheel_diameter_fraction: 0.16,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FitmentConfig {
    /// Tires are scaled to this fraction of the wheel diameter.
    pub under_fit: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Clamp applied when the mount has no source geometry.
    pub synthetic_min_scale: f32,
    pub synthetic_max_scale: f32,
    /// Wheel diameter estimate for synthetic mounts, as a fraction of chassis length.
    pub synthetic_diameter_fraction: f32,
    /// Upward nudge, in chassis units, applied after centering.
    pub vertical_nudge: f32,
    /// Outward nudge along the mount's lateral direction, in chassis units.
    pub lateral_nudge: f32,
}

impl Default for FitmentConfig {
    fn default() -> Self {
        Self {
            under_fit: 0.95,
            min_scale: 0.001,
            max_scale: 100.0,
            synthetic_min_scale: 0.15,
            synthetic_max_scale: 1.0,
            synthetic_diameter_fraction: 0.16,
            vertical_nudge: 0.01,
            lateral_nudge: 0.02,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Uniform enlargement applied to the chassis before centering.
    pub chassis_scale: f32,
    /// Height of the chassis bottom above the floor plane.
    pub floor_offset: f32,
    pub centering_tolerance: f32,
    pub max_correction_passes: usize,
    /// Authored backdrop placement, used when the asset looks conventional.
    pub backdrop_scale: f32,
    pub backdrop_offset: [f32; 3],
    /// Size the backdrop is re-derived to when its authoring looks off.
    pub backdrop_target_size: f32,
    /// Backdrops whose center lies farther than this fraction of their size
    /// from their origin are treated as authored off-origin.
    pub backdrop_off_center: f32,
    /// Backdrops outside `[target / ratio, target * ratio]` are rescaled.
    pub backdrop_scale_ratio: f32,
    /// Half-size of the enclosing backdrop planes.
    pub enclosure_extent: f32,
    pub enclosure_color: [f32; 3],
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            chassis_scale: 1.15,
            floor_offset: 0.05,
            centering_tolerance: 1e-3,
            max_correction_passes: 3,
            backdrop_scale: 1.0,
            backdrop_offset: [0.0, 0.0, 0.0],
            backdrop_target_size: 24.0,
            backdrop_off_center: 0.25,
            backdrop_scale_ratio: 4.0,
            enclosure_extent: 30.0,
            enclosure_color: [0.92, 0.92, 0.94],
        }
    }
}

/// Angles are in degrees.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub default_azimuth: f32,
    pub default_polar: f32,
    pub default_distance: f32,
    pub min_azimuth: f32,
    pub max_azimuth: f32,
    pub min_polar: f32,
    pub max_polar: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Multiplicative distance change per programmatic zoom step.
    pub zoom_step: f32,
    /// How far the look-at target may be panned away from the origin.
    pub max_pan: f32,
    /// Degrees of orbit per pixel of mouse drag.
    pub rotate_speed: f32,
    /// World units of pan per pixel of mouse drag, at unit distance.
    pub pan_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_azimuth: 35.0,
            default_polar: 72.0,
            default_distance: 6.0,
            min_azimuth: -110.0,
            max_azimuth: 110.0,
            min_polar: 20.0,
            max_polar: 88.0,
            min_distance: 2.5,
            max_distance: 12.0,
            zoom_step: 0.85,
            max_pan: 2.0,
            rotate_speed: 0.3,
            pan_speed: 0.002,
        }
    }
}
