/// Metallic-roughness material as read from a glTF document.
///
/// Only the parameters the normalizer touches are kept; texture images are
/// never decoded, the loader just records whether a base color texture exists.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub has_base_color_texture: bool,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub emissive_strength: f32,
    /// Environment reflection multiplier.
    pub reflectivity: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub double_sided: bool,
}

impl Material {
    pub fn new(name: &str, base_color: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            base_color,
            opacity: base_color[3],
            ..Default::default()
        }
    }

    /// Mean of the base color's RGB channels.
    pub fn brightness(&self) -> f32 {
        (self.base_color[0] + self.base_color[1] + self.base_color[2]) / 3.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            base_color: [1.0, 1.0, 1.0, 1.0],
            has_base_color_texture: false,
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0; 3],
            emissive_strength: 1.0,
            reflectivity: 1.0,
            opacity: 1.0,
            transparent: false,
            double_sided: false,
        }
    }
}
