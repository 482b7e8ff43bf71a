//! Material post-processing for freshly cloned scene assets.
//!
//! Both passes operate on the material table of an owned [`SceneAsset`]
//! clone; cached templates are never touched.

use crate::{
    config::MaterialConfig,
    data_structures::{material::Material, scene_graph::SceneAsset},
};

/// Darkens untextured or implausibly light tire materials to rubber and
/// makes every tire material opaque and double sided. Primitives without a
/// material are given a shared rubber one.
///
/// Returns how many materials were recolored.
pub fn normalize_tire_materials(tire: &mut SceneAsset, config: &MaterialConfig) -> usize {
    assign_missing_materials(tire);
    let mut recolored = 0;
    for material in tire.materials.iter_mut() {
        if material.brightness() > config.bright_threshold || !material.has_base_color_texture {
            let [r, g, b] = config.rubber_color;
            material.base_color = [r, g, b, 1.0];
            material.roughness = material.roughness.max(config.rubber_roughness);
            material.metallic = material.metallic.min(config.rubber_metallic);
            recolored += 1;
        }
        material.opacity = 1.0;
        material.base_color[3] = 1.0;
        material.transparent = false;
        material.double_sided = true;
    }
    if recolored > 0 {
        log::debug!(
            "{}: {recolored}/{} tire materials recolored to rubber",
            tire.source(),
            tire.materials.len()
        );
    }
    recolored
}

/// Points every primitive without a material at one fresh, untextured
/// material so the recolor pass reaches it.
fn assign_missing_materials(tire: &mut SceneAsset) {
    let unassigned: Vec<_> = tire
        .meshes()
        .filter(|(_, mesh)| mesh.primitives.iter().any(|p| p.material.is_none()))
        .map(|(id, _)| id)
        .collect();
    if unassigned.is_empty() {
        return;
    }
    let index = tire.add_material(Material::new("rubber", [1.0, 1.0, 1.0, 1.0]));
    for id in unassigned {
        let Some(mesh) = tire.node_mut(id).and_then(|node| node.mesh.as_mut()) else {
            continue;
        };
        for primitive in mesh.primitives.iter_mut().filter(|p| p.material.is_none()) {
            primitive.material = Some(index);
        }
    }
    log::debug!("{}: gave unassigned tire primitives material {index}", tire.source());
}

/// Lifts chassis materials a little so the body reads well under the
/// showroom lights.
pub fn normalize_chassis_materials(chassis: &mut SceneAsset, config: &MaterialConfig) {
    for material in chassis.materials.iter_mut() {
        for (emissive, base) in material.emissive.iter_mut().zip(material.base_color) {
            *emissive = (*emissive + base * config.chassis_emissive).min(1.0);
        }
        material.reflectivity *= config.chassis_reflectivity_boost;
    }
}
