//! Named material and geometry presets
//!
//! Renderers fall back to these when a record carries no explicit style.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::geometry::{create_geometry, GeometryDescriptor, GeometryKind, GeometryOptions};
use super::material::{create_material, MaterialDescriptor, MaterialKind, MaterialOptions};
use crate::foundation::math::Color;

/// Read-only set of named presets
pub struct Catalog {
    materials: BTreeMap<String, Arc<MaterialDescriptor>>,
    geometries: BTreeMap<String, Arc<GeometryDescriptor>>,
    basic: Arc<MaterialDescriptor>,
}

impl Catalog {
    /// The built-in presets
    pub fn standard() -> Self {
        let basic = Arc::new(create_material(MaterialKind::Basic, &MaterialOptions::default()));
        let mut materials = BTreeMap::new();
        materials.insert("basic".to_string(), Arc::clone(&basic));
        let presets = [
            (
                MaterialKind::Emissive,
                MaterialOptions {
                    emissive_intensity: 1.5,
                    ..MaterialOptions::colored(Color::ORANGE)
                },
            ),
            (
                MaterialKind::Pulse,
                MaterialOptions {
                    pulse_speed: 2.0,
                    ..MaterialOptions::colored(Color::CYAN)
                },
            ),
            (MaterialKind::Dashed, MaterialOptions::colored(Color::GREY).with_width(1.5)),
            (MaterialKind::Glow, MaterialOptions::colored(Color::CYAN).with_width(4.0)),
            (
                MaterialKind::Gradient,
                MaterialOptions::colored(Color::CYAN).with_end_color(Color::WHITE.with_alpha(0.2)),
            ),
        ];
        for (kind, options) in presets {
            materials.insert(kind.name().to_string(), Arc::new(create_material(kind, &options)));
        }

        let mut geometries = BTreeMap::new();
        for kind in [GeometryKind::Sphere, GeometryKind::Box, GeometryKind::Cylinder, GeometryKind::Plane] {
            geometries.insert(
                kind.name().to_string(),
                Arc::new(create_geometry(kind, &GeometryOptions::default())),
            );
        }

        Self {
            materials,
            geometries,
            basic,
        }
    }

    /// The "basic" material
    pub fn basic(&self) -> Arc<MaterialDescriptor> {
        Arc::clone(&self.basic)
    }

    /// Material preset by name
    pub fn material(&self, name: &str) -> Option<Arc<MaterialDescriptor>> {
        self.materials.get(name).cloned()
    }

    /// Material preset by name, "basic" when unknown
    pub fn material_or_basic(&self, name: &str) -> Arc<MaterialDescriptor> {
        self.material(name).unwrap_or_else(|| {
            log::debug!("Unknown material preset '{}', using basic", name);
            self.basic()
        })
    }

    /// Geometry preset by name
    pub fn geometry(&self, name: &str) -> Option<Arc<GeometryDescriptor>> {
        self.geometries.get(name).cloned()
    }

    /// Names of all material presets
    pub fn material_names(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(String::as_str)
    }

    /// Names of all geometry presets
    pub fn geometry_names(&self) -> impl Iterator<Item = &str> {
        self.geometries.keys().map(String::as_str)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
