//! Declarative geometry descriptors

use serde::{Deserialize, Serialize};

/// Shape family understood by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    /// UV sphere
    Sphere,
    /// Axis-aligned box
    Box,
    /// Capped cylinder
    Cylinder,
    /// Flat quad
    Plane,
    /// Externally loaded mesh
    Mesh,
}

impl GeometryKind {
    /// Name used in signatures and presets
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sphere => "sphere",
            Self::Box => "box",
            Self::Cylinder => "cylinder",
            Self::Plane => "plane",
            Self::Mesh => "mesh",
        }
    }
}

/// Inputs to [`create_geometry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryOptions {
    /// Extent along x/y/z in meters (radius in x for spheres/cylinders)
    pub dimensions: [f64; 3],
    /// Tessellation segments for curved shapes
    pub segments: u32,
    /// Source resource for meshes
    pub source: Option<String>,
}

impl GeometryOptions {
    /// Options with uniform size
    pub fn uniform(size: f64) -> Self {
        Self {
            dimensions: [size, size, size],
            ..Self::default()
        }
    }

    /// Options for an external mesh
    pub fn mesh(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            dimensions: [1.0, 1.0, 1.0],
            segments: 16,
            source: None,
        }
    }
}

/// Renderer-native geometry description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDescriptor {
    /// Shape family
    pub kind: GeometryKind,
    /// Identifier shared by all identical shapes (instancing key)
    pub id: String,
    /// Resolved inputs
    pub options: GeometryOptions,
}

/// Build a geometry descriptor; pure function of its inputs
pub fn create_geometry(kind: GeometryKind, options: &GeometryOptions) -> GeometryDescriptor {
    let mut options = options.clone();
    for d in &mut options.dimensions {
        *d = d.abs();
    }
    options.segments = match kind {
        GeometryKind::Box | GeometryKind::Plane | GeometryKind::Mesh => 1,
        GeometryKind::Sphere | GeometryKind::Cylinder => options.segments.clamp(3, 256),
    };
    GeometryDescriptor {
        id: geometry_signature(kind, &options),
        kind,
        options,
    }
}

/// Signature of a geometry without building it
pub fn geometry_signature(kind: GeometryKind, options: &GeometryOptions) -> String {
    let [x, y, z] = options.dimensions;
    match &options.source {
        Some(source) => format!("geo:{}:{}", kind.name(), source),
        None => format!("geo:{}:{:.3}x{:.3}x{:.3}:{}", kind.name(), x, y, z, options.segments),
    }
}
