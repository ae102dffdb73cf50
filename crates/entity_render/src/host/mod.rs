//! Rendering host seam
//!
//! The host owns the scene graph, camera and GPU primitives. Renderers only
//! talk to it through [`RenderHost`]: create/patch/remove primitives, read the
//! camera, run pick queries, request frames and load remote resources.
//!
//! Every method takes `&self`; implementations are expected to use interior
//! mutability because the host is shared by all renderers on one thread.

pub mod clock;
pub mod headless;

pub use clock::SimulationClock;
pub use headless::HeadlessHost;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::foundation::math::{Vec2, Vec3};
use crate::library::{GeometryDescriptor, MaterialDescriptor};

/// Identifier of a primitive registered with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u64);

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prim#{}", self.0)
    }
}

/// Kind of host-native renderable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// Screen-aligned icon
    Billboard,
    /// Text label
    Label,
    /// Line through `positions`
    Polyline,
    /// Direction arrow from `positions[0]` to `positions[1]`
    Arrow,
    /// Small marker at each of `positions`
    Marker,
    /// Loaded 3D model
    Model {
        /// Resource the model was loaded from
        resource: String,
    },
    /// Point sprites packed in `data`, relative to `positions[0]`
    PointCloud,
    /// Instanced geometry, per-instance data packed in `data`
    Instanced,
}

/// Full description of a primitive at creation time
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveDesc {
    /// Primitive kind
    pub kind: PrimitiveKind,
    /// World positions (meaning depends on kind)
    pub positions: Vec<Vec3>,
    /// Appearance
    pub material: Arc<MaterialDescriptor>,
    /// Shape, when the kind needs one
    pub geometry: Option<Arc<GeometryDescriptor>>,
    /// Label text
    pub text: Option<String>,
    /// Uniform scale
    pub scale: f64,
    /// Packed per-vertex/per-instance payload
    pub data: Vec<u8>,
    /// Number of packed elements in `data`
    pub element_count: usize,
    /// Whether the host should draw it
    pub visible: bool,
}

impl PrimitiveDesc {
    /// Create a hidden primitive description
    pub fn new(kind: PrimitiveKind, material: Arc<MaterialDescriptor>) -> Self {
        Self {
            kind,
            positions: Vec::new(),
            material,
            geometry: None,
            text: None,
            scale: 1.0,
            data: Vec::new(),
            element_count: 0,
            visible: false,
        }
    }

    /// Set positions
    pub fn with_positions(mut self, positions: Vec<Vec3>) -> Self {
        self.positions = positions;
        self
    }

    /// Set a single position
    pub fn at(self, position: Vec3) -> Self {
        self.with_positions(vec![position])
    }

    /// Set geometry
    pub fn with_geometry(mut self, geometry: Arc<GeometryDescriptor>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Set label text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set scale
    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set packed data
    pub fn with_data(mut self, data: Vec<u8>, element_count: usize) -> Self {
        self.data = data;
        self.element_count = element_count;
        self
    }

    /// Apply a patch in place
    pub fn apply(&mut self, patch: PrimitivePatch) {
        if let Some(positions) = patch.positions {
            self.positions = positions;
        }
        if let Some(material) = patch.material {
            self.material = material;
        }
        if let Some(text) = patch.text {
            self.text = Some(text);
        }
        if let Some(scale) = patch.scale {
            self.scale = scale;
        }
        if let Some((data, count)) = patch.data {
            self.data = data;
            self.element_count = count;
        }
    }
}

/// In-place modification of an existing primitive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitivePatch {
    /// New positions
    pub positions: Option<Vec<Vec3>>,
    /// New material
    pub material: Option<Arc<MaterialDescriptor>>,
    /// New label text
    pub text: Option<String>,
    /// New scale
    pub scale: Option<f64>,
    /// New packed payload and element count
    pub data: Option<(Vec<u8>, usize)>,
}

impl PrimitivePatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that rewrites every mutable field from a full description
    pub fn replace_with(desc: PrimitiveDesc) -> Self {
        Self {
            positions: Some(desc.positions),
            material: Some(desc.material),
            text: desc.text,
            scale: Some(desc.scale),
            data: Some((desc.data, desc.element_count)),
        }
    }

    /// Replace positions
    pub fn positions(mut self, positions: Vec<Vec3>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Replace the material
    pub fn material(mut self, material: Arc<MaterialDescriptor>) -> Self {
        self.material = Some(material);
        self
    }

    /// Replace label text
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Replace scale
    pub const fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Replace packed data
    pub fn data(mut self, data: Vec<u8>, element_count: usize) -> Self {
        self.data = Some((data, element_count));
        self
    }
}

/// Camera snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Camera world position
    pub position: Vec3,
}

impl CameraState {
    /// Camera at a world position
    pub const fn at(position: Vec3) -> Self {
        Self { position }
    }

    /// Distance from the camera to a world point
    pub fn distance_to(&self, point: &Vec3) -> f64 {
        (point - self.position).norm()
    }
}

/// Description of a loaded remote resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Resource locator
    pub uri: String,
    /// Size reported by the host
    pub size_bytes: usize,
}

/// Errors reported by the rendering host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Primitive id not known to the host
    #[error("unknown primitive {0}")]
    UnknownPrimitive(PrimitiveId),

    /// The scene was disposed
    #[error("scene has been disposed")]
    Disposed,

    /// Resource could not be loaded
    #[error("resource '{uri}' unavailable: {reason}")]
    ResourceUnavailable {
        /// Resource locator
        uri: String,
        /// Reason
        reason: String,
    },

    /// Primitive description rejected
    #[error("invalid primitive: {0}")]
    InvalidPrimitive(String),
}

/// Interface consumed from the 3D rendering host
#[async_trait(?Send)]
pub trait RenderHost {
    /// Register a primitive
    fn create_primitive(&self, desc: PrimitiveDesc) -> Result<PrimitiveId, HostError>;

    /// Modify a primitive in place
    fn update_primitive(&self, id: PrimitiveId, patch: PrimitivePatch) -> Result<(), HostError>;

    /// Toggle drawing of a primitive
    fn set_visible(&self, id: PrimitiveId, visible: bool) -> Result<(), HostError>;

    /// Unregister a primitive
    fn remove_primitive(&self, id: PrimitiveId) -> Result<(), HostError>;

    /// Current camera
    fn camera(&self) -> CameraState;

    /// Primitive under a screen position
    fn pick(&self, screen: Vec2) -> Result<Option<PrimitiveId>, HostError>;

    /// Ask for another animation frame callback
    fn request_frame(&self);

    /// Simulation clock time in seconds
    fn current_time(&self) -> f64;

    /// Load a remote or large resource
    async fn load_resource(&self, uri: &str) -> Result<ResourceInfo, HostError>;
}
