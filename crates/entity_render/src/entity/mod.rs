//! Entity contract
//!
//! Records, visual handles, the registry and the generic renderer that every
//! entity family is driven through.

pub mod contract;
pub mod family;
pub mod handle;
pub mod queue;
pub mod record;
pub mod registry;
pub mod renderer;
pub mod stats;

pub use contract::EntityContract;
pub use family::{FamilyRenderer, RenderContext, RenderServices};
pub use handle::{DetailMask, HandleBuilder, VisualHandle, VisualPart};
pub use queue::{PendingOp, PendingQueue};
pub use record::{EntityId, EntityRecord, EntityUpdate, Family, FamilyPayload, StyleOverrides};
pub use registry::{EntityRegistry, RegistryEntry};
pub use renderer::EntityRenderer;
pub use stats::{EntityResult, FamilyStats, RenderOptions, RenderOutcome, RendererStats};
