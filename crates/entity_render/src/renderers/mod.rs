//! Family renderers
//!
//! One [`FamilyRenderer`](crate::entity::FamilyRenderer) per entity family.
//! Each is driven through [`EntityRenderer`](crate::entity::EntityRenderer),
//! which owns the shared lifecycle.

pub mod model;
pub mod particle;
pub mod point;
pub mod relationship;
pub mod trajectory;

pub use model::{ModelFamily, ModelState};
pub use particle::{EmitterState, ParticleFamily, ParticlePreset};
pub use point::{PointFamily, PointState};
pub use relationship::{RelationshipFamily, RelationshipState};
pub use trajectory::{TrajectoryFamily, TrajectoryState};

use crate::entity::{EntityRenderer, RenderContext};
use crate::foundation::math::{Color, Vec3};
use crate::host::{PrimitiveDesc, PrimitiveKind};

/// Point renderer
pub type PointRenderer = EntityRenderer<PointFamily>;
/// Trajectory renderer
pub type TrajectoryRenderer = EntityRenderer<TrajectoryFamily>;
/// Relationship renderer
pub type RelationshipRenderer = EntityRenderer<RelationshipFamily>;
/// Model renderer
pub type ModelRenderer = EntityRenderer<ModelFamily>;
/// Particle renderer
pub type ParticleRenderer = EntityRenderer<ParticleFamily>;

/// Text label at a world position
pub(crate) fn label_desc(ctx: &RenderContext<'_>, text: &str, position: Vec3) -> PrimitiveDesc {
    PrimitiveDesc::new(PrimitiveKind::Label, ctx.tinted("basic", Color::WHITE))
        .at(position)
        .with_text(text)
}
