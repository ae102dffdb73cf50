//! Relationship family: an arc from a source anchor to a target anchor
//!
//! The arc is sampled once per update and cached in the entity state; the
//! arrow, the flow marker and the label are all placed on those samples.

use std::f64::consts::PI;

use async_trait::async_trait;

use super::label_desc;
use crate::animation::AnimationState;
use crate::entity::{
    DetailMask, EntityRecord, EntityRegistry, Family, FamilyPayload, FamilyRenderer, FamilyStats, HandleBuilder,
    RenderContext, VisualHandle,
};
use crate::error::{RenderError, RenderResult};
use crate::foundation::math::{lerp, polyline_point, Vec3};
use crate::host::{PrimitiveDesc, PrimitiveKind, PrimitivePatch};
use crate::selection::Highlight;

/// Segments per arc
pub const ARC_SEGMENTS: usize = 32;

const ARC_MATERIAL: &str = "glow";

/// Sample an arc between two world points
///
/// Points follow the straight chord projected out to the interpolated radius,
/// raised by `height * sin(pi * t)` along the local radial direction.
pub fn arc_points(source: &Vec3, target: &Vec3, height: f64, segments: usize) -> Vec<Vec3> {
    let segments = segments.max(1);
    let (r0, r1) = (source.norm(), target.norm());
    (0..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            let chord = lerp(source, target, t);
            let lift = height * (PI * t).sin();
            match chord.try_normalize(f64::EPSILON) {
                Some(radial) => radial * (r0 + (r1 - r0) * t + lift),
                None => chord,
            }
        })
        .collect()
}

/// Per-relationship state
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipState {
    /// Sampled arc, source first
    pub arc: Vec<Vec3>,
    /// Flow marker progress per second; zero when there is no marker
    pub flow_speed: f64,
}

impl RelationshipState {
    fn from_record(record: &EntityRecord) -> RenderResult<Self> {
        let (arc_height, flow_speed) = match &record.payload {
            Some(FamilyPayload::Relationship {
                arc_height, flow_speed, ..
            }) => (*arc_height, *flow_speed),
            _ => return Err(RenderError::invalid(record.id.as_str(), "missing relationship payload")),
        };
        let (source, target) = match record.anchors.as_slice() {
            [source, target, ..] => (source.world(), target.world()),
            _ => return Err(RenderError::invalid(record.id.as_str(), "relationship needs two anchors")),
        };
        Ok(Self {
            arc: arc_points(&source, &target, arc_height, ARC_SEGMENTS),
            flow_speed,
        })
    }

    /// Whether a flow marker travels along the arc
    pub fn is_flowing(&self) -> bool {
        self.flow_speed > 0.0
    }

    /// Middle sample of the arc
    pub fn midpoint(&self) -> Vec3 {
        self.arc[self.arc.len() / 2]
    }
}

/// Renders relationships
#[derive(Debug, Default)]
pub struct RelationshipFamily;

impl RelationshipFamily {
    /// Create the family
    pub const fn new() -> Self {
        Self
    }
}

fn parts(ctx: &RenderContext<'_>, record: &EntityRecord, state: &RelationshipState) -> Vec<(DetailMask, Option<PrimitiveDesc>)> {
    let (show_arrow, label) = match &record.payload {
        Some(FamilyPayload::Relationship { show_arrow, label, .. }) => (*show_arrow, label.as_deref()),
        _ => (false, None),
    };
    let primary = PrimitiveDesc::new(PrimitiveKind::Polyline, ctx.material(&record.style, ARC_MATERIAL))
        .with_positions(state.arc.clone());
    let arrow = match state.arc.as_slice() {
        [.., before, tip] if show_arrow => Some(
            PrimitiveDesc::new(PrimitiveKind::Arrow, ctx.material(&record.style, "basic"))
                .with_positions(vec![*before, *tip]),
        ),
        _ => None,
    };
    let flow = state
        .is_flowing()
        .then(|| PrimitiveDesc::new(PrimitiveKind::Marker, ctx.catalog.material_or_basic("pulse")).at(state.arc[0]));
    vec![
        (DetailMask::PRIMARY, Some(primary)),
        (DetailMask::ARROW, arrow),
        (DetailMask::FLOW, flow),
        (DetailMask::LABEL, label.map(|text| label_desc(ctx, text, state.midpoint()))),
    ]
}

#[async_trait(?Send)]
impl FamilyRenderer for RelationshipFamily {
    type State = RelationshipState;

    const FAMILY: Family = Family::Relationship;

    async fn build(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
    ) -> RenderResult<(VisualHandle, RelationshipState)> {
        let state = RelationshipState::from_record(record)?;
        let mut builder = HandleBuilder::new(ctx.host);
        for (role, desc) in parts(ctx, record, &state) {
            builder.create_optional(role, desc)?;
        }
        Ok((builder.finish(), state))
    }

    fn refresh(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &mut VisualHandle,
        state: &mut RelationshipState,
    ) -> RenderResult<()> {
        let next = RelationshipState::from_record(record)?;
        for (role, desc) in parts(ctx, record, &next) {
            handle.sync_part(ctx.host, role, desc)?;
        }
        *state = next;
        Ok(())
    }

    fn animation(&self, _record: &EntityRecord, state: &RelationshipState) -> Option<AnimationState> {
        if !state.is_flowing() {
            return None;
        }
        let (source, target) = (state.arc.first()?, state.arc.last()?);
        Some(AnimationState::new(*source, *target, state.flow_speed))
    }

    fn animate(
        &mut self,
        ctx: &RenderContext<'_>,
        handle: &VisualHandle,
        state: &mut RelationshipState,
        animation: &AnimationState,
    ) -> RenderResult<()> {
        if let Some(position) = polyline_point(&state.arc, animation.progress) {
            handle.patch(ctx.host, DetailMask::FLOW, PrimitivePatch::new().positions(vec![position]))?;
        }
        Ok(())
    }

    fn apply_highlight(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &VisualHandle,
        _state: &RelationshipState,
        highlight: Highlight,
    ) -> RenderResult<()> {
        let arc = ctx.material(&record.style, ARC_MATERIAL);
        handle.patch(
            ctx.host,
            DetailMask::PRIMARY,
            PrimitivePatch::new().material(ctx.highlighted(&arc, highlight)),
        )?;
        let arrow = ctx.material(&record.style, "basic");
        handle.patch(
            ctx.host,
            DetailMask::ARROW,
            PrimitivePatch::new().material(ctx.highlighted(&arrow, highlight)),
        )?;
        Ok(())
    }

    fn stats(&self, registry: &EntityRegistry<RelationshipState>) -> FamilyStats {
        FamilyStats::Relationship {
            flowing: registry.iter().filter(|(_, entry)| entry.state.is_flowing()).count(),
        }
    }
}
