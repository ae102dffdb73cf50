//! Point family: a billboard at the entity's anchor with an optional label

use async_trait::async_trait;

use super::label_desc;
use crate::entity::{
    DetailMask, EntityRecord, Family, FamilyPayload, FamilyRenderer, HandleBuilder, RenderContext, VisualHandle,
};
use crate::error::{RenderError, RenderResult};
use crate::host::{PrimitiveDesc, PrimitiveKind, PrimitivePatch, ResourceInfo};
use crate::selection::Highlight;

const POINT_MATERIAL: &str = "emissive";
const POINT_GEOMETRY: &str = "sphere";

/// Per-point state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointState {
    /// Icon resource the billboard was built with
    pub icon: Option<ResourceInfo>,
}

/// Renders point entities as billboards
#[derive(Debug, Default)]
pub struct PointFamily {
    icons_loaded: usize,
}

impl PointFamily {
    /// Create the family
    pub fn new() -> Self {
        Self::default()
    }

    /// Icons loaded since creation
    pub const fn icons_loaded(&self) -> usize {
        self.icons_loaded
    }
}

fn billboard(ctx: &RenderContext<'_>, record: &EntityRecord) -> PrimitiveDesc {
    let pixel_size = match &record.payload {
        Some(FamilyPayload::Point { pixel_size, .. }) => *pixel_size,
        _ => 1.0,
    };
    PrimitiveDesc::new(PrimitiveKind::Billboard, ctx.material(&record.style, POINT_MATERIAL))
        .at(record.focus())
        .with_geometry(ctx.geometry(&record.style, POINT_GEOMETRY))
        .with_scale(pixel_size)
}

fn point_label(ctx: &RenderContext<'_>, record: &EntityRecord) -> Option<PrimitiveDesc> {
    let text = record.payload.as_ref().and_then(FamilyPayload::label)?;
    Some(label_desc(ctx, text, record.focus()))
}

fn icon_uri(record: &EntityRecord) -> Option<&str> {
    match &record.payload {
        Some(FamilyPayload::Point { icon, .. }) => icon.as_deref(),
        _ => None,
    }
}

#[async_trait(?Send)]
impl FamilyRenderer for PointFamily {
    type State = PointState;

    const FAMILY: Family = Family::Point;

    async fn build(&mut self, ctx: &RenderContext<'_>, record: &EntityRecord) -> RenderResult<(VisualHandle, PointState)> {
        let icon = match icon_uri(record) {
            Some(uri) => {
                let info = ctx.host.load_resource(uri).await.map_err(|e| RenderError::ResourceLoad {
                    id: record.id.clone(),
                    uri: uri.to_string(),
                    reason: e.to_string(),
                })?;
                self.icons_loaded += 1;
                Some(info)
            }
            None => None,
        };

        let mut builder = HandleBuilder::new(ctx.host);
        builder.create(DetailMask::PRIMARY, billboard(ctx, record))?;
        builder.create_optional(DetailMask::LABEL, point_label(ctx, record))?;
        Ok((builder.finish(), PointState { icon }))
    }

    fn refresh(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &mut VisualHandle,
        state: &mut PointState,
    ) -> RenderResult<()> {
        let loaded = state.icon.as_ref().map(|info| info.uri.as_str());
        if icon_uri(record) != loaded {
            log::debug!("Icon of point {} changed; keeping the loaded icon until it is re-added", record.id);
        }
        handle.sync_part(ctx.host, DetailMask::PRIMARY, Some(billboard(ctx, record)))?;
        handle.sync_part(ctx.host, DetailMask::LABEL, point_label(ctx, record))?;
        Ok(())
    }

    fn apply_highlight(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &VisualHandle,
        _state: &PointState,
        highlight: Highlight,
    ) -> RenderResult<()> {
        let base = ctx.material(&record.style, POINT_MATERIAL);
        handle.patch(
            ctx.host,
            DetailMask::PRIMARY,
            PrimitivePatch::new().material(ctx.highlighted(&base, highlight)),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::core::config::RendererConfig;
    use crate::entity::{EntityRenderer, RenderServices};
    use crate::foundation::math::Anchor;
    use crate::host::HeadlessHost;

    fn renderer() -> (Rc<HeadlessHost>, EntityRenderer<PointFamily>) {
        let host = Rc::new(HeadlessHost::new());
        host.set_camera_position(Anchor::new(0.0, 0.0, 1_000.0).world());
        let services = RenderServices::new(host.clone(), 64);
        let renderer = EntityRenderer::new(PointFamily::new(), services, &RendererConfig::new()).unwrap();
        (host, renderer)
    }

    fn with_icon(id: &str, icon: &str) -> EntityRecord {
        EntityRecord::point(id, Anchor::surface(0.0, 0.0)).with_payload(FamilyPayload::Point {
            label: Some(id.to_uppercase()),
            icon: Some(icon.to_string()),
            pixel_size: 16.0,
        })
    }

    #[tokio::test]
    async fn test_point_with_label_owns_two_primitives() {
        let (host, mut renderer) = renderer();
        renderer
            .add_entity(EntityRecord::point("p", Anchor::surface(0.0, 0.0)).with_label("P"))
            .await
            .unwrap();
        let handle = renderer.handle("p").unwrap();
        assert_eq!(handle.len(), 2);
        let label = handle.part(DetailMask::LABEL).unwrap();
        assert_eq!(host.primitive(label).unwrap().text.as_deref(), Some("P"));
        assert!(host.is_visible(label));
    }

    #[tokio::test]
    async fn test_icon_failure_leaves_nothing_behind() {
        let (host, mut renderer) = renderer();
        host.fail_resource("icons/broken.png");
        let err = renderer.add_entity(with_icon("p", "icons/broken.png")).await.unwrap_err();
        assert!(matches!(err, RenderError::ResourceLoad { .. }));
        assert_eq!(renderer.entity_count(), 0);
        assert_eq!(host.primitive_count(), 0);

        renderer.add_entity(with_icon("q", "icons/ok.png")).await.unwrap();
        assert_eq!(renderer.family().icons_loaded(), 1);
        assert_eq!(renderer.family_state("q").unwrap().icon.as_ref().unwrap().uri, "icons/ok.png");
    }
}
