//! Model family: loaded 3D models placed at an anchor
//!
//! Model resources are loaded through the host once per uri and kept for the
//! life of the family, so adding many entities of the same model suspends
//! only for the first one.

use std::collections::HashMap;

use async_trait::async_trait;

use super::label_desc;
use crate::entity::{
    DetailMask, EntityRecord, EntityRegistry, Family, FamilyPayload, FamilyRenderer, FamilyStats, HandleBuilder,
    RenderContext, VisualHandle,
};
use crate::error::{RenderError, RenderResult};
use crate::host::{HostError, PrimitiveDesc, PrimitiveKind, PrimitivePatch, RenderHost, ResourceInfo};
use crate::selection::Highlight;

const MODEL_MATERIAL: &str = "basic";

/// Per-model state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelState {
    /// Resource the primitive was built from
    pub uri: String,
}

/// Renders model entities
#[derive(Debug, Default)]
pub struct ModelFamily {
    resources: HashMap<String, ResourceInfo>,
}

impl ModelFamily {
    /// Create the family with an empty resource cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached resource of a uri
    pub fn resource(&self, uri: &str) -> Option<&ResourceInfo> {
        self.resources.get(uri)
    }

    /// Distinct resources loaded
    pub fn loaded_count(&self) -> usize {
        self.resources.len()
    }

    /// Load a resource ahead of the entities that use it
    pub async fn preload(&mut self, host: &dyn RenderHost, uri: &str) -> Result<ResourceInfo, HostError> {
        if let Some(info) = self.resources.get(uri) {
            return Ok(info.clone());
        }
        let info = host.load_resource(uri).await?;
        log::debug!("Loaded model resource {} ({} bytes)", uri, info.size_bytes);
        self.resources.insert(uri.to_string(), info.clone());
        Ok(info)
    }
}

fn model_fields(record: &EntityRecord) -> RenderResult<(&str, f64)> {
    match &record.payload {
        Some(FamilyPayload::Model { uri, scale, .. }) => Ok((uri.as_str(), *scale)),
        _ => Err(RenderError::invalid(record.id.as_str(), "missing model payload")),
    }
}

fn model_desc(ctx: &RenderContext<'_>, record: &EntityRecord, uri: &str, scale: f64) -> PrimitiveDesc {
    PrimitiveDesc::new(
        PrimitiveKind::Model {
            resource: uri.to_string(),
        },
        ctx.material(&record.style, MODEL_MATERIAL),
    )
    .at(record.focus())
    .with_geometry(ctx.mesh(uri))
    .with_scale(scale)
}

fn model_label(ctx: &RenderContext<'_>, record: &EntityRecord) -> Option<PrimitiveDesc> {
    let text = record.payload.as_ref().and_then(FamilyPayload::label)?;
    Some(label_desc(ctx, text, record.focus()))
}

#[async_trait(?Send)]
impl FamilyRenderer for ModelFamily {
    type State = ModelState;

    const FAMILY: Family = Family::Model;

    async fn build(&mut self, ctx: &RenderContext<'_>, record: &EntityRecord) -> RenderResult<(VisualHandle, ModelState)> {
        let (uri, scale) = model_fields(record)?;
        self.preload(ctx.host, uri).await.map_err(|e| RenderError::ResourceLoad {
            id: record.id.clone(),
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = HandleBuilder::new(ctx.host);
        builder.create(DetailMask::PRIMARY, model_desc(ctx, record, uri, scale))?;
        builder.create_optional(DetailMask::LABEL, model_label(ctx, record))?;
        Ok((
            builder.finish(),
            ModelState {
                uri: uri.to_string(),
            },
        ))
    }

    /// A changed uri swaps the model primitive; the new resource must already
    /// be cached because updates do not suspend
    fn refresh(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &mut VisualHandle,
        state: &mut ModelState,
    ) -> RenderResult<()> {
        let (uri, scale) = model_fields(record)?;
        if uri != state.uri {
            if !self.resources.contains_key(uri) {
                return Err(RenderError::ResourceLoad {
                    id: record.id.clone(),
                    uri: uri.to_string(),
                    reason: "resource is not loaded; preload it or re-add the entity".to_string(),
                });
            }
            handle.detach(ctx.host, DetailMask::PRIMARY)?;
            handle.attach(ctx.host, DetailMask::PRIMARY, model_desc(ctx, record, uri, scale))?;
            state.uri = uri.to_string();
        } else {
            handle.sync_part(ctx.host, DetailMask::PRIMARY, Some(model_desc(ctx, record, uri, scale)))?;
        }
        handle.sync_part(ctx.host, DetailMask::LABEL, model_label(ctx, record))?;
        Ok(())
    }

    fn apply_highlight(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &VisualHandle,
        _state: &ModelState,
        highlight: Highlight,
    ) -> RenderResult<()> {
        let base = ctx.material(&record.style, MODEL_MATERIAL);
        handle.patch(
            ctx.host,
            DetailMask::PRIMARY,
            PrimitivePatch::new().material(ctx.highlighted(&base, highlight)),
        )?;
        Ok(())
    }

    fn stats(&self, _registry: &EntityRegistry<ModelState>) -> FamilyStats {
        FamilyStats::Model {
            loaded: self.resources.len(),
            instanced: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::core::config::RendererConfig;
    use crate::entity::{EntityRenderer, EntityUpdate, RenderServices};
    use crate::foundation::math::Anchor;
    use crate::host::HeadlessHost;

    fn renderer() -> (Rc<HeadlessHost>, EntityRenderer<ModelFamily>) {
        let host = Rc::new(HeadlessHost::new());
        host.set_camera_position(Anchor::new(1.0, 1.0, 500.0).world());
        let services = RenderServices::new(host.clone(), 64);
        (host, EntityRenderer::new(ModelFamily::new(), services, &RendererConfig::new()).unwrap())
    }

    #[tokio::test]
    async fn test_resource_is_loaded_once_per_uri() {
        let (host, mut renderer) = renderer();
        for id in ["a", "b", "c"] {
            renderer
                .add_entity(EntityRecord::model(id, Anchor::surface(1.0, 1.0), "models/truck.glb"))
                .await
                .unwrap();
        }
        assert_eq!(host.resource_loads(), 1);
        assert_eq!(renderer.stats().family, FamilyStats::Model { loaded: 1, instanced: 0 });
    }

    #[tokio::test]
    async fn test_failed_load_registers_nothing() {
        let (host, mut renderer) = renderer();
        host.fail_resource("models/missing.glb");
        let result = renderer
            .add_entity(EntityRecord::model("m", Anchor::surface(1.0, 1.0), "models/missing.glb"))
            .await;
        assert!(matches!(result, Err(RenderError::ResourceLoad { .. })));
        assert!(renderer.get_entity("m").is_none());
        assert_eq!(host.primitive_count(), 0);
    }

    #[tokio::test]
    async fn test_uri_change_needs_a_loaded_resource() {
        let (host, mut renderer) = renderer();
        let record = EntityRecord::model("m", Anchor::surface(1.0, 1.0), "models/truck.glb");
        renderer.add_entity(record).await.unwrap();

        let swap = EntityUpdate::new().payload(FamilyPayload::Model {
            uri: "models/tank.glb".to_string(),
            scale: 2.0,
            label: None,
        });
        assert!(renderer.update_entity("m", swap.clone()).is_err());

        let ctx_host: &dyn RenderHost = host.as_ref();
        renderer.family_mut().preload(ctx_host, "models/tank.glb").await.unwrap();
        assert!(renderer.update_entity("m", swap).unwrap());
        let primary = renderer.handle("m").unwrap().part(DetailMask::PRIMARY).unwrap();
        assert_eq!(
            host.primitive(primary).unwrap().kind,
            PrimitiveKind::Model {
                resource: "models/tank.glb".to_string()
            }
        );
        assert_eq!(renderer.family_state("m").unwrap().uri, "models/tank.glb");
    }
}
