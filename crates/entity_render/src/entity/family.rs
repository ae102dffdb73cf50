//! Family renderer trait and the shared rendering context
//!
//! A [`FamilyRenderer`] knows how one entity family turns a record into
//! primitives. Everything that is common to all families (id uniqueness,
//! batching, culling, LOD, animation and selection) lives in
//! [`super::EntityRenderer`], which drives the family through these hooks.

use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;

use super::handle::{DetailMask, VisualHandle};
use super::record::{EntityRecord, Family, StyleOverrides};
use super::registry::EntityRegistry;
use super::stats::FamilyStats;
use crate::animation::AnimationState;
use crate::error::RenderResult;
use crate::foundation::math::Color;
use crate::host::RenderHost;
use crate::library::{
    Catalog, GeometryDescriptor, GeometryKind, GeometryOptions, MaterialDescriptor, StyleCache,
};
use crate::lod::default_detail_mask;
use crate::selection::Highlight;

/// Shared services handed to every renderer
#[derive(Clone)]
pub struct RenderServices {
    /// Rendering host
    pub host: Rc<dyn RenderHost>,
    /// Style descriptor cache
    pub styles: Arc<StyleCache>,
    /// Named presets
    pub catalog: Arc<Catalog>,
}

impl RenderServices {
    /// Services with a fresh cache and the standard catalog
    pub fn new(host: Rc<dyn RenderHost>, cache_capacity: usize) -> Self {
        Self {
            host,
            styles: Arc::new(StyleCache::new(cache_capacity)),
            catalog: Arc::new(Catalog::standard()),
        }
    }

    /// Borrowed view used by family hooks
    pub fn context(&self) -> RenderContext<'_> {
        RenderContext {
            host: self.host.as_ref(),
            styles: &self.styles,
            catalog: &self.catalog,
        }
    }
}

/// Borrowed services passed to family hooks
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// Rendering host
    pub host: &'a dyn RenderHost,
    /// Style descriptor cache
    pub styles: &'a StyleCache,
    /// Named presets
    pub catalog: &'a Catalog,
}

impl RenderContext<'_> {
    /// Material for a record style, starting from a named preset
    ///
    /// Without overrides the preset itself is returned; otherwise the
    /// overridden options go through the style cache.
    pub fn material(&self, style: &StyleOverrides, preset: &str) -> Arc<MaterialDescriptor> {
        let base = self
            .catalog
            .material_or_basic(style.material.as_deref().unwrap_or(preset));
        if !style.has_overrides() {
            return base;
        }
        let mut options = base.options;
        if let Some(color) = style.color {
            options.color = color;
        }
        if let Some(width) = style.width {
            options.width = width;
        }
        if let Some(opacity) = style.opacity {
            options.color.a = opacity;
        }
        self.styles.material(base.kind, &options)
    }

    /// Material in a given color, starting from a named preset
    pub fn tinted(&self, preset: &str, color: Color) -> Arc<MaterialDescriptor> {
        let base = self.catalog.material_or_basic(preset);
        let mut options = base.options;
        options.color = color;
        self.styles.material(base.kind, &options)
    }

    /// Highlighted variant of a material
    pub fn highlighted(&self, base: &Arc<MaterialDescriptor>, highlight: Highlight) -> Arc<MaterialDescriptor> {
        let mut options = base.options;
        match highlight {
            Highlight::None => return Arc::clone(base),
            Highlight::Selected => {
                options.color = Color::YELLOW.with_alpha(options.color.a);
                options.width *= 2.0;
                options.emissive_intensity = options.emissive_intensity.max(1.0);
            }
            Highlight::Hovered => {
                options.color = options.color.lighten(0.35);
                options.width *= 1.5;
            }
        }
        self.styles.material(base.kind, &options)
    }

    /// Geometry for a record style, starting from a named preset
    pub fn geometry(&self, style: &StyleOverrides, preset: &str) -> Arc<GeometryDescriptor> {
        let name = style.geometry.as_deref().unwrap_or(preset);
        self.catalog.geometry(name).unwrap_or_else(|| {
            log::debug!("Unknown geometry preset '{}', using a sphere", name);
            self.styles.geometry(GeometryKind::Sphere, &GeometryOptions::default())
        })
    }

    /// Geometry of an external mesh
    pub fn mesh(&self, uri: &str) -> Arc<GeometryDescriptor> {
        self.styles.geometry(GeometryKind::Mesh, &GeometryOptions::mesh(uri))
    }
}

/// Per-family rendering hooks
#[async_trait(?Send)]
pub trait FamilyRenderer {
    /// Family-specific per-entity state
    type State;

    /// Family handled by this renderer
    const FAMILY: Family;

    /// Reject records missing required fields
    fn validate(&self, record: &EntityRecord) -> RenderResult<()> {
        record.validate_for(Self::FAMILY)
    }

    /// Create the entity's primitives, all hidden
    async fn build(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
    ) -> RenderResult<(VisualHandle, Self::State)>;

    /// Bring existing primitives in line with a changed record
    fn refresh(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &mut VisualHandle,
        state: &mut Self::State,
    ) -> RenderResult<()>;

    /// Release family resources of a removed entity
    fn release(&mut self, _ctx: &RenderContext<'_>, _record: &EntityRecord, _state: Self::State) {}

    /// Roles drawn at a LOD level
    fn detail_mask(&self, level: usize, highest: usize) -> DetailMask {
        default_detail_mask(level, highest)
    }

    /// Scheduler-driven animation of an entity, if it has one
    fn animation(&self, _record: &EntityRecord, _state: &Self::State) -> Option<AnimationState> {
        None
    }

    /// Apply an advanced animation state
    fn animate(
        &mut self,
        _ctx: &RenderContext<'_>,
        _handle: &VisualHandle,
        _state: &mut Self::State,
        _animation: &AnimationState,
    ) -> RenderResult<()> {
        Ok(())
    }

    /// Per-tick work over all entities (particle simulation)
    fn tick(
        &mut self,
        _ctx: &RenderContext<'_>,
        _registry: &mut EntityRegistry<Self::State>,
        _now_ms: f64,
    ) -> RenderResult<()> {
        Ok(())
    }

    /// Simulation clock moved
    fn on_clock(
        &mut self,
        _ctx: &RenderContext<'_>,
        _registry: &mut EntityRegistry<Self::State>,
        _time: f64,
    ) -> RenderResult<()> {
        Ok(())
    }

    /// Restyle an entity for a highlight state
    fn apply_highlight(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &VisualHandle,
        state: &Self::State,
        highlight: Highlight,
    ) -> RenderResult<()>;

    /// Family counters
    fn stats(&self, _registry: &EntityRegistry<Self::State>) -> FamilyStats {
        FamilyStats::None
    }

    /// Entities animated outside the scheduler
    fn animating(&self, _registry: &EntityRegistry<Self::State>) -> usize {
        0
    }
}
