//! Renderer factory
//!
//! The factory owns the family registrations, picks a [`Strategy`] for each
//! submission and lazily builds renderers. Renderers are cached per family,
//! strategy and configuration signature, so repeated submissions of the same
//! shape reuse one renderer and its entities. Every renderer shares the
//! factory's [`RenderServices`], which means one style cache and one preset
//! catalog for the whole process.
//!
//! A family may have renderers under several strategies at once. Each id
//! lives in exactly one of them: a submission first clears the family's
//! other renderers, or with incremental options moves its ids out of them.

pub mod instanced;
pub mod stats;
pub mod strategy;

pub use instanced::{InstanceData, InstancedRenderer};
pub use stats::FactoryStats;
pub use strategy::{select_strategy, shared_geometry, Capabilities, Strategy};

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::core::RendererConfig;
use crate::entity::{
    EntityContract, EntityRecord, EntityResult, Family, RenderOptions, RenderOutcome, RenderServices, RendererStats,
};
use crate::error::{RenderError, RenderResult};
use crate::foundation::time::Stopwatch;
use crate::host::RenderHost;
use crate::library::Catalog;
use crate::renderers::{
    ModelFamily, ModelRenderer, ParticleFamily, ParticleRenderer, PointFamily, PointRenderer, RelationshipFamily,
    RelationshipRenderer, TrajectoryFamily, TrajectoryRenderer,
};

type RendererKey = (Family, Strategy, String);

/// Capabilities of the built-in family implementations
pub const fn default_capabilities(family: Family) -> Capabilities {
    Capabilities {
        instancing: matches!(family, Family::Point | Family::Model),
        batching: !matches!(family, Family::Particle),
    }
}

/// Registry and cache of renderers
pub struct RendererFactory {
    services: RenderServices,
    config: RendererConfig,
    registrations: BTreeMap<Family, Capabilities>,
    renderers: HashMap<RendererKey, Box<dyn EntityContract>>,
    stats: FactoryStats,
}

impl RendererFactory {
    /// Create a factory with every built-in family registered
    pub fn new(host: Rc<dyn RenderHost>, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        let services = RenderServices::new(host, config.factory.style_cache_capacity);
        let registrations = Family::ALL
            .into_iter()
            .map(|family| (family, default_capabilities(family)))
            .collect();
        log::info!("Creating renderer factory ({} families)", Family::ALL.len());
        Ok(Self {
            services,
            config,
            registrations,
            renderers: HashMap::new(),
            stats: FactoryStats::default(),
        })
    }

    /// Register a family, or change the capabilities of a registered one
    pub fn register(&mut self, family: Family, capabilities: Capabilities) {
        log::debug!("Registering {} ({:?})", family, capabilities);
        self.registrations.insert(family, capabilities);
    }

    /// Unregister a family, destroying its cached renderers
    pub fn unregister(&mut self, family: Family) -> RenderResult<bool> {
        if self.registrations.remove(&family).is_none() {
            return Ok(false);
        }
        let keys: Vec<RendererKey> = self.renderers.keys().filter(|key| key.0 == family).cloned().collect();
        let mut first_error = None;
        for key in keys {
            if let Some(mut renderer) = self.renderers.remove(&key) {
                if let Err(e) = renderer.destroy() {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(true), Err)
    }

    /// Whether a family is registered
    pub fn is_registered(&self, family: Family) -> bool {
        self.registrations.contains_key(&family)
    }

    /// Capabilities of a registered family
    pub fn capabilities(&self, family: Family) -> RenderResult<Capabilities> {
        self.registrations
            .get(&family)
            .copied()
            .ok_or_else(|| RenderError::UnsupportedFamily(family.name().to_string()))
    }

    /// Strategy `render` would use for a submission
    pub fn select_strategy(&self, family: Family, records: &[EntityRecord]) -> RenderResult<Strategy> {
        let capabilities = self.capabilities(family)?;
        Ok(select_strategy(records, &self.config.factory, capabilities))
    }

    /// Shared preset catalog
    pub fn catalog(&self) -> &Catalog {
        &self.services.catalog
    }

    /// Shared services handed to every renderer
    pub const fn services(&self) -> &RenderServices {
        &self.services
    }

    /// Factory configuration
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Running statistics
    pub const fn stats(&self) -> &FactoryStats {
        &self.stats
    }

    fn config_for(&self, strategy: Strategy) -> RendererConfig {
        match strategy {
            Strategy::Batched => self.config.batched(),
            Strategy::Direct | Strategy::Instanced => self.config.clone(),
        }
    }

    fn build(&self, family: Family, strategy: Strategy, config: &RendererConfig) -> RenderResult<Box<dyn EntityContract>> {
        let services = self.services.clone();
        let renderer: Box<dyn EntityContract> = match (strategy, family) {
            (Strategy::Instanced, _) => Box::new(InstancedRenderer::new(family, services, config)?),
            (_, Family::Point) => Box::new(PointRenderer::new(PointFamily::new(), services, config)?),
            (_, Family::Trajectory) => Box::new(TrajectoryRenderer::new(
                TrajectoryFamily::new(config.trajectory.clone()),
                services,
                config,
            )?),
            (_, Family::Relationship) => {
                Box::new(RelationshipRenderer::new(RelationshipFamily::new(), services, config)?)
            }
            (_, Family::Model) => Box::new(ModelRenderer::new(ModelFamily::new(), services, config)?),
            (_, Family::Particle) => Box::new(ParticleRenderer::new(
                ParticleFamily::new(config.particle.clone()),
                services,
                config,
            )?),
        };
        Ok(renderer)
    }

    fn key_for(&self, family: Family, strategy: Strategy) -> RenderResult<(RendererKey, RendererConfig)> {
        let config = self.config_for(strategy);
        Ok(((family, strategy, config.signature()?), config))
    }

    /// Cached renderer for a family and strategy, built on first use
    pub fn renderer(&mut self, family: Family, strategy: Strategy) -> RenderResult<&mut dyn EntityContract> {
        self.capabilities(family)?;
        let (key, config) = self.key_for(family, strategy)?;
        if !self.renderers.contains_key(&key) {
            let renderer = self.build(family, strategy, &config)?;
            self.renderers.insert(key.clone(), renderer);
        }
        self.renderers
            .get_mut(&key)
            .map(|renderer| renderer.as_mut() as &mut dyn EntityContract)
            .ok_or_else(|| RenderError::UnsupportedFamily(family.name().to_string()))
    }

    /// Cached renderer, if one was built
    pub fn cached(&self, family: Family, strategy: Strategy) -> Option<&dyn EntityContract> {
        self.renderers
            .iter()
            .find(|((f, s, _), _)| *f == family && *s == strategy)
            .map(|(_, renderer)| renderer.as_ref())
    }

    /// Number of cached renderers
    pub fn renderer_count(&self) -> usize {
        self.renderers.len()
    }

    /// Render a submission through the selected strategy
    ///
    /// Statistics are recorded whether or not the renderer succeeds; its
    /// error is returned afterwards.
    pub async fn render(
        &mut self,
        family: Family,
        records: Vec<EntityRecord>,
        options: RenderOptions,
    ) -> RenderResult<RenderOutcome> {
        let strategy = self.select_strategy(family, &records)?;
        let count = records.len();
        log::debug!("Rendering {} {} entities with the {} strategy", count, family, strategy);

        let watch = Stopwatch::start_new();
        let result = self.dispatch(family, strategy, records, options).await;
        self.stats.record(strategy, count, watch.elapsed_millis(), result.is_err());
        if let Err(e) = &result {
            log::warn!("{} render of {} entities failed: {}", family, count, e);
        }
        result
    }

    async fn dispatch(
        &mut self,
        family: Family,
        strategy: Strategy,
        records: Vec<EntityRecord>,
        options: RenderOptions,
    ) -> RenderResult<RenderOutcome> {
        let (key, _) = self.key_for(family, strategy)?;
        self.release_from_siblings(&key, &records, options.clear_existing)?;
        self.renderer(family, strategy)?.render(records, options).await
    }

    /// Drop entities of `key`'s family held by its other renderers
    ///
    /// With `clear_all` every such entity goes, otherwise only the submitted
    /// ids, so a resubmission never leaves a second copy behind.
    fn release_from_siblings(
        &mut self,
        key: &RendererKey,
        records: &[EntityRecord],
        clear_all: bool,
    ) -> RenderResult<usize> {
        let mut released = 0;
        let mut first_error = None;
        for (sibling, renderer) in &mut self.renderers {
            if sibling.0 != key.0 || sibling == key {
                continue;
            }
            if clear_all {
                match renderer.clear() {
                    Ok(count) => released += count,
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
                continue;
            }
            for record in records {
                if renderer.get_entity(record.id.as_str()).is_none() {
                    continue;
                }
                match renderer.remove_entity(record.id.as_str()) {
                    Ok(removed) => released += usize::from(removed),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        if released > 0 {
            log::debug!("Released {} {} entities from other strategies", released, key.0);
        }
        first_error.map_or(Ok(released), Err)
    }

    /// [`Self::render`] with the family given by name
    pub async fn render_named(
        &mut self,
        family: &str,
        records: Vec<EntityRecord>,
        options: RenderOptions,
    ) -> RenderResult<RenderOutcome> {
        let family: Family = family.parse()?;
        self.render(family, records, options).await
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn EntityContract) -> RenderResult<()>) -> RenderResult<()> {
        let mut first_error = None;
        for renderer in self.renderers.values_mut() {
            if let Err(e) = f(renderer.as_mut()) {
                log::warn!("{} renderer notification failed: {}", renderer.family(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Forward a camera-changed notification
    pub fn on_camera_changed(&mut self, now_ms: f64) {
        for renderer in self.renderers.values_mut() {
            renderer.on_camera_changed(now_ms);
        }
    }

    /// Forward a camera-settled notification
    pub fn on_camera_settled(&mut self, now_ms: f64) -> RenderResult<()> {
        self.each(|renderer| renderer.on_camera_settled(now_ms).map(|_| ()))
    }

    /// Forward a pre-render notification
    pub fn on_pre_render(&mut self, now_ms: f64) -> RenderResult<()> {
        self.each(|renderer| renderer.on_pre_render(now_ms).map(|_| ()))
    }

    /// Forward a frame callback; `true` while any renderer still animates
    pub fn on_animation_frame(&mut self, now_ms: f64) -> RenderResult<bool> {
        let mut running = false;
        self.each(|renderer| {
            running |= renderer.on_animation_frame(now_ms)?;
            Ok(())
        })?;
        Ok(running)
    }

    /// Forward a simulation clock tick
    pub fn on_clock_tick(&mut self, time: f64) -> RenderResult<()> {
        self.each(|renderer| renderer.on_clock_tick(time))
    }

    /// Drain one batch of queued operations from every renderer
    ///
    /// Continues past a failing renderer and returns its error afterwards.
    pub async fn process_pending(&mut self, now_ms: f64) -> RenderResult<Vec<EntityResult>> {
        let mut results = Vec::new();
        let mut first_error = None;
        for renderer in self.renderers.values_mut() {
            match renderer.process_pending(now_ms).await {
                Ok(batch) => results.extend(batch),
                Err(e) => {
                    log::warn!("{} queue processing failed: {}", renderer.family(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(results), Err)
    }

    /// Stats of every cached renderer
    pub fn renderer_stats(&self) -> Vec<(Family, Strategy, RendererStats)> {
        let mut stats: Vec<_> = self
            .renderers
            .iter()
            .map(|((family, strategy, _), renderer)| (*family, *strategy, renderer.stats()))
            .collect();
        stats.sort_by_key(|(family, strategy, _)| (*family, *strategy));
        stats
    }

    /// Destroy every cached renderer
    pub fn destroy_all(&mut self) -> RenderResult<()> {
        let count = self.renderers.len();
        let mut first_error = None;
        for (_, mut renderer) in self.renderers.drain() {
            if let Err(e) = renderer.destroy() {
                first_error.get_or_insert(e);
            }
        }
        log::info!("Destroyed {} cached renderers", count);
        first_error.map_or(Ok(()), Err)
    }
}
