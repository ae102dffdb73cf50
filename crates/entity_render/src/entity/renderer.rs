//! Generic entity renderer
//!
//! [`EntityRenderer`] owns everything every family shares: the registry with
//! its id and primitive indices, the pending queue, distance culling, the
//! LOD controller, the animation scheduler, selection state and the event
//! bus. The family type parameter only contributes primitive construction
//! and family-specific updates.
//!
//! Timestamps passed to the `on_*` notifications are the host's frame times
//! in milliseconds. Clock ticks carry simulation time in seconds.

use super::family::{FamilyRenderer, RenderServices};
use super::handle::VisualHandle;
use super::queue::{PendingOp, PendingQueue};
use super::record::{EntityId, EntityRecord, EntityUpdate};
use super::registry::{EntityRegistry, RegistryEntry};
use super::stats::{EntityResult, RenderOptions, RenderOutcome, RendererStats};
use crate::animation::{AnimationScheduler, AnimationState};
use crate::core::RendererConfig;
use crate::error::{RenderError, RenderResult};
use crate::events::{EntityEvent, EventBus};
use crate::foundation::collections::EntityKey;
use crate::foundation::math::Vec2;
use crate::foundation::time::{IntervalGate, Stopwatch};
use crate::host::{PrimitiveId, RenderHost};
use crate::lod::LodController;
use crate::selection::{Highlight, SelectionChange, SelectionState};

/// Renderer for one entity family
pub struct EntityRenderer<F: FamilyRenderer> {
    family: F,
    services: RenderServices,
    config: RendererConfig,
    registry: EntityRegistry<F::State>,
    lod: LodController,
    animations: AnimationScheduler,
    selection: SelectionState,
    events: EventBus,
    pending: PendingQueue,
    cull_gate: IntervalGate,
    last_frame_ms: f64,
    last_render_ms: f64,
    destroyed: bool,
}

fn show<S>(entry: &mut RegistryEntry<S>, host: &dyn RenderHost) -> RenderResult<()> {
    let mask = entry.visible_mask();
    entry.handle.sync_visibility(host, mask)?;
    Ok(())
}

impl<F: FamilyRenderer> EntityRenderer<F> {
    /// Create a renderer around a family implementation
    pub fn new(family: F, services: RenderServices, config: &RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        log::info!(
            "Creating {} renderer (batch size {}, {} LOD levels)",
            F::FAMILY,
            config.contract.batch_size,
            config.lod.thresholds.len() + 1
        );
        Ok(Self {
            family,
            services,
            lod: LodController::new(&config.lod)?,
            animations: AnimationScheduler::new(&config.animation),
            registry: EntityRegistry::new(),
            selection: SelectionState::new(),
            events: EventBus::new(),
            pending: PendingQueue::new(config.contract.update_interval_ms),
            cull_gate: IntervalGate::new(config.contract.update_interval_ms),
            config: config.clone(),
            last_frame_ms: 0.0,
            last_render_ms: 0.0,
            destroyed: false,
        })
    }

    fn ensure_alive(&self) -> RenderResult<()> {
        if self.destroyed {
            Err(RenderError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn max_distance(&self, record: &EntityRecord) -> f64 {
        record
            .max_distance
            .unwrap_or(self.config.contract.default_max_distance)
    }

    // ---- Entity operations ----

    /// Add an entity; an id that already exists is routed to the update path
    pub async fn add_entity(&mut self, record: EntityRecord) -> RenderResult<EntityKey> {
        self.ensure_alive()?;
        if let Some(key) = self.registry.key_of(record.id.as_str()) {
            log::debug!("Entity {} already registered, updating in place", record.id);
            self.apply_record(key, record)?;
            return Ok(key);
        }
        self.family.validate(&record)?;

        let built = {
            let ctx = self.services.context();
            self.family.build(&ctx, &record).await?
        };
        let (handle, state) = built;

        if let Some(key) = self.registry.key_of(record.id.as_str()) {
            // Registered while the build was suspended
            self.discard_build(&record, handle, state);
            self.apply_record(key, record)?;
            return Ok(key);
        }
        self.finish_add(record, handle, state)
    }

    fn discard_build(&mut self, record: &EntityRecord, handle: VisualHandle, state: F::State) {
        let ctx = self.services.context();
        if let Err(e) = handle.release(ctx.host) {
            log::warn!("Failed to discard duplicate build of {}: {}", record.id, e);
        }
        self.family.release(&ctx, record, state);
    }

    fn finish_add(&mut self, record: EntityRecord, handle: VisualHandle, state: F::State) -> RenderResult<EntityKey> {
        let host = self.services.host.as_ref();
        let animation = self.family.animation(&record, &state);
        let max_distance = self.max_distance(&record);
        let id = record.id.clone();

        let mut entry = RegistryEntry::new(record, handle, state);
        let distance = host.camera().distance_to(&entry.focus);
        entry.culled = distance > max_distance;
        let key = self.registry.insert(entry);

        let level = self.lod.track(key, id.clone(), distance, self.last_frame_ms);
        let highest = self.lod.highest_level();
        let shown = match self.registry.get_by_key_mut(key) {
            Some(entry) => {
                entry.detail = self.family.detail_mask(level, highest);
                show(entry, host)
            }
            None => Ok(()),
        };
        if let Err(e) = shown {
            self.remove_now(id.as_str())?;
            return Err(e);
        }
        if let Some(animation) = animation {
            self.animations.register(key, animation);
        }
        log::debug!("Added {} entity {} at LOD level {}", F::FAMILY, id, level);
        self.events.emit(&EntityEvent::Added(id));
        Ok(key)
    }

    /// Update an entity in place; unknown ids are logged and ignored
    pub fn update_entity(&mut self, id: &str, update: EntityUpdate) -> RenderResult<bool> {
        self.ensure_alive()?;
        let Some(key) = self.registry.key_of(id) else {
            log::warn!("Ignoring update for unknown {} entity {}", F::FAMILY, id);
            return Ok(false);
        };
        let Some(entry) = self.registry.get_by_key(key) else {
            return Ok(false);
        };
        let mut next = entry.record.clone();
        next.apply(update);
        self.apply_record(key, next)?;
        Ok(true)
    }

    fn apply_record(&mut self, key: EntityKey, next: EntityRecord) -> RenderResult<()> {
        self.family.validate(&next)?;
        let max_distance = self.max_distance(&next);
        let ctx = self.services.context();
        let entry = self
            .registry
            .get_by_key_mut(key)
            .ok_or_else(|| RenderError::UnknownEntity(next.id.clone()))?;

        let previous: Vec<PrimitiveId> = entry.handle.primitive_ids().collect();
        self.family.refresh(&ctx, &next, &mut entry.handle, &mut entry.state)?;
        entry.record = next;
        entry.focus = entry.record.focus();

        let highlight = self.selection.highlight_of(&entry.record.id);
        if highlight != Highlight::None {
            self.family
                .apply_highlight(&ctx, &entry.record, &entry.handle, &entry.state, highlight)?;
        }

        let distance = ctx.host.camera().distance_to(&entry.focus);
        entry.culled = distance > max_distance;
        if let Some(transition) = self.lod.reevaluate(key, distance, self.last_frame_ms) {
            entry.detail = self.family.detail_mask(transition.to, self.lod.highest_level());
        }
        match self.family.animation(&entry.record, &entry.state) {
            Some(animation) => self.animations.update(key, animation),
            None => {
                self.animations.unregister(key);
            }
        }
        show(entry, ctx.host)?;
        let id = entry.record.id.clone();
        self.registry.reindex(key, &previous);
        self.events.emit(&EntityEvent::Updated(id));
        Ok(())
    }

    /// Remove an entity and every primitive it owns
    ///
    /// Queued operations for the same id are dropped first.
    pub fn remove_entity(&mut self, id: &str) -> RenderResult<bool> {
        self.ensure_alive()?;
        let purged = self.pending.purge(id);
        if purged > 0 {
            log::debug!("Dropped {} queued operations for {}", purged, id);
        }
        self.remove_now(id)
    }

    fn remove_now(&mut self, id: &str) -> RenderResult<bool> {
        let Some((key, entry)) = self.registry.remove(id) else {
            log::warn!("Ignoring removal of unknown {} entity {}", F::FAMILY, id);
            return Ok(false);
        };
        self.lod.untrack(key);
        self.animations.unregister(key);
        self.selection.forget(&entry.record.id);

        let ctx = self.services.context();
        let RegistryEntry {
            record, handle, state, ..
        } = entry;
        let released = handle.release(ctx.host);
        self.family.release(&ctx, &record, state);
        self.events.emit(&EntityEvent::Removed(record.id));
        released?;
        Ok(true)
    }

    // ---- Batch operations ----

    /// Add records in bounded batches, yielding between batches
    ///
    /// Returns one result per record; a bad record never aborts the rest.
    pub async fn add_entities(&mut self, records: Vec<EntityRecord>) -> RenderResult<Vec<EntityResult>> {
        self.ensure_alive()?;
        let batch_size = self.config.contract.batch_size.max(1);
        let total = records.len();
        let mut results = Vec::with_capacity(total);
        let mut records = records.into_iter();
        loop {
            let batch: Vec<EntityRecord> = records.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            for record in batch {
                let id = record.id.clone();
                let result = self.add_entity(record).await;
                if let Err(e) = &result {
                    log::warn!("Failed to add {} entity {}: {}", F::FAMILY, id, e);
                }
                results.push(EntityResult::from_result(id, result));
            }
            if results.len() < total {
                tokio::task::yield_now().await;
            }
        }
        Ok(results)
    }

    /// Apply several updates; unknown ids are reported as failures
    pub fn update_entities(&mut self, updates: Vec<(EntityId, EntityUpdate)>) -> RenderResult<Vec<EntityResult>> {
        self.ensure_alive()?;
        Ok(updates
            .into_iter()
            .map(|(id, update)| {
                let result = match self.update_entity(id.as_str(), update) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(RenderError::UnknownEntity(id.clone())),
                    Err(e) => {
                        log::warn!("Failed to update {} entity {}: {}", F::FAMILY, id, e);
                        Err(e)
                    }
                };
                EntityResult::from_result(id, result)
            })
            .collect())
    }

    /// Remove several entities; unknown ids are reported as failures
    pub fn remove_entities(&mut self, ids: Vec<EntityId>) -> RenderResult<Vec<EntityResult>> {
        self.ensure_alive()?;
        Ok(ids
            .into_iter()
            .map(|id| {
                let result = match self.remove_entity(id.as_str()) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(RenderError::UnknownEntity(id.clone())),
                    Err(e) => Err(e),
                };
                EntityResult::from_result(id, result)
            })
            .collect())
    }

    // ---- Pending queue ----

    /// Queue an add for the next processing pass
    pub fn enqueue_add(&mut self, record: EntityRecord) {
        self.pending.push_add(record);
    }

    /// Queue an update for the next processing pass
    pub fn enqueue_update(&mut self, id: impl Into<EntityId>, update: EntityUpdate) {
        self.pending.push_update(id.into(), update);
    }

    /// Queue a removal
    ///
    /// Queued operations for the id are dropped. When the entity only existed
    /// as a queued add, nothing is left to remove.
    pub fn enqueue_remove(&mut self, id: impl Into<EntityId>) {
        let id = id.into();
        let registered = self.registry.contains(id.as_str());
        self.pending.push_remove(id, registered);
    }

    /// Operations waiting in the queue
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Process up to one batch of queued operations, in submission order
    ///
    /// Runs at most once per configured update interval.
    pub async fn process_pending(&mut self, now_ms: f64) -> RenderResult<Vec<EntityResult>> {
        self.ensure_alive()?;
        self.last_frame_ms = now_ms;
        let batch = self.pending.take_batch(now_ms, self.config.contract.batch_size);
        let mut results = Vec::with_capacity(batch.len());
        for op in batch {
            let id = op.id().clone();
            let result = match op {
                PendingOp::Add(record) => self.add_entity(record).await.map(|_| ()),
                PendingOp::Update(id, update) => self.update_entity(id.as_str(), update).map(|_| ()),
                PendingOp::Remove(id) => self.remove_now(id.as_str()).map(|_| ()),
            };
            if let Err(e) = &result {
                log::warn!("Queued operation on {} failed: {}", id, e);
            }
            results.push(EntityResult::from_result(id, result));
        }
        Ok(results)
    }

    // ---- Queries and lifecycle ----

    /// Remove every entity and drop queued operations
    pub fn clear(&mut self) -> RenderResult<usize> {
        self.ensure_alive()?;
        self.pending.clear();
        let ids = self.registry.ids();
        let count = ids.len();
        let mut first_error = None;
        for id in ids {
            if let Err(e) = self.remove_now(id.as_str()) {
                first_error.get_or_insert(e);
            }
        }
        self.lod.clear();
        self.animations.clear();
        self.selection.clear();
        first_error.map_or(Ok(count), Err)
    }

    /// Record of an entity
    pub fn get_entity(&self, id: &str) -> Option<&EntityRecord> {
        self.registry.get(id).map(|entry| &entry.record)
    }

    /// Every registered record
    pub fn get_all_entities(&self) -> Vec<&EntityRecord> {
        self.registry.iter().map(|(_, entry)| &entry.record).collect()
    }

    /// Number of registered entities
    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of entities whose primary shape is drawn
    pub fn visible_entity_count(&self) -> usize {
        self.registry.iter().filter(|(_, entry)| entry.is_visible()).count()
    }

    /// Primitives owned by an entity
    pub fn handle(&self, id: &str) -> Option<&VisualHandle> {
        self.registry.get(id).map(|entry| &entry.handle)
    }

    /// Current LOD level of an entity
    pub fn lod_level(&self, id: &str) -> Option<usize> {
        let key = self.registry.key_of(id)?;
        self.lod.state(key).map(|state| state.current_level)
    }

    /// Animation state of an entity
    pub fn animation(&self, id: &str) -> Option<&AnimationState> {
        let key = self.registry.key_of(id)?;
        self.animations.get(key)
    }

    /// Family state of an entity
    pub fn family_state(&self, id: &str) -> Option<&F::State> {
        self.registry.get(id).map(|entry| &entry.state)
    }

    /// Replace all entities with `records`, then optionally start animating
    pub async fn render(&mut self, records: Vec<EntityRecord>, options: RenderOptions) -> RenderResult<RenderOutcome> {
        self.ensure_alive()?;
        let watch = Stopwatch::start_new();
        if options.clear_existing {
            self.clear()?;
        }
        let results = self.add_entities(records).await?;
        if options.start_animation {
            self.start_animation();
        }
        let outcome = RenderOutcome::from_results(results, watch.elapsed_millis());
        self.last_render_ms = outcome.render_time_ms;
        if outcome.failed > 0 {
            log::warn!(
                "{} renderer rejected {} of {} records",
                F::FAMILY,
                outcome.failed,
                outcome.failed + outcome.count
            );
        }
        self.events.emit(&EntityEvent::Rendered {
            count: outcome.count,
            render_time_ms: outcome.render_time_ms,
        });
        Ok(outcome)
    }

    /// Counters snapshot
    pub fn stats(&self) -> RendererStats {
        RendererStats {
            total_entities: self.entity_count(),
            visible_entities: self.visible_entity_count(),
            animating_entities: self.animations.animating_count() + self.family.animating(&self.registry),
            render_time_ms: self.last_render_ms,
            pending: self.pending.len(),
            family: self.family.stats(&self.registry),
        }
    }

    /// Remove everything, stop animating and reject further calls
    pub fn destroy(&mut self) -> RenderResult<()> {
        self.ensure_alive()?;
        let cleared = self.clear();
        self.animations.stop();
        self.events.emit(&EntityEvent::Disposed);
        self.events.clear();
        self.destroyed = true;
        log::info!("Destroyed {} renderer", F::FAMILY);
        cleared.map(|_| ())
    }

    /// Whether `destroy` was called
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ---- Scene notifications ----

    /// Camera-changed notification; schedules a debounced LOD pass
    pub fn on_camera_changed(&mut self, now_ms: f64) {
        if self.destroyed {
            return;
        }
        self.last_frame_ms = now_ms;
        self.lod.camera_changed(now_ms);
    }

    /// Camera-settled notification; re-runs distance culling
    ///
    /// Returns the number of entities whose culled state changed.
    pub fn on_camera_settled(&mut self, now_ms: f64) -> RenderResult<usize> {
        self.ensure_alive()?;
        self.last_frame_ms = now_ms;
        if !self.cull_gate.try_pass(now_ms) {
            return Ok(0);
        }
        let host = self.services.host.as_ref();
        let camera = host.camera();
        let default_max = self.config.contract.default_max_distance;
        let mut changed = 0;
        for (_, entry) in self.registry.iter_mut() {
            let limit = entry.record.max_distance.unwrap_or(default_max);
            let culled = camera.distance_to(&entry.focus) > limit;
            if culled != entry.culled {
                entry.culled = culled;
                show(entry, host)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Pre-render notification; runs the LOD pass when one is due
    ///
    /// Returns the number of level transitions applied.
    pub fn on_pre_render(&mut self, now_ms: f64) -> RenderResult<usize> {
        self.ensure_alive()?;
        self.last_frame_ms = now_ms;
        if !self.lod.should_evaluate(now_ms) {
            return Ok(0);
        }
        let host = self.services.host.as_ref();
        let camera = host.camera();
        let distances: Vec<(EntityKey, f64)> = self
            .registry
            .iter()
            .map(|(key, entry)| (key, camera.distance_to(&entry.focus)))
            .collect();
        let transitions = self.lod.evaluate(now_ms, distances);
        let highest = self.lod.highest_level();
        for transition in &transitions {
            if let Some(entry) = self.registry.get_by_key_mut(transition.key) {
                entry.detail = self.family.detail_mask(transition.to, highest);
                show(entry, host)?;
            }
        }
        if !transitions.is_empty() {
            log::debug!("{} LOD transitions in {} renderer", transitions.len(), F::FAMILY);
        }
        Ok(transitions.len())
    }

    /// Frame callback; advances animations at the configured rate
    ///
    /// Returns whether a tick ran. A stopped or destroyed renderer does
    /// nothing and requests no further frames.
    pub fn on_animation_frame(&mut self, now_ms: f64) -> RenderResult<bool> {
        if self.destroyed {
            return Ok(false);
        }
        self.last_frame_ms = now_ms;
        let Some(advanced) = self.animations.tick(now_ms) else {
            return Ok(false);
        };
        let ctx = self.services.context();
        for (key, animation) in &advanced {
            if let Some(entry) = self.registry.get_by_key_mut(*key) {
                self.family
                    .animate(&ctx, &entry.handle, &mut entry.state, animation)?;
            }
        }
        self.family.tick(&ctx, &mut self.registry, now_ms)?;
        ctx.host.request_frame();
        Ok(true)
    }

    /// Simulation clock tick, in seconds
    pub fn on_clock_tick(&mut self, time: f64) -> RenderResult<()> {
        self.ensure_alive()?;
        let ctx = self.services.context();
        self.family.on_clock(&ctx, &mut self.registry, time)
    }

    /// Start (or restart from progress 0) the animation loop
    pub fn start_animation(&mut self) {
        if self.destroyed {
            return;
        }
        self.animations.start();
        self.services.host.request_frame();
    }

    /// Stop the animation loop
    pub fn stop_animation(&mut self) {
        self.animations.stop();
    }

    /// Whether the animation loop runs
    pub const fn is_animating(&self) -> bool {
        self.animations.is_running()
    }

    // ---- Selection ----

    /// Select an entity, or clear the selection with `None`
    pub fn select(&mut self, id: Option<&str>) -> RenderResult<bool> {
        self.ensure_alive()?;
        let Some(target) = self.known(id) else {
            return Ok(false);
        };
        match self.selection.select(target) {
            Some(change) => self.restyle(&change).map(|()| true),
            None => Ok(false),
        }
    }

    /// Hover an entity, or clear the hover with `None`
    pub fn hover(&mut self, id: Option<&str>) -> RenderResult<bool> {
        self.ensure_alive()?;
        let Some(target) = self.known(id) else {
            return Ok(false);
        };
        match self.selection.hover(target) {
            Some(change) => self.restyle(&change).map(|()| true),
            None => Ok(false),
        }
    }

    /// `Some(target)` for a registered id or `None`; `None` for an unknown id
    fn known(&self, id: Option<&str>) -> Option<Option<EntityId>> {
        match id {
            None => Some(None),
            Some(id) if self.registry.contains(id) => Some(Some(EntityId::from(id))),
            Some(id) => {
                log::warn!("Ignoring selection of unknown {} entity {}", F::FAMILY, id);
                None
            }
        }
    }

    fn restyle(&mut self, change: &SelectionChange) -> RenderResult<()> {
        let ctx = self.services.context();
        for id in change.affected() {
            if let Some(entry) = self.registry.get(id.as_str()) {
                let highlight = self.selection.highlight_of(id);
                self.family
                    .apply_highlight(&ctx, &entry.record, &entry.handle, &entry.state, highlight)?;
            }
        }
        Ok(())
    }

    /// Selected id
    pub const fn selected(&self) -> Option<&EntityId> {
        self.selection.selected()
    }

    /// Hovered id
    pub const fn hovered(&self) -> Option<&EntityId> {
        self.selection.hovered()
    }

    /// Entity under a screen position
    pub fn pick(&self, screen: Vec2) -> RenderResult<Option<EntityId>> {
        self.ensure_alive()?;
        let primitive = self.services.host.pick(screen)?;
        Ok(primitive.and_then(|p| self.registry.entity_for_primitive(p).cloned()))
    }

    /// Select whatever is under a screen position
    pub fn select_at(&mut self, screen: Vec2) -> RenderResult<Option<EntityId>> {
        let picked = self.pick(screen)?;
        self.select(picked.as_ref().map(EntityId::as_str))?;
        Ok(picked)
    }

    /// Hover whatever is under a screen position
    pub fn hover_at(&mut self, screen: Vec2) -> RenderResult<Option<EntityId>> {
        let picked = self.pick(screen)?;
        self.hover(picked.as_ref().map(EntityId::as_str))?;
        Ok(picked)
    }

    // ---- Accessors ----

    /// Lifecycle event bus
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Family implementation
    pub const fn family(&self) -> &F {
        &self.family
    }

    /// Mutable family implementation
    pub fn family_mut(&mut self) -> &mut F {
        &mut self.family
    }

    /// Shared services
    pub const fn services(&self) -> &RenderServices {
        &self.services
    }

    /// Active configuration
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }
}
