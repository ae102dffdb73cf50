//! Object-safe entity contract
//!
//! The factory stores renderers of different families and strategies behind
//! this trait. [`EntityRenderer`] implements it by forwarding to its inherent
//! methods; the instanced renderer implements it directly.

use async_trait::async_trait;

use super::family::FamilyRenderer;
use super::record::{EntityId, EntityRecord, EntityUpdate, Family};
use super::renderer::EntityRenderer;
use super::stats::{EntityResult, RenderOptions, RenderOutcome, RendererStats};
use crate::error::RenderResult;
use crate::events::EventBus;
use crate::foundation::collections::EntityKey;
use crate::foundation::math::Vec2;

/// Lifecycle operations shared by every renderer
#[async_trait(?Send)]
pub trait EntityContract {
    /// Family handled by this renderer
    fn family(&self) -> Family;

    /// Primary batch entry point
    async fn render(&mut self, records: Vec<EntityRecord>, options: RenderOptions) -> RenderResult<RenderOutcome>;

    /// Add one entity (updates in place when the id exists)
    async fn add_entity(&mut self, record: EntityRecord) -> RenderResult<EntityKey>;

    /// Add records in batches, collecting per-record results
    async fn add_entities(&mut self, records: Vec<EntityRecord>) -> RenderResult<Vec<EntityResult>>;

    /// Update an entity in place; `false` for unknown ids
    fn update_entity(&mut self, id: &str, update: EntityUpdate) -> RenderResult<bool>;

    /// Remove an entity; `false` for unknown ids
    fn remove_entity(&mut self, id: &str) -> RenderResult<bool>;

    /// Apply several updates, collecting per-item results
    fn update_entities(&mut self, updates: Vec<(EntityId, EntityUpdate)>) -> RenderResult<Vec<EntityResult>>;

    /// Remove several entities, collecting per-item results
    fn remove_entities(&mut self, ids: Vec<EntityId>) -> RenderResult<Vec<EntityResult>>;

    /// Queue an add for the batch processor
    fn enqueue_add(&mut self, record: EntityRecord);

    /// Queue an update for the batch processor
    fn enqueue_update(&mut self, id: EntityId, update: EntityUpdate);

    /// Queue a removal, dropping queued operations for the id
    fn enqueue_remove(&mut self, id: EntityId);

    /// Operations waiting in the queue
    fn pending_count(&self) -> usize;

    /// Process up to one batch of queued operations, throttled to the update interval
    async fn process_pending(&mut self, now_ms: f64) -> RenderResult<Vec<EntityResult>>;

    /// Remove every entity
    fn clear(&mut self) -> RenderResult<usize>;

    /// Record of an entity
    fn get_entity(&self, id: &str) -> Option<&EntityRecord>;

    /// Every registered record
    fn get_all_entities(&self) -> Vec<&EntityRecord>;

    /// Registered entities
    fn entity_count(&self) -> usize;

    /// Entities currently drawn
    fn visible_entity_count(&self) -> usize;

    /// Counters snapshot
    fn stats(&self) -> RendererStats;

    /// Tear down; later calls fail
    fn destroy(&mut self) -> RenderResult<()>;

    /// Camera-changed notification
    fn on_camera_changed(&mut self, now_ms: f64);

    /// Camera-settled notification
    fn on_camera_settled(&mut self, now_ms: f64) -> RenderResult<usize>;

    /// Pre-render notification
    fn on_pre_render(&mut self, now_ms: f64) -> RenderResult<usize>;

    /// Frame callback
    fn on_animation_frame(&mut self, now_ms: f64) -> RenderResult<bool>;

    /// Simulation clock tick
    fn on_clock_tick(&mut self, time: f64) -> RenderResult<()>;

    /// Select an entity or clear the selection
    fn select(&mut self, id: Option<&str>) -> RenderResult<bool>;

    /// Hover an entity or clear the hover
    fn hover(&mut self, id: Option<&str>) -> RenderResult<bool>;

    /// Selected id
    fn selected(&self) -> Option<&EntityId>;

    /// Hovered id
    fn hovered(&self) -> Option<&EntityId>;

    /// Entity under a screen position
    fn pick(&self, screen: Vec2) -> RenderResult<Option<EntityId>>;

    /// Lifecycle event bus
    fn events_mut(&mut self) -> &mut EventBus;
}

#[async_trait(?Send)]
impl<F: FamilyRenderer> EntityContract for EntityRenderer<F> {
    fn family(&self) -> Family {
        F::FAMILY
    }

    async fn render(&mut self, records: Vec<EntityRecord>, options: RenderOptions) -> RenderResult<RenderOutcome> {
        Self::render(self, records, options).await
    }

    async fn add_entity(&mut self, record: EntityRecord) -> RenderResult<EntityKey> {
        Self::add_entity(self, record).await
    }

    async fn add_entities(&mut self, records: Vec<EntityRecord>) -> RenderResult<Vec<EntityResult>> {
        Self::add_entities(self, records).await
    }

    fn update_entity(&mut self, id: &str, update: EntityUpdate) -> RenderResult<bool> {
        Self::update_entity(self, id, update)
    }

    fn remove_entity(&mut self, id: &str) -> RenderResult<bool> {
        Self::remove_entity(self, id)
    }

    fn update_entities(&mut self, updates: Vec<(EntityId, EntityUpdate)>) -> RenderResult<Vec<EntityResult>> {
        Self::update_entities(self, updates)
    }

    fn remove_entities(&mut self, ids: Vec<EntityId>) -> RenderResult<Vec<EntityResult>> {
        Self::remove_entities(self, ids)
    }

    fn enqueue_add(&mut self, record: EntityRecord) {
        Self::enqueue_add(self, record);
    }

    fn enqueue_update(&mut self, id: EntityId, update: EntityUpdate) {
        Self::enqueue_update(self, id, update);
    }

    fn enqueue_remove(&mut self, id: EntityId) {
        Self::enqueue_remove(self, id);
    }

    fn pending_count(&self) -> usize {
        Self::pending_count(self)
    }

    async fn process_pending(&mut self, now_ms: f64) -> RenderResult<Vec<EntityResult>> {
        Self::process_pending(self, now_ms).await
    }

    fn clear(&mut self) -> RenderResult<usize> {
        Self::clear(self)
    }

    fn get_entity(&self, id: &str) -> Option<&EntityRecord> {
        Self::get_entity(self, id)
    }

    fn get_all_entities(&self) -> Vec<&EntityRecord> {
        Self::get_all_entities(self)
    }

    fn entity_count(&self) -> usize {
        Self::entity_count(self)
    }

    fn visible_entity_count(&self) -> usize {
        Self::visible_entity_count(self)
    }

    fn stats(&self) -> RendererStats {
        Self::stats(self)
    }

    fn destroy(&mut self) -> RenderResult<()> {
        Self::destroy(self)
    }

    fn on_camera_changed(&mut self, now_ms: f64) {
        Self::on_camera_changed(self, now_ms);
    }

    fn on_camera_settled(&mut self, now_ms: f64) -> RenderResult<usize> {
        Self::on_camera_settled(self, now_ms)
    }

    fn on_pre_render(&mut self, now_ms: f64) -> RenderResult<usize> {
        Self::on_pre_render(self, now_ms)
    }

    fn on_animation_frame(&mut self, now_ms: f64) -> RenderResult<bool> {
        Self::on_animation_frame(self, now_ms)
    }

    fn on_clock_tick(&mut self, time: f64) -> RenderResult<()> {
        Self::on_clock_tick(self, time)
    }

    fn select(&mut self, id: Option<&str>) -> RenderResult<bool> {
        Self::select(self, id)
    }

    fn hover(&mut self, id: Option<&str>) -> RenderResult<bool> {
        Self::hover(self, id)
    }

    fn selected(&self) -> Option<&EntityId> {
        Self::selected(self)
    }

    fn hovered(&self) -> Option<&EntityId> {
        Self::hovered(self)
    }

    fn pick(&self, screen: Vec2) -> RenderResult<Option<EntityId>> {
        Self::pick(self, screen)
    }

    fn events_mut(&mut self) -> &mut EventBus {
        Self::events_mut(self)
    }
}
