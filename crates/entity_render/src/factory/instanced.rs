//! Instanced rendering path
//!
//! Entities that share a geometry are drawn by a single host primitive of
//! kind [`PrimitiveKind::Instanced`]. Each entity is one packed
//! [`InstanceData`] element; LOD, culling and caller visibility clear its
//! `visible` flag and highlights change its color, so none of them touch the
//! primitive count.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use bytemuck::{Pod, Zeroable};

use crate::core::RendererConfig;
use crate::entity::{
    DetailMask, EntityContract, EntityId, EntityRecord, EntityResult, EntityUpdate, Family, FamilyPayload,
    FamilyStats, PendingOp, PendingQueue, RenderOptions, RenderOutcome, RenderServices, RendererStats,
};
use crate::error::{RenderError, RenderResult};
use crate::events::{EntityEvent, EventBus};
use crate::foundation::collections::{EntityArena, EntityKey};
use crate::foundation::math::{Color, Vec2, Vec3};
use crate::foundation::time::{IntervalGate, Stopwatch};
use crate::host::{PrimitiveDesc, PrimitiveId, PrimitiveKind, PrimitivePatch};
use crate::lod::{default_detail_mask, LodController};
use crate::selection::{Highlight, SelectionState};

/// Per-instance element packed into the group primitive
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Offset from the group origin in meters
    pub offset: [f32; 3],
    /// Uniform scale
    pub scale: f32,
    /// RGBA color
    pub color: [f32; 4],
    /// Non-zero when drawn
    pub visible: u32,
}

struct InstanceEntry {
    record: EntityRecord,
    geometry: String,
    focus: Vec3,
    culled: bool,
    level: usize,
}

struct InstanceGroup {
    primitive: PrimitiveId,
    origin: Vec3,
    members: Vec<EntityKey>,
    shown: bool,
}

fn instance_scale(record: &EntityRecord) -> f64 {
    match &record.payload {
        Some(FamilyPayload::Model { scale, .. }) => *scale,
        Some(FamilyPayload::Point { pixel_size, .. }) => *pixel_size,
        _ => 1.0,
    }
}

/// Renders a family as one instanced primitive per geometry
pub struct InstancedRenderer {
    family: Family,
    services: RenderServices,
    config: RendererConfig,
    arena: EntityArena<InstanceEntry>,
    ids: HashMap<EntityId, EntityKey>,
    groups: BTreeMap<String, InstanceGroup>,
    lod: LodController,
    selection: SelectionState,
    events: EventBus,
    pending: PendingQueue,
    cull_gate: IntervalGate,
    last_frame_ms: f64,
    last_render_ms: f64,
    destroyed: bool,
}

impl InstancedRenderer {
    /// Create an instanced renderer for a family
    pub fn new(family: Family, services: RenderServices, config: &RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        log::info!("Creating instanced {} renderer", family);
        Ok(Self {
            family,
            services,
            lod: LodController::new(&config.lod)?,
            arena: EntityArena::with_key(),
            ids: HashMap::new(),
            groups: BTreeMap::new(),
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

    /// Number of instanced primitives
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Primitive drawing a geometry group
    pub fn group_primitive(&self, geometry: &str) -> Option<PrimitiveId> {
        self.groups.get(geometry).map(|group| group.primitive)
    }

    fn validate(&self, record: &EntityRecord) -> RenderResult<String> {
        record.validate_for(self.family)?;
        record
            .geometry_id()
            .ok_or_else(|| RenderError::invalid(record.id.as_str(), "instanced rendering needs a geometry id"))
    }

    fn is_drawn(&self, entry: &InstanceEntry) -> bool {
        entry.record.visible
            && !entry.culled
            && default_detail_mask(entry.level, self.lod.highest_level()).contains(DetailMask::PRIMARY)
    }

    fn instance(&self, key: EntityKey, origin: &Vec3) -> Option<InstanceData> {
        let entry = self.arena.get(key)?;
        let ctx = self.services.context();
        let base = ctx.material(&entry.record.style, "basic").color();
        let color = match self.selection.highlight_of(&entry.record.id) {
            Highlight::None => base,
            Highlight::Selected => Color::YELLOW.with_alpha(base.a),
            Highlight::Hovered => base.lighten(0.35),
        };
        let offset = entry.focus - origin;
        Some(InstanceData {
            offset: [offset.x as f32, offset.y as f32, offset.z as f32],
            scale: instance_scale(&entry.record) as f32,
            color: color.to_array(),
            visible: u32::from(self.is_drawn(entry)),
        })
    }

    /// Repack a group and sync its primitive's visibility
    fn flush(&mut self, geometry: &str) -> RenderResult<()> {
        let Some(group) = self.groups.get(geometry) else {
            return Ok(());
        };
        let instances: Vec<InstanceData> = group
            .members
            .iter()
            .filter_map(|key| self.instance(*key, &group.origin))
            .collect();
        let any_visible = instances.iter().any(|instance| instance.visible != 0);
        let data = bytemuck::cast_slice::<InstanceData, u8>(&instances).to_vec();
        let host = self.services.host.as_ref();
        host.update_primitive(group.primitive, PrimitivePatch::new().data(data, instances.len()))?;
        if group.shown != any_visible {
            host.set_visible(group.primitive, any_visible)?;
            if let Some(group) = self.groups.get_mut(geometry) {
                group.shown = any_visible;
            }
        }
        Ok(())
    }

    fn flush_all(&mut self, geometries: BTreeSet<String>) -> RenderResult<()> {
        for geometry in geometries {
            self.flush(&geometry)?;
        }
        Ok(())
    }

    /// Make sure a group exists for a geometry, loading model resources
    async fn ensure_group(&mut self, geometry: &str, record: &EntityRecord) -> RenderResult<()> {
        if self.groups.contains_key(geometry) {
            return Ok(());
        }
        let ctx = self.services.context();
        let shape = match &record.payload {
            Some(FamilyPayload::Model { uri, .. }) if record.style.geometry.is_none() => {
                ctx.host.load_resource(uri).await.map_err(|e| RenderError::ResourceLoad {
                    id: record.id.clone(),
                    uri: uri.clone(),
                    reason: e.to_string(),
                })?;
                ctx.mesh(uri)
            }
            _ => ctx.geometry(&record.style, geometry),
        };
        let origin = record.focus();
        let desc = PrimitiveDesc::new(PrimitiveKind::Instanced, ctx.catalog.basic())
            .at(origin)
            .with_geometry(shape);
        let primitive = ctx.host.create_primitive(desc)?;
        log::debug!("Created instance group {} for geometry {}", primitive, geometry);
        self.groups.insert(
            geometry.to_string(),
            InstanceGroup {
                primitive,
                origin,
                members: Vec::new(),
                shown: false,
            },
        );
        Ok(())
    }

    fn leave_group(&mut self, key: EntityKey, geometry: &str) -> RenderResult<bool> {
        let Some(group) = self.groups.get_mut(geometry) else {
            return Ok(false);
        };
        group.members.retain(|member| *member != key);
        if group.members.is_empty() {
            let primitive = group.primitive;
            self.groups.remove(geometry);
            self.services.host.remove_primitive(primitive)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn distance(&self, focus: &Vec3) -> f64 {
        self.services.host.camera().distance_to(focus)
    }

    /// Add one entity; an existing id is updated in place
    pub async fn add_entity(&mut self, record: EntityRecord) -> RenderResult<EntityKey> {
        self.ensure_alive()?;
        if let Some(key) = self.ids.get(&record.id).copied() {
            self.replace(key, record)?;
            return Ok(key);
        }
        let geometry = self.validate(&record)?;
        self.ensure_group(&geometry, &record).await?;

        let focus = record.focus();
        let distance = self.distance(&focus);
        let limit = record.max_distance.unwrap_or(self.config.contract.default_max_distance);
        let id = record.id.clone();
        let key = self.arena.insert(InstanceEntry {
            record,
            geometry: geometry.clone(),
            focus,
            culled: distance > limit,
            level: 0,
        });
        self.ids.insert(id.clone(), key);
        let level = self.lod.track(key, id.clone(), distance, self.last_frame_ms);
        if let Some(entry) = self.arena.get_mut(key) {
            entry.level = level;
        }
        if let Some(group) = self.groups.get_mut(&geometry) {
            group.members.push(key);
        }
        self.flush(&geometry)?;
        self.events.emit(&EntityEvent::Added(id));
        Ok(key)
    }

    fn replace(&mut self, key: EntityKey, next: EntityRecord) -> RenderResult<()> {
        let geometry = self.validate(&next)?;
        let previous = match self.arena.get(key) {
            Some(entry) => entry.geometry.clone(),
            None => return Err(RenderError::UnknownEntity(next.id)),
        };
        if geometry != previous && !self.groups.contains_key(&geometry) {
            return Err(RenderError::invalid(
                next.id.as_str(),
                format!("geometry {geometry} has no instance group; re-add the entity"),
            ));
        }

        let focus = next.focus();
        let distance = self.distance(&focus);
        let limit = next.max_distance.unwrap_or(self.config.contract.default_max_distance);
        let transition = self.lod.reevaluate(key, distance, self.last_frame_ms);
        let id = next.id.clone();
        if let Some(entry) = self.arena.get_mut(key) {
            entry.record = next;
            entry.focus = focus;
            entry.culled = distance > limit;
            entry.geometry = geometry.clone();
            if let Some(transition) = transition {
                entry.level = transition.to;
            }
        }

        let mut dirty = BTreeSet::from([geometry.clone()]);
        if geometry != previous {
            if let Some(group) = self.groups.get_mut(&geometry) {
                group.members.push(key);
            }
            if self.leave_group(key, &previous)? {
                dirty.insert(previous);
            }
        }
        self.flush_all(dirty)?;
        self.events.emit(&EntityEvent::Updated(id));
        Ok(())
    }

    /// Update an entity in place; unknown ids are logged and ignored
    pub fn update_entity(&mut self, id: &str, update: EntityUpdate) -> RenderResult<bool> {
        self.ensure_alive()?;
        let Some(key) = self.ids.get(id).copied() else {
            log::warn!("Ignoring update for unknown instanced {} entity {}", self.family, id);
            return Ok(false);
        };
        let Some(entry) = self.arena.get(key) else {
            return Ok(false);
        };
        let mut next = entry.record.clone();
        next.apply(update);
        self.replace(key, next)?;
        Ok(true)
    }

    /// Remove an entity's instance
    ///
    /// Queued operations for the same id are dropped first.
    pub fn remove_entity(&mut self, id: &str) -> RenderResult<bool> {
        self.ensure_alive()?;
        self.pending.purge(id);
        self.remove_now(id)
    }

    fn remove_now(&mut self, id: &str) -> RenderResult<bool> {
        let Some(key) = self.ids.remove(id) else {
            log::warn!("Ignoring removal of unknown instanced {} entity {}", self.family, id);
            return Ok(false);
        };
        let Some(entry) = self.arena.remove(key) else {
            return Ok(false);
        };
        self.lod.untrack(key);
        self.selection.forget(&entry.record.id);
        if self.leave_group(key, &entry.geometry)? {
            self.flush(&entry.geometry)?;
        }
        self.events.emit(&EntityEvent::Removed(entry.record.id));
        Ok(true)
    }

    /// Add records in bounded batches
    pub async fn add_entities(&mut self, records: Vec<EntityRecord>) -> RenderResult<Vec<EntityResult>> {
        self.ensure_alive()?;
        let batch_size = self.config.contract.batch_size.max(1);
        let total = records.len();
        let mut results = Vec::with_capacity(total);
        for (index, record) in records.into_iter().enumerate() {
            let id = record.id.clone();
            let result = self.add_entity(record).await;
            if let Err(e) = &result {
                log::warn!("Failed to add instanced {} entity {}: {}", self.family, id, e);
            }
            results.push(EntityResult::from_result(id, result));
            if (index + 1) % batch_size == 0 && index + 1 < total {
                tokio::task::yield_now().await;
            }
        }
        Ok(results)
    }

    /// Apply several updates; unknown ids are reported as failures
    pub fn update_entities(&mut self, updates: Vec<(EntityId, EntityUpdate)>) -> RenderResult<Vec<EntityResult>> {
        self.ensure_alive()?;
        let mut results = Vec::with_capacity(updates.len());
        for (id, update) in updates {
            let result = match self.update_entity(id.as_str(), update) {
                Ok(true) => Ok(()),
                Ok(false) => Err(RenderError::UnknownEntity(id.clone())),
                Err(e) => {
                    log::warn!("Failed to update instanced {} entity {}: {}", self.family, id, e);
                    Err(e)
                }
            };
            results.push(EntityResult::from_result(id, result));
        }
        Ok(results)
    }

    /// Remove several entities; unknown ids are reported as failures
    pub fn remove_entities(&mut self, ids: Vec<EntityId>) -> RenderResult<Vec<EntityResult>> {
        self.ensure_alive()?;
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = match self.remove_entity(id.as_str()) {
                Ok(true) => Ok(()),
                Ok(false) => Err(RenderError::UnknownEntity(id.clone())),
                Err(e) => Err(e),
            };
            results.push(EntityResult::from_result(id, result));
        }
        Ok(results)
    }

    /// Process up to one batch of queued operations, in submission order
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
                log::warn!("Queued operation on instanced {} failed: {}", id, e);
            }
            results.push(EntityResult::from_result(id, result));
        }
        Ok(results)
    }

    /// Remove every entity and every group primitive
    pub fn clear(&mut self) -> RenderResult<usize> {
        self.ensure_alive()?;
        self.pending.clear();
        let count = self.arena.len();
        let ids: Vec<EntityId> = self.ids.keys().cloned().collect();
        self.arena.clear();
        self.ids.clear();
        self.lod.clear();
        self.selection.clear();
        let host = self.services.host.as_ref();
        let mut first_error = None;
        for (_, group) in std::mem::take(&mut self.groups) {
            if let Err(e) = host.remove_primitive(group.primitive) {
                first_error.get_or_insert(RenderError::from(e));
            }
        }
        for id in ids {
            self.events.emit(&EntityEvent::Removed(id));
        }
        first_error.map_or(Ok(count), Err)
    }

    /// Replace all entities with `records`
    pub async fn render(&mut self, records: Vec<EntityRecord>, options: RenderOptions) -> RenderResult<RenderOutcome> {
        self.ensure_alive()?;
        let watch = Stopwatch::start_new();
        if options.clear_existing {
            self.clear()?;
        }
        let results = self.add_entities(records).await?;
        let outcome = RenderOutcome::from_results(results, watch.elapsed_millis());
        self.last_render_ms = outcome.render_time_ms;
        self.events.emit(&EntityEvent::Rendered {
            count: outcome.count,
            render_time_ms: outcome.render_time_ms,
        });
        Ok(outcome)
    }

    fn visible_count(&self) -> usize {
        self.arena.values().filter(|entry| self.is_drawn(entry)).count()
    }

    fn apply_selection(&mut self, changed: [Option<EntityId>; 2]) -> RenderResult<()> {
        let dirty: BTreeSet<String> = changed
            .iter()
            .flatten()
            .filter_map(|id| self.ids.get(id).and_then(|key| self.arena.get(*key)))
            .map(|entry| entry.geometry.clone())
            .collect();
        self.flush_all(dirty)
    }

    fn known(&self, id: Option<&str>) -> Option<Option<EntityId>> {
        match id {
            None => Some(None),
            Some(id) if self.ids.contains_key(id) => Some(Some(EntityId::from(id))),
            Some(id) => {
                log::warn!("Ignoring selection of unknown instanced {} entity {}", self.family, id);
                None
            }
        }
    }
}

#[async_trait(?Send)]
impl EntityContract for InstancedRenderer {
    fn family(&self) -> Family {
        self.family
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
        self.pending.push_add(record);
    }

    fn enqueue_update(&mut self, id: EntityId, update: EntityUpdate) {
        self.pending.push_update(id, update);
    }

    fn enqueue_remove(&mut self, id: EntityId) {
        let registered = self.ids.contains_key(&id);
        self.pending.push_remove(id, registered);
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }

    async fn process_pending(&mut self, now_ms: f64) -> RenderResult<Vec<EntityResult>> {
        Self::process_pending(self, now_ms).await
    }

    fn clear(&mut self) -> RenderResult<usize> {
        Self::clear(self)
    }

    fn get_entity(&self, id: &str) -> Option<&EntityRecord> {
        let key = self.ids.get(id)?;
        self.arena.get(*key).map(|entry| &entry.record)
    }

    fn get_all_entities(&self) -> Vec<&EntityRecord> {
        self.arena.values().map(|entry| &entry.record).collect()
    }

    fn entity_count(&self) -> usize {
        self.arena.len()
    }

    fn visible_entity_count(&self) -> usize {
        self.visible_count()
    }

    fn stats(&self) -> RendererStats {
        let family = match self.family {
            Family::Model => FamilyStats::Model {
                loaded: self.groups.len(),
                instanced: self.arena.len(),
            },
            _ => FamilyStats::None,
        };
        RendererStats {
            total_entities: self.arena.len(),
            visible_entities: self.visible_count(),
            animating_entities: 0,
            render_time_ms: self.last_render_ms,
            pending: self.pending.len(),
            family,
        }
    }

    fn destroy(&mut self) -> RenderResult<()> {
        self.ensure_alive()?;
        let cleared = Self::clear(self);
        self.events.emit(&EntityEvent::Disposed);
        self.events.clear();
        self.destroyed = true;
        log::info!("Destroyed instanced {} renderer", self.family);
        cleared.map(|_| ())
    }

    fn on_camera_changed(&mut self, now_ms: f64) {
        if !self.destroyed {
            self.last_frame_ms = now_ms;
            self.lod.camera_changed(now_ms);
        }
    }

    fn on_camera_settled(&mut self, now_ms: f64) -> RenderResult<usize> {
        self.ensure_alive()?;
        self.last_frame_ms = now_ms;
        if !self.cull_gate.try_pass(now_ms) {
            return Ok(0);
        }
        let camera = self.services.host.camera();
        let default_max = self.config.contract.default_max_distance;
        let mut dirty = BTreeSet::new();
        let mut changed = 0;
        for entry in self.arena.values_mut() {
            let limit = entry.record.max_distance.unwrap_or(default_max);
            let culled = camera.distance_to(&entry.focus) > limit;
            if culled != entry.culled {
                entry.culled = culled;
                dirty.insert(entry.geometry.clone());
                changed += 1;
            }
        }
        self.flush_all(dirty)?;
        Ok(changed)
    }

    fn on_pre_render(&mut self, now_ms: f64) -> RenderResult<usize> {
        self.ensure_alive()?;
        self.last_frame_ms = now_ms;
        if !self.lod.should_evaluate(now_ms) {
            return Ok(0);
        }
        let camera = self.services.host.camera();
        let distances: Vec<(EntityKey, f64)> = self
            .arena
            .iter()
            .map(|(key, entry)| (key, camera.distance_to(&entry.focus)))
            .collect();
        let transitions = self.lod.evaluate(now_ms, distances);
        let mut dirty = BTreeSet::new();
        for transition in &transitions {
            if let Some(entry) = self.arena.get_mut(transition.key) {
                entry.level = transition.to;
                dirty.insert(entry.geometry.clone());
            }
        }
        self.flush_all(dirty)?;
        Ok(transitions.len())
    }

    fn on_animation_frame(&mut self, _now_ms: f64) -> RenderResult<bool> {
        Ok(false)
    }

    fn on_clock_tick(&mut self, _time: f64) -> RenderResult<()> {
        self.ensure_alive()
    }

    fn select(&mut self, id: Option<&str>) -> RenderResult<bool> {
        self.ensure_alive()?;
        let Some(target) = self.known(id) else {
            return Ok(false);
        };
        match self.selection.select(target) {
            Some(change) => self.apply_selection([change.previous, change.next]).map(|()| true),
            None => Ok(false),
        }
    }

    fn hover(&mut self, id: Option<&str>) -> RenderResult<bool> {
        self.ensure_alive()?;
        let Some(target) = self.known(id) else {
            return Ok(false);
        };
        match self.selection.hover(target) {
            Some(change) => self.apply_selection([change.previous, change.next]).map(|()| true),
            None => Ok(false),
        }
    }

    fn selected(&self) -> Option<&EntityId> {
        self.selection.selected()
    }

    fn hovered(&self) -> Option<&EntityId> {
        self.selection.hovered()
    }

    /// A group primitive stands for many entities, so picks never resolve
    fn pick(&self, screen: Vec2) -> RenderResult<Option<EntityId>> {
        self.ensure_alive()?;
        self.services.host.pick(screen)?;
        Ok(None)
    }

    fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::entity::StyleOverrides;
    use crate::foundation::math::Anchor;
    use crate::host::HeadlessHost;

    fn renderer(family: Family) -> (Rc<HeadlessHost>, InstancedRenderer) {
        let host = Rc::new(HeadlessHost::new());
        host.set_camera_position(Anchor::new(0.0, 0.0, 1_000.0).world());
        let services = RenderServices::new(host.clone(), 64);
        (host, InstancedRenderer::new(family, services, &RendererConfig::new()).unwrap())
    }

    fn boxes(n: usize) -> Vec<EntityRecord> {
        (0..n)
            .map(|i| {
                EntityRecord::point(format!("b{i}"), Anchor::surface(0.0, 0.001 * i as f64))
                    .with_style(StyleOverrides::default().with_geometry("box"))
            })
            .collect()
    }

    fn instances(host: &HeadlessHost, primitive: PrimitiveId) -> Vec<InstanceData> {
        let desc = host.primitive(primitive).unwrap();
        bytemuck::cast_slice::<u8, InstanceData>(&desc.data).to_vec()
    }

    #[test]
    fn test_instance_layout_is_packed() {
        assert_eq!(std::mem::size_of::<InstanceData>(), 36);
    }

    #[tokio::test]
    async fn test_one_primitive_per_geometry() {
        let (host, mut renderer) = renderer(Family::Point);
        let outcome = renderer.render(boxes(6), RenderOptions::default()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(renderer.group_count(), 1);
        assert_eq!(host.primitive_count(), 1);
        let primitive = renderer.group_primitive("box").unwrap();
        assert_eq!(host.primitive(primitive).unwrap().element_count, 6);
        assert!(host.is_visible(primitive));

        assert!(renderer.remove_entity("b0").unwrap());
        assert_eq!(instances(&host, primitive).len(), 5);
        renderer.clear().unwrap();
        assert_eq!(host.primitive_count(), 0);
    }

    #[tokio::test]
    async fn test_hidden_record_clears_its_flag() {
        let (host, mut renderer) = renderer(Family::Point);
        renderer.render(boxes(5), RenderOptions::default()).await.unwrap();
        renderer.update_entity("b2", EntityUpdate::new().visible(false)).unwrap();
        let primitive = renderer.group_primitive("box").unwrap();
        let flags: Vec<u32> = instances(&host, primitive).iter().map(|i| i.visible).collect();
        assert_eq!(flags, vec![1, 1, 0, 1, 1]);
        assert_eq!(EntityContract::visible_entity_count(&renderer), 4);
    }

    #[tokio::test]
    async fn test_selection_recolors_one_instance() {
        let (host, mut renderer) = renderer(Family::Point);
        renderer.render(boxes(5), RenderOptions::default()).await.unwrap();
        let primitive = renderer.group_primitive("box").unwrap();

        assert!(EntityContract::select(&mut renderer, Some("b1")).unwrap());
        assert!(EntityContract::select(&mut renderer, Some("b3")).unwrap());
        let colors: Vec<[f32; 4]> = instances(&host, primitive).iter().map(|i| i.color).collect();
        let selected = Color::YELLOW.to_array();
        assert_ne!(colors[1], selected);
        assert_eq!(colors[3], selected);
        assert_eq!(colors.iter().filter(|c| **c == selected).count(), 1);
    }

    #[tokio::test]
    async fn test_record_without_geometry_is_rejected() {
        let (_host, mut renderer) = renderer(Family::Point);
        let results = renderer
            .add_entities(vec![EntityRecord::point("plain", Anchor::surface(0.0, 0.0))])
            .await
            .unwrap();
        assert!(!results[0].success);
        assert_eq!(renderer.arena.len(), 0);
    }
}
