//! Arena of live entities with id and primitive indices
//!
//! Entries live in a slot map. The id index answers caller lookups and the
//! primitive index answers pick queries, so neither handles nor records hold
//! references to each other.

use std::collections::HashMap;

use super::handle::{DetailMask, VisualHandle};
use super::record::{EntityId, EntityRecord};
use crate::foundation::collections::{EntityArena, EntityKey};
use crate::foundation::math::Vec3;
use crate::host::PrimitiveId;

/// One live entity
pub struct RegistryEntry<S> {
    /// Current record
    pub record: EntityRecord,
    /// Owned primitives
    pub handle: VisualHandle,
    /// Family-specific state
    pub state: S,
    /// Point used for distance tests
    pub focus: Vec3,
    /// Beyond its culling distance
    pub culled: bool,
    /// Detail roles allowed by the current LOD level
    pub detail: DetailMask,
}

impl<S> RegistryEntry<S> {
    /// Entry with full detail and no culling
    pub fn new(record: EntityRecord, handle: VisualHandle, state: S) -> Self {
        let focus = record.focus();
        Self {
            record,
            handle,
            state,
            focus,
            culled: false,
            detail: DetailMask::all(),
        }
    }

    /// Roles that should be drawn right now
    pub fn visible_mask(&self) -> DetailMask {
        if self.record.visible && !self.culled {
            self.detail
        } else {
            DetailMask::empty()
        }
    }

    /// Whether the entity's primary shape is drawn
    pub fn is_visible(&self) -> bool {
        self.visible_mask().contains(DetailMask::PRIMARY)
    }
}

/// Live entities of one renderer
pub struct EntityRegistry<S> {
    arena: EntityArena<RegistryEntry<S>>,
    ids: HashMap<EntityId, EntityKey>,
    primitives: HashMap<PrimitiveId, EntityKey>,
}

impl<S> EntityRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            arena: EntityArena::with_key(),
            ids: HashMap::new(),
            primitives: HashMap::new(),
        }
    }

    /// Store an entry; the id must not be registered yet
    pub fn insert(&mut self, entry: RegistryEntry<S>) -> EntityKey {
        debug_assert!(!self.ids.contains_key(&entry.record.id));
        let id = entry.record.id.clone();
        let primitives: Vec<PrimitiveId> = entry.handle.primitive_ids().collect();
        let key = self.arena.insert(entry);
        self.ids.insert(id, key);
        for primitive in primitives {
            self.primitives.insert(primitive, key);
        }
        key
    }

    /// Take an entry out, dropping its index entries
    pub fn remove(&mut self, id: &str) -> Option<(EntityKey, RegistryEntry<S>)> {
        let key = self.ids.remove(id)?;
        let entry = self.arena.remove(key)?;
        for primitive in entry.handle.primitive_ids() {
            self.primitives.remove(&primitive);
        }
        Some((key, entry))
    }

    /// Refresh the primitive index after a handle gained or lost parts
    ///
    /// `previous` lists the primitives the handle owned before the change.
    pub fn reindex(&mut self, key: EntityKey, previous: &[PrimitiveId]) {
        let Some(entry) = self.arena.get(key) else {
            return;
        };
        if entry.handle.primitive_ids().eq(previous.iter().copied()) {
            return;
        }
        for primitive in previous {
            if self.primitives.get(primitive) == Some(&key) {
                self.primitives.remove(primitive);
            }
        }
        for primitive in entry.handle.primitive_ids() {
            self.primitives.insert(primitive, key);
        }
    }

    /// Arena key of an id
    pub fn key_of(&self, id: &str) -> Option<EntityKey> {
        self.ids.get(id).copied()
    }

    /// Whether an id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Entry by id
    pub fn get(&self, id: &str) -> Option<&RegistryEntry<S>> {
        self.key_of(id).and_then(|key| self.arena.get(key))
    }

    /// Mutable entry by id
    pub fn get_mut(&mut self, id: &str) -> Option<&mut RegistryEntry<S>> {
        let key = self.key_of(id)?;
        self.arena.get_mut(key)
    }

    /// Entry by key
    pub fn get_by_key(&self, key: EntityKey) -> Option<&RegistryEntry<S>> {
        self.arena.get(key)
    }

    /// Mutable entry by key
    pub fn get_by_key_mut(&mut self, key: EntityKey) -> Option<&mut RegistryEntry<S>> {
        self.arena.get_mut(key)
    }

    /// Owner of a host primitive
    pub fn entity_for_primitive(&self, primitive: PrimitiveId) -> Option<&EntityId> {
        let key = self.primitives.get(&primitive)?;
        self.arena.get(*key).map(|entry| &entry.record.id)
    }

    /// Iterate entries
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &RegistryEntry<S>)> {
        self.arena.iter()
    }

    /// Iterate entries mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityKey, &mut RegistryEntry<S>)> {
        self.arena.iter_mut()
    }

    /// Registered ids
    pub fn ids(&self) -> Vec<EntityId> {
        self.arena.values().map(|entry| entry.record.id.clone()).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

impl<S> Default for EntityRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::handle::HandleBuilder;
    use crate::foundation::math::Anchor;
    use crate::host::{HeadlessHost, PrimitiveDesc, PrimitiveKind};
    use crate::library::Catalog;

    #[test]
    fn test_primitive_index_follows_entries() {
        let host = HeadlessHost::new();
        let catalog = Catalog::standard();
        let mut builder = HandleBuilder::new(&host);
        let primitive = builder
            .create(DetailMask::PRIMARY, PrimitiveDesc::new(PrimitiveKind::Marker, catalog.basic()))
            .unwrap();
        let handle = builder.finish();

        let mut registry = EntityRegistry::new();
        let record = EntityRecord::point("a", Anchor::surface(0.0, 0.0));
        let key = registry.insert(RegistryEntry::new(record, handle, ()));
        assert_eq!(registry.key_of("a"), Some(key));
        assert_eq!(registry.entity_for_primitive(primitive).map(EntityId::as_str), Some("a"));

        let (_, entry) = registry.remove("a").unwrap();
        assert!(registry.entity_for_primitive(primitive).is_none());
        assert!(registry.is_empty());
        entry.handle.release(&host).unwrap();
    }

    #[test]
    fn test_reindex_swaps_only_the_changed_entry() {
        let host = HeadlessHost::new();
        let catalog = Catalog::standard();
        let marker = || PrimitiveDesc::new(PrimitiveKind::Marker, catalog.basic());
        let mut registry = EntityRegistry::new();
        let mut keys = Vec::new();
        for id in ["a", "b"] {
            let mut builder = HandleBuilder::new(&host);
            builder.create(DetailMask::PRIMARY, marker()).unwrap();
            let record = EntityRecord::point(id, Anchor::surface(0.0, 0.0));
            keys.push(registry.insert(RegistryEntry::new(record, builder.finish(), ())));
        }
        let other = registry.get("b").unwrap().handle.part(DetailMask::PRIMARY).unwrap();

        let entry = registry.get_by_key_mut(keys[0]).unwrap();
        let previous: Vec<PrimitiveId> = entry.handle.primitive_ids().collect();
        entry.handle.sync_part(&host, DetailMask::PRIMARY, None).unwrap();
        entry.handle.sync_part(&host, DetailMask::LABEL, Some(marker())).unwrap();
        let label = entry.handle.part(DetailMask::LABEL).unwrap();
        registry.reindex(keys[0], &previous);

        assert!(registry.entity_for_primitive(previous[0]).is_none());
        assert_eq!(registry.entity_for_primitive(label).map(EntityId::as_str), Some("a"));
        assert_eq!(registry.entity_for_primitive(other).map(EntityId::as_str), Some("b"));
    }

    #[test]
    fn test_visible_mask() {
        let record = EntityRecord::point("a", Anchor::surface(0.0, 0.0));
        let mut entry = RegistryEntry::new(record, VisualHandle::default(), ());
        assert!(entry.is_visible());
        entry.culled = true;
        assert_eq!(entry.visible_mask(), DetailMask::empty());
        entry.culled = false;
        entry.record.visible = false;
        assert!(!entry.is_visible());
    }
}
