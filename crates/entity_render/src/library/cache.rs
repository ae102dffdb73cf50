//! Style cache for deduplicating material and geometry descriptors
//!
//! Entries are keyed by the descriptor's input signature and handed out as
//! `Arc`s. An entry is never modified after insertion; a different input
//! produces a different key and therefore a different entry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::geometry::{create_geometry, geometry_signature, GeometryDescriptor, GeometryKind, GeometryOptions};
use super::material::{create_material, material_signature, MaterialDescriptor, MaterialKind, MaterialOptions};

/// Cache entry with descriptor and recency stamp
struct CacheEntry<T> {
    value: Arc<T>,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    materials: HashMap<String, CacheEntry<MaterialDescriptor>>,
    geometries: HashMap<String, CacheEntry<GeometryDescriptor>>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn touch(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn len(&self) -> usize {
        self.materials.len() + self.geometries.len()
    }

    /// Evict least-recently-used entries until one more fits
    fn make_room(&mut self, capacity: usize) {
        while self.len() >= capacity {
            let oldest_material = self
                .materials
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, e)| (k.clone(), e.last_used));
            let oldest_geometry = self
                .geometries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, e)| (k.clone(), e.last_used));
            match (oldest_material, oldest_geometry) {
                (Some((m, mt)), Some((_, gt))) if mt <= gt => {
                    self.materials.remove(&m);
                }
                (_, Some((g, _))) => {
                    self.geometries.remove(&g);
                }
                (Some((m, _)), None) => {
                    self.materials.remove(&m);
                }
                (None, None) => return,
            }
            self.evictions += 1;
        }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Live entries
    pub entries: usize,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that built a new descriptor
    pub misses: u64,
    /// Entries dropped to respect the capacity
    pub evictions: u64,
}

/// Bounded LRU cache of style descriptors
pub struct StyleCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
}

impl StyleCache {
    /// Create an empty cache holding at most `capacity` descriptors
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Shared material for the given inputs
    pub fn material(&self, kind: MaterialKind, options: &MaterialOptions) -> Arc<MaterialDescriptor> {
        let key = material_signature(kind, options);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let stamp = inner.touch();
        if let Some(entry) = inner.materials.get_mut(&key) {
            entry.last_used = stamp;
            let value = Arc::clone(&entry.value);
            inner.hits += 1;
            return value;
        }
        inner.misses += 1;
        inner.make_room(self.capacity);
        let value = Arc::new(create_material(kind, options));
        inner.materials.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                last_used: stamp,
            },
        );
        value
    }

    /// Shared geometry for the given inputs
    pub fn geometry(&self, kind: GeometryKind, options: &GeometryOptions) -> Arc<GeometryDescriptor> {
        let key = geometry_signature(kind, options);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let stamp = inner.touch();
        if let Some(entry) = inner.geometries.get_mut(&key) {
            entry.last_used = stamp;
            let value = Arc::clone(&entry.value);
            inner.hits += 1;
            return value;
        }
        inner.misses += 1;
        inner.make_room(self.capacity);
        let value = Arc::new(create_geometry(kind, options));
        inner.geometries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                last_used: stamp,
            },
        );
        value
    }

    /// Check if a material with these inputs is cached
    pub fn contains_material(&self, kind: MaterialKind, options: &MaterialOptions) -> bool {
        let key = material_signature(kind, options);
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.materials.contains_key(&key)
    }

    /// Clear all cached descriptors
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.materials.clear();
        inner.geometries.clear();
    }

    /// Maximum number of entries
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of cached descriptors
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: inner.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

impl Default for StyleCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Color;

    #[test]
    fn test_same_inputs_share_entry() {
        let cache = StyleCache::new(8);
        let options = MaterialOptions::colored(Color::ORANGE);
        let a = cache.material(MaterialKind::Basic, &options);
        let b = cache.material(MaterialKind::Basic, &options);
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_different_inputs_never_touch_existing_entry() {
        let cache = StyleCache::new(8);
        let base = cache.material(MaterialKind::Basic, &MaterialOptions::default());
        let wide = cache.material(MaterialKind::Basic, &MaterialOptions::default().with_width(6.0));
        assert!(!Arc::ptr_eq(&base, &wide));
        assert!((base.width() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = StyleCache::new(2);
        let red = MaterialOptions::colored(Color::rgb(1.0, 0.0, 0.0));
        let green = MaterialOptions::colored(Color::rgb(0.0, 1.0, 0.0));
        let blue = MaterialOptions::colored(Color::rgb(0.0, 0.0, 1.0));
        cache.material(MaterialKind::Basic, &red);
        cache.material(MaterialKind::Basic, &green);
        // Refresh red so green becomes the oldest
        cache.material(MaterialKind::Basic, &red);
        cache.material(MaterialKind::Basic, &blue);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains_material(MaterialKind::Basic, &red));
        assert!(!cache.contains_material(MaterialKind::Basic, &green));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_geometry_entries_count_toward_capacity() {
        let cache = StyleCache::new(1);
        cache.geometry(GeometryKind::Sphere, &GeometryOptions::default());
        cache.material(MaterialKind::Glow, &MaterialOptions::default());
        assert_eq!(cache.len(), 1);
    }
}
