//! Level-of-detail controller
//!
//! A level is the number of thresholds the camera distance exceeds, so it is
//! always in `[0, thresholds.len()]` and never decreases as distance grows.
//! Levels are only derived from distances; there is no setter.
//!
//! Evaluation runs when a debounced camera-changed notification comes due or
//! when the fallback sweep interval has elapsed, whichever happens first.

use crate::core::{ConfigError, LodConfig};
use crate::entity::{DetailMask, EntityId};
use crate::foundation::collections::{EntityKey, SecondaryMap};
use crate::foundation::time::{Debouncer, IntervalGate};

/// Per-entity LOD record
#[derive(Debug, Clone, PartialEq)]
pub struct LodState {
    /// Owning entity
    pub entity_id: EntityId,
    /// Ordinal level, 0 = nearest
    pub current_level: usize,
    /// Timestamp (ms) of the last evaluation
    pub last_evaluated_at: f64,
}

/// A level change produced by an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LodTransition {
    /// Entity whose level changed
    pub key: EntityKey,
    /// Previous level
    pub from: usize,
    /// New level
    pub to: usize,
}

/// Roles drawn at a level
///
/// Level 0 draws everything, level 1 drops labels and endpoints, deeper
/// levels keep only the primary shape and the last level hides the entity.
pub fn default_detail_mask(level: usize, highest: usize) -> DetailMask {
    if level >= highest {
        DetailMask::empty()
    } else {
        match level {
            0 => DetailMask::all(),
            1 => DetailMask::all() - DetailMask::LABEL - DetailMask::ENDPOINTS,
            _ => DetailMask::PRIMARY,
        }
    }
}

/// Distance classifier for the entities of one renderer
pub struct LodController {
    thresholds: Vec<f64>,
    states: SecondaryMap<EntityKey, LodState>,
    sweep: IntervalGate,
    debounce: Debouncer,
}

impl LodController {
    /// Create a controller; the threshold table must be ascending
    pub fn new(config: &LodConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            thresholds: config.thresholds.clone(),
            states: SecondaryMap::new(),
            sweep: IntervalGate::new(config.sweep_interval_ms),
            debounce: Debouncer::new(config.debounce_ms),
        })
    }

    /// Level for a camera distance
    pub fn level_for(&self, distance: f64) -> usize {
        if distance.is_nan() {
            return self.highest_level();
        }
        self.thresholds.partition_point(|cutoff| distance > *cutoff)
    }

    /// Level at which an entity is fully hidden
    pub fn highest_level(&self) -> usize {
        self.thresholds.len()
    }

    /// Threshold table
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Start tracking an entity; returns its initial level
    pub fn track(&mut self, key: EntityKey, entity_id: EntityId, distance: f64, now_ms: f64) -> usize {
        let level = self.level_for(distance);
        self.states.insert(
            key,
            LodState {
                entity_id,
                current_level: level,
                last_evaluated_at: now_ms,
            },
        );
        level
    }

    /// Stop tracking an entity
    pub fn untrack(&mut self, key: EntityKey) -> Option<LodState> {
        self.states.remove(key)
    }

    /// State of an entity
    pub fn state(&self, key: EntityKey) -> Option<&LodState> {
        self.states.get(key)
    }

    /// Number of tracked entities
    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    /// Re-derive one entity's level, e.g. after it moved
    pub fn reevaluate(&mut self, key: EntityKey, distance: f64, now_ms: f64) -> Option<LodTransition> {
        let level = self.level_for(distance);
        let state = self.states.get_mut(key)?;
        state.last_evaluated_at = now_ms;
        if state.current_level == level {
            return None;
        }
        let from = std::mem::replace(&mut state.current_level, level);
        Some(LodTransition { key, from, to: level })
    }

    /// Camera-changed notification
    pub fn camera_changed(&mut self, now_ms: f64) {
        self.debounce.trigger(now_ms);
    }

    /// Whether an evaluation is due
    pub fn should_evaluate(&self, now_ms: f64) -> bool {
        self.debounce.is_due(now_ms) || self.sweep.ready(now_ms)
    }

    /// Re-derive every given entity's level; returns the changes
    pub fn evaluate(
        &mut self,
        now_ms: f64,
        distances: impl IntoIterator<Item = (EntityKey, f64)>,
    ) -> Vec<LodTransition> {
        self.sweep.mark(now_ms);
        self.debounce.cancel();
        distances
            .into_iter()
            .filter_map(|(key, distance)| self.reevaluate(key, distance, now_ms))
            .collect()
    }

    /// Forget every entity
    pub fn clear(&mut self) {
        self.states.clear();
        self.debounce.cancel();
        self.sweep.reset();
    }
}
