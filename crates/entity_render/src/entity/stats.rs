//! Renderer statistics and per-call outcomes

use super::record::EntityId;
use crate::error::RenderError;

/// Family-specific counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FamilyStats {
    /// No extra counters
    #[default]
    None,
    /// Particle pool usage
    Particle {
        /// Live particles
        active: usize,
        /// Pool capacity
        capacity: usize,
        /// Registered emitters
        emitters: usize,
    },
    /// Time segmentation of trajectories
    Trajectory {
        /// Trajectories with a history segment
        history_segments: usize,
        /// Trajectories with a prediction segment
        prediction_segments: usize,
    },
    /// Relationship decorations
    Relationship {
        /// Relationships with a flow marker
        flowing: usize,
    },
    /// Model resources
    Model {
        /// Distinct resources loaded
        loaded: usize,
        /// Entities drawn through instancing
        instanced: usize,
    },
}

/// Snapshot returned by `stats()`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RendererStats {
    /// Registered entities
    pub total_entities: usize,
    /// Entities whose primary shape is drawn
    pub visible_entities: usize,
    /// Entities with a running animation
    pub animating_entities: usize,
    /// Duration of the last `render` call
    pub render_time_ms: f64,
    /// Operations waiting in the pending queue
    pub pending: usize,
    /// Family-specific counters
    pub family: FamilyStats,
}

/// Outcome of one record in a batch
#[derive(Debug)]
pub struct EntityResult {
    /// Record id
    pub id: EntityId,
    /// Whether the operation succeeded
    pub success: bool,
    /// Failure reason
    pub error: Option<RenderError>,
}

impl EntityResult {
    /// Successful outcome
    pub fn ok(id: EntityId) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    /// Failed outcome
    pub fn failed(id: EntityId, error: RenderError) -> Self {
        Self {
            id,
            success: false,
            error: Some(error),
        }
    }

    /// Outcome from a result
    pub fn from_result<T>(id: EntityId, result: Result<T, RenderError>) -> Self {
        match result {
            Ok(_) => Self::ok(id),
            Err(error) => Self::failed(id, error),
        }
    }
}

/// Options of a `render` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Remove existing entities first
    pub clear_existing: bool,
    /// Start the animation loop afterwards
    pub start_animation: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            clear_existing: true,
            start_animation: true,
        }
    }
}

impl RenderOptions {
    /// Keep entities from earlier calls
    pub const fn incremental() -> Self {
        Self {
            clear_existing: false,
            start_animation: true,
        }
    }
}

/// Result of a `render` call
#[derive(Debug)]
pub struct RenderOutcome {
    /// Every record was accepted
    pub success: bool,
    /// Records accepted
    pub count: usize,
    /// Records rejected
    pub failed: usize,
    /// Wall-clock duration
    pub render_time_ms: f64,
    /// Per-record outcomes
    pub results: Vec<EntityResult>,
}

impl RenderOutcome {
    /// Build from per-record results
    pub fn from_results(results: Vec<EntityResult>, render_time_ms: f64) -> Self {
        let count = results.iter().filter(|r| r.success).count();
        let failed = results.len() - count;
        Self {
            success: failed == 0,
            count,
            failed,
            render_time_ms,
            results,
        }
    }
}
