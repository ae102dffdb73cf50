//! Pending operations drained by the periodic batch processor

use std::collections::VecDeque;

use super::record::{EntityId, EntityRecord, EntityUpdate};
use crate::foundation::time::IntervalGate;

/// Operation waiting in the queue
#[derive(Debug, Clone)]
pub enum PendingOp {
    /// Add or update in place
    Add(EntityRecord),
    /// Partial update
    Update(EntityId, EntityUpdate),
    /// Removal
    Remove(EntityId),
}

impl PendingOp {
    /// Entity the operation targets
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Add(record) => &record.id,
            Self::Update(id, _) | Self::Remove(id) => id,
        }
    }
}

/// FIFO of pending operations, drained at most once per interval
#[derive(Debug, Clone)]
pub struct PendingQueue {
    ops: VecDeque<PendingOp>,
    gate: IntervalGate,
}

impl PendingQueue {
    /// Create an empty queue
    pub const fn new(interval_ms: f64) -> Self {
        Self {
            ops: VecDeque::new(),
            gate: IntervalGate::new(interval_ms),
        }
    }

    /// Queue an add
    pub fn push_add(&mut self, record: EntityRecord) {
        self.ops.push_back(PendingOp::Add(record));
    }

    /// Queue an update
    pub fn push_update(&mut self, id: EntityId, update: EntityUpdate) {
        self.ops.push_back(PendingOp::Update(id, update));
    }

    /// Queue a removal, dropping every queued operation for the id
    ///
    /// When the id is not `registered` and only existed as a queued add,
    /// nothing is queued and `false` is returned.
    pub fn push_remove(&mut self, id: EntityId, registered: bool) -> bool {
        let cancelled_add = self
            .ops
            .iter()
            .any(|op| matches!(op, PendingOp::Add(record) if record.id == id));
        self.purge(id.as_str());
        if cancelled_add && !registered {
            log::debug!("Cancelled queued add of {}", id);
            return false;
        }
        self.ops.push_back(PendingOp::Remove(id));
        true
    }

    /// Drop queued operations for an id
    pub fn purge(&mut self, id: &str) -> usize {
        let before = self.ops.len();
        self.ops.retain(|op| op.id().as_str() != id);
        before - self.ops.len()
    }

    /// Queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Up to `batch_size` operations in submission order
    ///
    /// Empty while the interval since the last drain has not elapsed.
    pub fn take_batch(&mut self, now_ms: f64, batch_size: usize) -> Vec<PendingOp> {
        if self.ops.is_empty() || !self.gate.try_pass(now_ms) {
            return Vec::new();
        }
        let take = batch_size.max(1).min(self.ops.len());
        self.ops.drain(..take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Anchor;

    #[test]
    fn test_remove_cancels_unregistered_add() {
        let mut queue = PendingQueue::new(16.0);
        queue.push_add(EntityRecord::point("a", Anchor::surface(0.0, 0.0)));
        queue.push_update(EntityId::from("a"), EntityUpdate::new().visible(false));
        assert!(!queue.push_remove(EntityId::from("a"), false));
        assert!(queue.is_empty());

        assert!(queue.push_remove(EntityId::from("b"), true));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_batches_are_gated_and_bounded() {
        let mut queue = PendingQueue::new(16.0);
        for id in ["a", "b", "c"] {
            queue.push_remove(EntityId::from(id), true);
        }
        let ids: Vec<_> = queue.take_batch(0.0, 2).iter().map(|op| op.id().clone()).collect();
        assert_eq!(ids, vec![EntityId::from("a"), EntityId::from("b")]);
        assert!(queue.take_batch(10.0, 2).is_empty());
        assert_eq!(queue.take_batch(16.0, 2).len(), 1);
    }
}
