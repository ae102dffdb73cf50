//! Animation scheduler
//!
//! Runs on the host's frame callback but throttled to its own frame rate, so
//! flow and particle speed do not depend on how often the host renders. Each
//! tick advances every registered state by `speed * fixed_step`.

use crate::core::AnimationConfig;
use crate::foundation::collections::{EntityKey, SecondaryMap};
use crate::foundation::math::{lerp, Vec3};
use crate::foundation::time::IntervalGate;

/// Frame callbacks may arrive slightly early; accept them within this margin
const FRAME_TOLERANCE_MS: f64 = 1.0;

/// Per-entity animation progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    /// Position along the animation, `[0, 1]`
    pub progress: f64,
    /// Progress per second
    pub speed: f64,
    /// Start point
    pub source: Vec3,
    /// End point
    pub target: Vec3,
    /// Wrap to 0 at the end instead of halting
    pub looping: bool,
}

impl AnimationState {
    /// Looping animation from `source` to `target`
    pub const fn new(source: Vec3, target: Vec3, speed: f64) -> Self {
        Self {
            progress: 0.0,
            speed,
            source,
            target,
            looping: true,
        }
    }

    /// Halt at the end instead of wrapping
    pub const fn once(mut self) -> Self {
        self.looping = false;
        self
    }

    /// Interpolated point between source and target
    pub fn position(&self) -> Vec3 {
        lerp(&self.source, &self.target, self.progress)
    }

    /// Whether a non-looping animation reached its end
    pub fn is_finished(&self) -> bool {
        !self.looping && self.progress >= 1.0
    }

    /// Advance by one step of `step` seconds
    pub fn advance(&mut self, step: f64) {
        if self.is_finished() {
            return;
        }
        self.progress += self.speed * step;
        if self.progress >= 1.0 {
            self.progress = if self.looping { 0.0 } else { 1.0 };
        }
    }
}

/// Tick loop state of one renderer
pub struct AnimationScheduler {
    states: SecondaryMap<EntityKey, AnimationState>,
    gate: IntervalGate,
    fixed_step: f64,
    running: bool,
    ticks: u64,
}

impl AnimationScheduler {
    /// Create a stopped scheduler
    pub fn new(config: &AnimationConfig) -> Self {
        Self {
            states: SecondaryMap::new(),
            gate: IntervalGate::new(config.frame_interval_ms()),
            fixed_step: config.fixed_step,
            running: false,
            ticks: 0,
        }
    }

    /// Register an animation, replacing any previous one
    pub fn register(&mut self, key: EntityKey, state: AnimationState) {
        self.states.insert(key, state);
    }

    /// Replace an animation's parameters but keep its progress
    pub fn update(&mut self, key: EntityKey, state: AnimationState) {
        let progress = self.states.get(key).map_or(0.0, |s| s.progress);
        self.states.insert(key, AnimationState { progress, ..state });
    }

    /// Drop an animation
    pub fn unregister(&mut self, key: EntityKey) -> Option<AnimationState> {
        self.states.remove(key)
    }

    /// Animation of an entity
    pub fn get(&self, key: EntityKey) -> Option<&AnimationState> {
        self.states.get(key)
    }

    /// Start the loop; every animation restarts at progress 0
    pub fn start(&mut self) {
        for state in self.states.values_mut() {
            state.progress = 0.0;
        }
        self.gate.reset();
        self.running = true;
    }

    /// Stop the loop
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the loop is running
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a frame callback at `now_ms` should advance the animations
    pub fn should_tick(&self, now_ms: f64) -> bool {
        self.running && self.gate.ready(now_ms + FRAME_TOLERANCE_MS)
    }

    /// Advance every animation when a tick is due; returns the new states
    pub fn tick(&mut self, now_ms: f64) -> Option<Vec<(EntityKey, AnimationState)>> {
        if !self.should_tick(now_ms) {
            return None;
        }
        self.gate.mark(now_ms);
        self.ticks += 1;
        let step = self.fixed_step;
        Some(
            self.states
                .iter_mut()
                .filter(|(_, state)| !state.is_finished())
                .map(|(key, state)| {
                    state.advance(step);
                    (key, *state)
                })
                .collect(),
        )
    }

    /// Animations still moving
    pub fn animating_count(&self) -> usize {
        if !self.running {
            return 0;
        }
        self.states.values().filter(|s| !s.is_finished()).count()
    }

    /// Ticks performed since creation
    pub const fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Drop every animation
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::EntityArena;
    use approx::assert_relative_eq;

    fn key() -> EntityKey {
        let mut arena: EntityArena<()> = EntityArena::with_key();
        arena.insert(())
    }

    #[test]
    fn test_progress_wraps_when_looping() {
        let mut state = AnimationState::new(Vec3::zeros(), Vec3::x(), 0.6);
        state.advance(1.0);
        assert_relative_eq!(state.progress, 0.6);
        state.advance(1.0);
        assert_relative_eq!(state.progress, 0.0);
    }

    #[test]
    fn test_non_looping_halts() {
        let mut state = AnimationState::new(Vec3::zeros(), Vec3::x(), 0.6).once();
        state.advance(1.0);
        state.advance(1.0);
        assert!(state.is_finished());
        assert_relative_eq!(state.position(), Vec3::x());
    }

    #[test]
    fn test_tick_is_throttled_to_frame_rate() {
        let mut scheduler = AnimationScheduler::new(&AnimationConfig::default().with_target_fps(10));
        let k = key();
        scheduler.register(k, AnimationState::new(Vec3::zeros(), Vec3::x(), 1.0));
        assert!(scheduler.tick(0.0).is_none());
        scheduler.start();
        assert_eq!(scheduler.tick(0.0).unwrap().len(), 1);
        assert!(scheduler.tick(50.0).is_none());
        assert!(scheduler.tick(99.5).is_some());
        assert_eq!(scheduler.tick_count(), 2);
    }

    #[test]
    fn test_restart_resets_progress() {
        let mut scheduler = AnimationScheduler::new(&AnimationConfig::default());
        let k = key();
        scheduler.register(k, AnimationState::new(Vec3::zeros(), Vec3::x(), 1.0));
        scheduler.start();
        scheduler.tick(0.0);
        assert!(scheduler.get(k).unwrap().progress > 0.0);
        scheduler.stop();
        assert_eq!(scheduler.animating_count(), 0);
        scheduler.start();
        assert_relative_eq!(scheduler.get(k).unwrap().progress, 0.0);
        scheduler.update(k, AnimationState::new(Vec3::zeros(), Vec3::y(), 2.0));
        assert_relative_eq!(scheduler.get(k).unwrap().speed, 2.0);
    }
}
