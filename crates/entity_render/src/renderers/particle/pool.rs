//! Fixed-capacity particle pool
//!
//! All particles are allocated when the pool is created. Emission pulls a
//! slot from the free list and overwrites every field; expiry returns the
//! slot. Slots are never allocated or freed individually afterwards.

use crate::foundation::math::{Color, Vec3};

/// Pooled particle record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// World position
    pub position: Vec3,
    /// Velocity in meters per second
    pub velocity: Vec3,
    /// Constant acceleration (gravity plus wind)
    pub acceleration: Vec3,
    /// Seconds since emission
    pub age: f64,
    /// Life span in seconds
    pub max_age: f64,
    /// Current scale
    pub scale: f64,
    /// Current color
    pub color: Color,
    /// Emitter that owns the particle
    pub emitter: u64,
    /// Whether the slot is in use
    pub active: bool,
    start_scale: f64,
    end_scale: f64,
    start_color: Color,
    end_color: Color,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            velocity: Vec3::zeros(),
            acceleration: Vec3::zeros(),
            age: 0.0,
            max_age: 0.0,
            scale: 0.0,
            color: Color::WHITE.with_alpha(0.0),
            emitter: 0,
            active: false,
            start_scale: 0.0,
            end_scale: 0.0,
            start_color: Color::WHITE,
            end_color: Color::WHITE,
        }
    }
}

impl Particle {
    /// Fraction of the life span used, `[0, 1]`
    pub fn life_fraction(&self) -> f64 {
        if self.max_age > 0.0 {
            (self.age / self.max_age).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Initial values of an emitted particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSpawn {
    /// World position
    pub position: Vec3,
    /// Velocity in meters per second
    pub velocity: Vec3,
    /// Constant acceleration
    pub acceleration: Vec3,
    /// Life span in seconds
    pub max_age: f64,
    /// Scale at birth and death
    pub scale: (f64, f64),
    /// Color at birth and death
    pub color: (Color, Color),
    /// Owning emitter
    pub emitter: u64,
}

/// Fixed-capacity pool with a free list
pub struct ParticlePool {
    particles: Vec<Particle>,
    free: Vec<usize>,
    active: Vec<usize>,
}

impl ParticlePool {
    /// Allocate `capacity` inactive particles
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            particles: vec![Particle::default(); capacity],
            free: (0..capacity).rev().collect(),
            active: Vec::with_capacity(capacity),
        }
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    /// Particles in use
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Slots on the free list
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Whether every slot is in use
    pub fn is_exhausted(&self) -> bool {
        self.free.is_empty()
    }

    /// Particle in a slot
    pub fn get(&self, slot: usize) -> Option<&Particle> {
        self.particles.get(slot)
    }

    /// Take a free slot and initialize it; `None` when exhausted
    pub fn activate(&mut self, spawn: &ParticleSpawn) -> Option<usize> {
        let slot = self.free.pop()?;
        let particle = &mut self.particles[slot];
        *particle = Particle {
            position: spawn.position,
            velocity: spawn.velocity,
            acceleration: spawn.acceleration,
            age: 0.0,
            max_age: spawn.max_age,
            scale: spawn.scale.0,
            color: spawn.color.0,
            emitter: spawn.emitter,
            active: false,
            start_scale: spawn.scale.0,
            end_scale: spawn.scale.1,
            start_color: spawn.color.0,
            end_color: spawn.color.1,
        };
        particle.active = true;
        self.active.push(slot);
        Some(slot)
    }

    /// Return a slot to the free list; `false` if it was not active
    pub fn release(&mut self, slot: usize) -> bool {
        match self.particles.get_mut(slot) {
            Some(particle) if particle.active => particle.active = false,
            _ => return false,
        }
        if let Some(index) = self.active.iter().position(|s| *s == slot) {
            self.active.swap_remove(index);
        }
        self.free.push(slot);
        true
    }

    /// Release every active particle matching `predicate`
    pub fn release_where(&mut self, predicate: impl Fn(&Particle) -> bool) -> usize {
        let doomed: Vec<usize> = self
            .active
            .iter()
            .copied()
            .filter(|slot| predicate(&self.particles[*slot]))
            .collect();
        doomed.into_iter().filter(|slot| self.release(*slot)).count()
    }

    /// Age every particle by `dt`, integrating motion when `physics` is on
    ///
    /// Returns the number of particles that expired.
    pub fn step(&mut self, dt: f64, physics: bool) -> usize {
        let mut expired = Vec::new();
        for slot in &self.active {
            let particle = &mut self.particles[*slot];
            particle.age += dt;
            if particle.age >= particle.max_age {
                expired.push(*slot);
                continue;
            }
            if physics {
                particle.velocity += particle.acceleration * dt;
                particle.position += particle.velocity * dt;
            }
            let t = particle.life_fraction();
            particle.scale = particle.start_scale + (particle.end_scale - particle.start_scale) * t;
            particle.color = particle.start_color.lerp(particle.end_color, t as f32);
        }
        let count = expired.len();
        for slot in expired {
            self.release(slot);
        }
        count
    }

    /// Active particles
    pub fn iter_active(&self) -> impl Iterator<Item = &Particle> {
        self.active.iter().map(|slot| &self.particles[*slot])
    }

    /// How many times a slot appears on the free list
    pub fn free_occurrences(&self, slot: usize) -> usize {
        self.free.iter().filter(|s| **s == slot).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::time::FixedStepper;

    fn spawn(max_age: f64, emitter: u64) -> ParticleSpawn {
        ParticleSpawn {
            position: Vec3::zeros(),
            velocity: Vec3::new(0.0, 0.0, 1.0),
            acceleration: Vec3::new(0.0, 0.0, -9.81),
            max_age,
            scale: (1.0, 0.0),
            color: (Color::WHITE, Color::GREY),
            emitter,
        }
    }

    #[test]
    fn test_active_never_exceeds_capacity() {
        let mut pool = ParticlePool::with_capacity(4);
        let taken = (0..10).filter_map(|_| pool.activate(&spawn(1.0, 1))).count();
        assert_eq!(taken, 4);
        assert_eq!(pool.active_count(), 4);
        assert!(pool.is_exhausted());
    }

    #[test]
    fn test_particle_lifecycle() {
        let mut pool = ParticlePool::with_capacity(8);
        let mut stepper = FixedStepper::new(1.0 / 60.0, 1_000);
        let slot = pool.activate(&spawn(1.0, 1)).unwrap();

        for _ in 0..stepper.advance(0.5) {
            pool.step(stepper.step(), true);
        }
        assert!(pool.get(slot).unwrap().active);

        for _ in 0..stepper.advance(0.6) {
            pool.step(stepper.step(), true);
        }
        assert!(!pool.get(slot).unwrap().active);
        assert_eq!(pool.free_occurrences(slot), 1);
        assert_eq!(pool.free_count(), 8);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_recycled_particle_is_fully_reset() {
        let mut pool = ParticlePool::with_capacity(1);
        let slot = pool.activate(&spawn(0.1, 1)).unwrap();
        for _ in 0..3 {
            pool.step(0.05, true);
        }
        assert!(!pool.get(slot).unwrap().active);

        let mut fresh = spawn(2.0, 7);
        fresh.position = Vec3::new(5.0, 5.0, 5.0);
        let again = pool.activate(&fresh).unwrap();
        assert_eq!(again, slot);
        let particle = pool.get(again).unwrap();
        assert!(particle.active);
        assert!(particle.age.abs() < f64::EPSILON);
        assert_eq!(particle.emitter, 7);
        assert_eq!(particle.position, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(particle.velocity, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_double_release_is_ignored() {
        let mut pool = ParticlePool::with_capacity(2);
        let slot = pool.activate(&spawn(1.0, 1)).unwrap();
        assert!(pool.release(slot));
        assert!(!pool.release(slot));
        assert_eq!(pool.free_occurrences(slot), 1);
    }

    #[test]
    fn test_release_where_frees_one_emitter() {
        let mut pool = ParticlePool::with_capacity(6);
        for emitter in [1, 1, 2, 2, 2] {
            pool.activate(&spawn(1.0, emitter));
        }
        assert_eq!(pool.release_where(|p| p.emitter == 2), 3);
        assert_eq!(pool.active_count(), 2);
        assert!(pool.iter_active().all(|p| p.emitter == 1));
    }
}
