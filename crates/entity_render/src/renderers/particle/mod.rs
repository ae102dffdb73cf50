//! Particle emitters backed by one fixed-capacity pool
//!
//! Every particle entity is an emitter at its anchor. Emission, fixed-step
//! integration and expiry all run against a single [`ParticlePool`] owned by
//! the family, so the number of live particles never exceeds the configured
//! capacity no matter how many emitters exist. Each frame the live particles
//! of an emitter are packed into its point cloud primitive.

pub mod pool;
pub mod presets;

pub use pool::{Particle, ParticlePool, ParticleSpawn};
pub use presets::{ParticlePreset, PresetParams};

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::config::ParticleConfig;
use crate::entity::{
    DetailMask, EntityRecord, EntityRegistry, Family, FamilyPayload, FamilyRenderer, FamilyStats, HandleBuilder,
    RenderContext, VisualHandle,
};
use crate::error::{RenderError, RenderResult};
use crate::foundation::math::{Anchor, Vec3};
use crate::foundation::time::FixedStepper;
use crate::host::{PrimitiveDesc, PrimitiveKind, PrimitivePatch};
use crate::selection::Highlight;

/// Material preset of the point clouds
const CLOUD_MATERIAL: &str = "glow";

/// Longest backlog of emission, in seconds, caught up in one tick
const MAX_EMISSION_BACKLOG_S: f64 = 0.25;

/// Per-particle vertex packed into the point cloud payload
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    /// Offset from the emitter origin in meters
    pub offset: [f32; 3],
    /// Sprite scale
    pub scale: f32,
    /// RGBA color
    pub color: [f32; 4],
}

impl ParticleVertex {
    fn from_particle(particle: &Particle, origin: &Vec3) -> Self {
        let offset = particle.position - origin;
        Self {
            offset: [offset.x as f32, offset.y as f32, offset.z as f32],
            scale: particle.scale as f32,
            color: particle.color.to_array(),
        }
    }
}

/// Emitter bound to one particle entity
#[derive(Debug, Clone)]
pub struct EmitterState {
    /// Pool tag of the emitter's particles
    pub id: u64,
    /// Effect parameters
    pub params: PresetParams,
    /// Particles per second
    pub rate: f64,
    /// Time of the last emission, once emission started
    pub last_emission_ms: Option<f64>,
    /// Emitter anchor
    pub anchor: Anchor,
    /// World position of the anchor
    pub origin: Vec3,
    /// World-space gravity plus wind
    pub acceleration: Vec3,
}

impl EmitterState {
    fn configure(&mut self, record: &EntityRecord, wind: [f64; 3]) -> RenderResult<()> {
        let (preset, rate_override) = match &record.payload {
            Some(FamilyPayload::Particle { preset, rate_override }) => (*preset, *rate_override),
            _ => return Err(RenderError::invalid(record.id.as_str(), "missing particle payload")),
        };
        let anchor = record
            .anchors
            .first()
            .copied()
            .ok_or_else(|| RenderError::invalid(record.id.as_str(), "missing anchor"))?;
        self.params = preset.params();
        self.rate = rate_override.unwrap_or(self.params.emission_rate);
        self.anchor = anchor;
        self.origin = anchor.world();
        let [gx, gy, gz] = self.params.gravity;
        self.acceleration = anchor.enu_to_world(Vec3::new(gx + wind[0], gy + wind[1], gz + wind[2]));
        Ok(())
    }

    /// Milliseconds between two emissions
    pub fn interval_ms(&self) -> f64 {
        1000.0 / self.rate
    }
}

/// Particle family: one emitter per entity, one shared pool
pub struct ParticleFamily {
    config: ParticleConfig,
    pool: ParticlePool,
    stepper: FixedStepper,
    rng: StdRng,
    next_emitter: u64,
    last_tick_ms: Option<f64>,
}

impl ParticleFamily {
    /// Create the family and allocate its pool
    pub fn new(config: ParticleConfig) -> Self {
        let rng = config.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        log::debug!("Particle pool allocated with {} slots", config.pool_capacity);
        Self {
            pool: ParticlePool::with_capacity(config.pool_capacity),
            stepper: FixedStepper::new(config.fixed_time_step, config.max_steps_per_frame),
            rng,
            next_emitter: 1,
            last_tick_ms: None,
            config,
        }
    }

    /// Shared pool
    pub const fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// Spawn due particles for an emitter; returns how many were emitted
    fn emit(&mut self, emitter: &mut EmitterState, now_ms: f64) -> usize {
        let Some(last) = emitter.last_emission_ms else {
            emitter.last_emission_ms = Some(now_ms);
            return 0;
        };
        let interval = emitter.interval_ms();
        let backlog = (now_ms - last).min(MAX_EMISSION_BACKLOG_S * 1000.0);
        let due = (backlog / interval).floor() as usize;
        if due == 0 {
            return 0;
        }
        emitter.last_emission_ms = Some(if now_ms - last > backlog {
            now_ms
        } else {
            last + due as f64 * interval
        });

        let mut emitted = 0;
        for _ in 0..due {
            let spawn = self.spawn_for(emitter);
            if self.pool.activate(&spawn).is_none() {
                log::debug!(
                    "Particle pool exhausted ({} slots), emitter {} skipped {} particles",
                    self.pool.capacity(),
                    emitter.id,
                    due - emitted
                );
                break;
            }
            emitted += 1;
        }
        emitted
    }

    fn spawn_for(&mut self, emitter: &EmitterState) -> ParticleSpawn {
        let params = &emitter.params;
        let rng = &mut self.rng;
        let jitter = Vec3::new(
            rng.gen_range(-1.0_f64..=1.0) * params.radius,
            rng.gen_range(-1.0_f64..=1.0) * params.radius,
            0.0,
        );
        let vertical = if params.rise == 0.0 {
            rng.gen_range(-1.0_f64..=1.0)
        } else {
            params.rise
        };
        let direction = Vec3::new(
            rng.gen_range(-1.0_f64..=1.0) * params.spread,
            rng.gen_range(-1.0_f64..=1.0) * params.spread,
            vertical,
        );
        let direction = direction.try_normalize(f64::EPSILON).unwrap_or_else(Vec3::z);
        let max_age = if params.max_life > params.min_life {
            rng.gen_range(params.min_life..params.max_life)
        } else {
            params.min_life
        };
        ParticleSpawn {
            position: emitter.origin + emitter.anchor.enu_to_world(jitter),
            velocity: emitter.anchor.enu_to_world(direction * params.speed),
            acceleration: emitter.acceleration,
            max_age,
            scale: (params.start_scale, params.end_scale),
            color: (params.start_color, params.end_color),
            emitter: emitter.id,
        }
    }
}

fn cloud(ctx: &RenderContext<'_>, record: &EntityRecord, origin: Vec3) -> PrimitiveDesc {
    PrimitiveDesc::new(PrimitiveKind::PointCloud, ctx.material(&record.style, CLOUD_MATERIAL))
        .at(origin)
        .with_data(Vec::new(), 0)
}

#[async_trait(?Send)]
impl FamilyRenderer for ParticleFamily {
    type State = EmitterState;

    const FAMILY: Family = Family::Particle;

    async fn build(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
    ) -> RenderResult<(VisualHandle, EmitterState)> {
        let mut state = EmitterState {
            id: self.next_emitter,
            params: ParticlePreset::Fire.params(),
            rate: 0.0,
            last_emission_ms: None,
            anchor: Anchor::surface(0.0, 0.0),
            origin: Vec3::zeros(),
            acceleration: Vec3::zeros(),
        };
        state.configure(record, self.config.wind)?;
        self.next_emitter += 1;

        let mut builder = HandleBuilder::new(ctx.host);
        builder.create(DetailMask::PRIMARY, cloud(ctx, record, state.origin))?;
        Ok((builder.finish(), state))
    }

    fn refresh(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &mut VisualHandle,
        state: &mut EmitterState,
    ) -> RenderResult<()> {
        state.configure(record, self.config.wind)?;
        let patch = PrimitivePatch::new()
            .positions(vec![state.origin])
            .material(ctx.material(&record.style, CLOUD_MATERIAL));
        handle.patch(ctx.host, DetailMask::PRIMARY, patch)?;
        Ok(())
    }

    fn release(&mut self, _ctx: &RenderContext<'_>, _record: &EntityRecord, state: EmitterState) {
        let freed = self.pool.release_where(|p| p.emitter == state.id);
        log::trace!("Emitter {} released {} particles", state.id, freed);
    }

    fn detail_mask(&self, level: usize, highest: usize) -> DetailMask {
        if level >= highest {
            DetailMask::empty()
        } else {
            DetailMask::all()
        }
    }

    fn tick(
        &mut self,
        ctx: &RenderContext<'_>,
        registry: &mut EntityRegistry<EmitterState>,
        now_ms: f64,
    ) -> RenderResult<()> {
        let dt = self.last_tick_ms.map_or(0.0, |last| (now_ms - last).max(0.0) / 1000.0);
        self.last_tick_ms = Some(now_ms);

        for (_, entry) in registry.iter_mut() {
            if entry.is_visible() {
                self.emit(&mut entry.state, now_ms);
            }
        }

        let steps = self.stepper.advance(dt);
        let step = self.stepper.step();
        let mut expired = 0;
        for _ in 0..steps {
            expired += self.pool.step(step, self.config.physics_enabled);
        }
        if expired > 0 {
            log::trace!("{} particles expired", expired);
        }

        let origins: HashMap<u64, Vec3> = registry.iter().map(|(_, e)| (e.state.id, e.state.origin)).collect();
        let mut packed: HashMap<u64, Vec<ParticleVertex>> = HashMap::new();
        for particle in self.pool.iter_active() {
            if let Some(origin) = origins.get(&particle.emitter) {
                packed
                    .entry(particle.emitter)
                    .or_default()
                    .push(ParticleVertex::from_particle(particle, origin));
            }
        }

        for (_, entry) in registry.iter() {
            let vertices = packed.remove(&entry.state.id).unwrap_or_default();
            let count = vertices.len();
            let data = bytemuck::cast_slice::<ParticleVertex, u8>(&vertices).to_vec();
            entry
                .handle
                .patch(ctx.host, DetailMask::PRIMARY, PrimitivePatch::new().data(data, count))?;
        }
        Ok(())
    }

    fn apply_highlight(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &VisualHandle,
        _state: &EmitterState,
        highlight: Highlight,
    ) -> RenderResult<()> {
        let material = ctx.highlighted(&ctx.material(&record.style, CLOUD_MATERIAL), highlight);
        handle.patch(ctx.host, DetailMask::PRIMARY, PrimitivePatch::new().material(material))?;
        Ok(())
    }

    fn stats(&self, registry: &EntityRegistry<EmitterState>) -> FamilyStats {
        FamilyStats::Particle {
            active: self.pool.active_count(),
            capacity: self.pool.capacity(),
            emitters: registry.len(),
        }
    }

    fn animating(&self, registry: &EntityRegistry<EmitterState>) -> usize {
        let emitting: HashSet<u64> = self.pool.iter_active().map(|p| p.emitter).collect();
        registry
            .iter()
            .filter(|(_, entry)| emitting.contains(&entry.state.id))
            .count()
    }
}
