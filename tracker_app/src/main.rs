//! Headless tracker demo
//!
//! Submits a mixed fleet of tracked entities through the renderer factory,
//! flies the camera out and back for a number of simulated frames and logs
//! the resulting statistics.
//!
//! Usage: `tracker_demo [config.toml|config.ron]`

use std::rc::Rc;

use entity_render::factory::RendererFactory;
use entity_render::foundation::logging;
use entity_render::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Fleet configuration
const BASE_LON: f64 = 12.5;
const BASE_LAT: f64 = 41.9;
const NUM_TARGETS: usize = 40; // above the instancing threshold
const NUM_TRACKS: usize = 6;
const SAMPLES_PER_TRACK: usize = 8;
const NUM_LINKS: usize = 4;
const FRAMES: usize = 600;
const FRAME_MS: f64 = 1000.0 / 60.0;
const MAX_ALTITUDE_M: f64 = 2_000_000.0;

struct TrackerApp {
    host: Rc<HeadlessHost>,
    factory: RendererFactory,
    rng: StdRng,
    target_strategy: Strategy,
}

impl TrackerApp {
    fn new(config: RendererConfig) -> Result<Self, RenderError> {
        let host = Rc::new(HeadlessHost::new());
        host.with_clock(|clock| {
            clock.set_rate(30.0);
            clock.play();
        });
        let factory = RendererFactory::new(host.clone(), config)?;
        Ok(Self {
            host,
            factory,
            rng: StdRng::seed_from_u64(42),
            target_strategy: Strategy::Direct,
        })
    }

    fn scatter(&mut self, spread: f64) -> Anchor {
        Anchor::surface(
            BASE_LON + self.rng.gen_range(-spread..=spread),
            BASE_LAT + self.rng.gen_range(-spread..=spread),
        )
    }

    fn targets(&mut self) -> Vec<EntityRecord> {
        (0..NUM_TARGETS)
            .map(|i| {
                EntityRecord::point(format!("target-{i}"), self.scatter(0.5))
                    .with_style(StyleOverrides::default().with_geometry("box"))
            })
            .collect()
    }

    fn tracks(&mut self) -> Vec<EntityRecord> {
        (0..NUM_TRACKS)
            .map(|i| {
                let start = self.scatter(0.3);
                let heading = self.rng.gen_range(0.0..std::f64::consts::TAU);
                let anchors: Vec<Anchor> = (0..SAMPLES_PER_TRACK)
                    .map(|s| {
                        let d = 0.02 * s as f64;
                        Anchor::new(start.lon + d * heading.cos(), start.lat + d * heading.sin(), 9_000.0)
                    })
                    .collect();
                let times = (0..SAMPLES_PER_TRACK).map(|s| 60.0 * s as f64).collect();
                EntityRecord::trajectory(format!("track-{i}"), anchors).with_payload(FamilyPayload::Trajectory {
                    times,
                    label: Some(format!("TRK{i:02}")),
                    show_endpoints: true,
                })
            })
            .collect()
    }

    fn links(&mut self) -> Vec<EntityRecord> {
        (0..NUM_LINKS)
            .map(|i| {
                let (source, target) = (self.scatter(0.4), self.scatter(0.4));
                EntityRecord::relationship(format!("link-{i}"), source, target).with_payload(
                    FamilyPayload::Relationship {
                        label: None,
                        arc_height: 20_000.0,
                        show_arrow: true,
                        flow_speed: 0.5,
                    },
                )
            })
            .collect()
    }

    fn effects(&mut self) -> Vec<EntityRecord> {
        ParticlePreset::ALL
            .into_iter()
            .map(|preset| EntityRecord::particle(format!("fx-{preset}"), self.scatter(0.2), preset))
            .collect()
    }

    async fn submit(&mut self) -> Result<(), RenderError> {
        let batches = [
            (Family::Point, self.targets()),
            (Family::Trajectory, self.tracks()),
            (Family::Relationship, self.links()),
            (Family::Particle, self.effects()),
        ];
        for (family, records) in batches {
            let submitted = records.len();
            if family == Family::Point {
                self.target_strategy = self.factory.select_strategy(family, &records)?;
            }
            let outcome = self.factory.render(family, records, RenderOptions::default()).await?;
            log::info!(
                "Rendered {}/{} {} entities in {:.2} ms",
                outcome.count,
                submitted,
                family,
                outcome.render_time_ms
            );
        }
        Ok(())
    }

    /// Camera altitude for a frame: out to the highest LOD level and back
    fn altitude(frame: usize) -> f64 {
        let phase = frame as f64 / FRAMES as f64 * std::f64::consts::TAU;
        5_000.0 + MAX_ALTITUDE_M * 0.5 * (1.0 - phase.cos())
    }

    /// Queue a position update for one target; drained by the frame loop
    fn nudge_target(&mut self, frame: usize) -> Result<(), RenderError> {
        let id = EntityId::from(format!("target-{}", frame / 60 % NUM_TARGETS));
        let anchor = self.scatter(0.5);
        self.factory
            .renderer(Family::Point, self.target_strategy)?
            .enqueue_update(id, EntityUpdate::new().anchors(vec![anchor]));
        Ok(())
    }

    async fn run(&mut self) -> Result<(), RenderError> {
        let mut now = 0.0;
        for frame in 0..FRAMES {
            now += FRAME_MS;
            if frame % 10 == 0 {
                let camera = Anchor::new(BASE_LON, BASE_LAT, Self::altitude(frame));
                self.host.set_camera_position(camera.world());
                self.factory.on_camera_changed(now);
                self.factory.on_camera_settled(now)?;
            }
            if frame % 60 == 0 {
                self.nudge_target(frame)?;
            }
            self.factory.process_pending(now).await?;
            let time = self.host.with_clock(|clock| clock.advance(FRAME_MS / 1000.0));
            self.factory.on_clock_tick(time)?;
            self.factory.on_pre_render(now)?;
            self.factory.on_animation_frame(now)?;

            if frame % 120 == 0 {
                log::info!(
                    "Frame {}: camera at {:.0} m, {} of {} primitives visible",
                    frame,
                    Self::altitude(frame),
                    self.host.visible_count(),
                    self.host.primitive_count()
                );
            }
        }
        Ok(())
    }

    fn report(&self) {
        let stats = self.factory.stats();
        log::info!(
            "Factory: {} calls, {} entities ({} batched, {} instanced), {} failed, avg {:.2} ms",
            stats.render_calls,
            stats.total_entities,
            stats.batched_entities,
            stats.instanced_entities,
            stats.failed_calls,
            stats.average_render_ms()
        );
        for (family, strategy, renderer) in self.factory.renderer_stats() {
            log::info!(
                "{} ({}): {} entities, {} visible, {} animating, {:?}",
                family,
                strategy,
                renderer.total_entities,
                renderer.visible_entities,
                renderer.animating_entities,
                renderer.family
            );
        }
        let styles = self.factory.services().styles.stats();
        log::info!(
            "Style cache: {} entries, {} hits, {} misses",
            styles.entries,
            styles.hits,
            styles.misses
        );
    }
}

fn load_config() -> RendererConfig {
    match std::env::args().nth(1) {
        Some(path) => match RendererConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}; using defaults");
                RendererConfig::default()
            }
        },
        None => RendererConfig::default(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();
    logging::init_with_level(&config.log_level);
    log::info!("Starting tracker demo");

    let mut app = TrackerApp::new(config)?;
    app.submit().await?;

    log::info!("Running {} frames...", FRAMES);
    app.run().await?;
    app.report();

    app.factory.destroy_all()?;
    log::info!("Tracker demo finished");
    Ok(())
}
