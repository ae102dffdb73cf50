//! # Unified Configuration System
//!
//! All tunables of the entity layer in one serializable tree. Every struct
//! carries defaults, builder methods and a `validate()` pass, and the
//! aggregate [`RendererConfig`] loads from `.toml` or `.ron` files.
//!
//! ## Configuration Categories
//!
//! - **Contract**: batching interval/size, culling distance
//! - **LOD**: distance thresholds, sweep and debounce timing
//! - **Animation**: frame-rate cap and fixed step
//! - **Factory**: strategy thresholds, style cache capacity
//! - **Particle**: pool capacity and physics stepping
//! - **Trajectory**: time-segmentation window

use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # Entity Contract Configuration
///
/// Shared by every renderer: how often the pending queue and the culling
/// pass may run, and how many records one batch may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Minimum milliseconds between queue processing / culling passes
    pub update_interval_ms: f64,
    /// Records processed per batch before yielding
    pub batch_size: usize,
    /// Culling distance for entities that do not set their own
    pub default_max_distance: f64,
}

impl ContractConfig {
    /// Create the default contract configuration
    pub const fn new() -> Self {
        Self {
            update_interval_ms: 16.0,
            batch_size: 100,
            default_max_distance: 2.0e7,
        }
    }

    /// Set the batch size
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the update interval
    pub const fn with_update_interval(mut self, interval_ms: f64) -> Self {
        self.update_interval_ms = interval_ms;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch size must be at least 1".to_string()));
        }
        if !(self.update_interval_ms >= 0.0) {
            return Err(ConfigError::Invalid("update interval must be non-negative".to_string()));
        }
        if !(self.default_max_distance > 0.0) {
            return Err(ConfigError::Invalid("default max distance must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Level-of-Detail Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Ascending camera-distance cutoffs in meters
    pub thresholds: Vec<f64>,
    /// Minimum milliseconds between fallback sweeps
    pub sweep_interval_ms: f64,
    /// Quiet period after a camera change before re-evaluating
    pub debounce_ms: f64,
}

impl LodConfig {
    /// Create the default LOD configuration
    pub fn new() -> Self {
        Self {
            thresholds: vec![50_000.0, 250_000.0, 1_500_000.0],
            sweep_interval_ms: 200.0,
            debounce_ms: 100.0,
        }
    }

    /// Replace the threshold table
    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thresholds.is_empty() {
            return Err(ConfigError::Invalid("LOD threshold table is empty".to_string()));
        }
        if self.thresholds.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ConfigError::Invalid("LOD thresholds must be finite and non-negative".to_string()));
        }
        if self.thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid("LOD thresholds must be strictly ascending".to_string()));
        }
        if self.sweep_interval_ms < 0.0 || self.debounce_ms < 0.0 {
            return Err(ConfigError::Invalid("LOD timings must be non-negative".to_string()));
        }
        Ok(())
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Animation Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Frame-rate cap of the animation loop
    pub target_fps: u32,
    /// Step (seconds) applied to every animation per tick
    pub fixed_step: f64,
}

impl AnimationConfig {
    /// Create the default animation configuration
    pub const fn new() -> Self {
        Self {
            target_fps: 60,
            fixed_step: 1.0 / 60.0,
        }
    }

    /// Set the frame-rate cap
    pub const fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Milliseconds between ticks at the target frame rate
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / f64::from(self.target_fps.max(1))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 || self.target_fps > 240 {
            return Err(ConfigError::Invalid("target fps must be within 1..=240".to_string()));
        }
        if !(self.fixed_step > 0.0) {
            return Err(ConfigError::Invalid("animation step must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Renderer Factory Configuration
///
/// The strategy thresholds are plain constants here; small submissions do
/// not amortize the setup cost of instancing or batching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Minimum submission size for the instanced path
    pub instancing_min_entities: usize,
    /// Minimum submission size for the batched path
    pub batching_min_entities: usize,
    /// Batch size used by batched renderers
    pub batched_batch_size: usize,
    /// Capacity of the shared style cache
    pub style_cache_capacity: usize,
}

impl FactoryConfig {
    /// Create the default factory configuration
    pub const fn new() -> Self {
        Self {
            instancing_min_entities: 5,
            batching_min_entities: 10,
            batched_batch_size: 500,
            style_cache_capacity: 256,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instancing_min_entities == 0 || self.batching_min_entities == 0 {
            return Err(ConfigError::Invalid("strategy thresholds must be at least 1".to_string()));
        }
        if self.batched_batch_size == 0 {
            return Err(ConfigError::Invalid("batched batch size must be at least 1".to_string()));
        }
        if self.style_cache_capacity == 0 {
            return Err(ConfigError::Invalid("style cache capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Particle Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Fixed number of pooled particles
    pub pool_capacity: usize,
    /// Physics step in seconds
    pub fixed_time_step: f64,
    /// Whether gravity/wind integration runs
    pub physics_enabled: bool,
    /// Wind acceleration in east-north-up meters per second squared
    pub wind: [f64; 3],
    /// Upper bound on physics steps per frame
    pub max_steps_per_frame: usize,
    /// Seed for emission randomness; entropy when absent
    pub seed: Option<u64>,
}

impl ParticleConfig {
    /// Create the default particle configuration
    pub const fn new() -> Self {
        Self {
            pool_capacity: 2000,
            fixed_time_step: 1.0 / 60.0,
            physics_enabled: true,
            wind: [0.0, 0.0, 0.0],
            max_steps_per_frame: 8,
            seed: None,
        }
    }

    /// Set the pool capacity
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Set a deterministic seed
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::Invalid("particle pool capacity must be at least 1".to_string()));
        }
        if !(self.fixed_time_step > 0.0) {
            return Err(ConfigError::Invalid("particle time step must be positive".to_string()));
        }
        if self.max_steps_per_frame == 0 {
            return Err(ConfigError::Invalid("max steps per frame must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Trajectory Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Samples within this many seconds of the clock count as "current"
    pub current_window_s: f64,
    /// Progress per second of the head marker on untimed paths
    pub head_speed: f64,
}

impl TrajectoryConfig {
    /// Create the default trajectory configuration
    pub const fn new() -> Self {
        Self {
            current_window_s: 60.0,
            head_speed: 0.1,
        }
    }
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Renderer Configuration
///
/// Top-level configuration that encompasses all subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Log level used by `logging::init_with_level`
    pub log_level: String,
    /// Entity contract settings
    pub contract: ContractConfig,
    /// LOD settings
    pub lod: LodConfig,
    /// Animation loop settings
    pub animation: AnimationConfig,
    /// Factory settings
    pub factory: FactoryConfig,
    /// Particle settings
    pub particle: ParticleConfig,
    /// Trajectory settings
    pub trajectory: TrajectoryConfig,
}

impl RendererConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            contract: ContractConfig::default(),
            lod: LodConfig::default(),
            animation: AnimationConfig::default(),
            factory: FactoryConfig::default(),
            particle: ParticleConfig::default(),
            trajectory: TrajectoryConfig::default(),
        }
    }

    /// Replace the LOD configuration
    pub fn with_lod(mut self, lod: LodConfig) -> Self {
        self.lod = lod;
        self
    }

    /// Replace the contract configuration
    pub fn with_contract(mut self, contract: ContractConfig) -> Self {
        self.contract = contract;
        self
    }

    /// Replace the particle configuration
    pub fn with_particle(mut self, particle: ParticleConfig) -> Self {
        self.particle = particle;
        self
    }

    /// Replace the factory configuration
    pub fn with_factory(mut self, factory: FactoryConfig) -> Self {
        self.factory = factory;
        self
    }

    /// Copy of this configuration tuned for the batched strategy
    pub fn batched(&self) -> Self {
        let mut config = self.clone();
        config.contract.batch_size = self.factory.batched_batch_size;
        config
    }

    /// Stable signature of this configuration, used as a cache key
    pub fn signature(&self) -> Result<String, ConfigError> {
        ron::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.contract.validate()?;
        self.lod.validate()?;
        self.animation.validate()?;
        self.factory.validate()?;
        self.particle.validate()?;
        if !(self.trajectory.current_window_s >= 0.0) {
            return Err(ConfigError::Invalid("trajectory window must be non-negative".to_string()));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RendererConfig {}
