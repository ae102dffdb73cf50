//! # Core Module
//!
//! Shared configuration used by every renderer and by the factory.

pub mod config;

pub use config::{
    AnimationConfig, Config, ConfigError, ContractConfig, FactoryConfig, LodConfig,
    ParticleConfig, RendererConfig, TrajectoryConfig,
};
