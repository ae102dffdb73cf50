//! Named particle effect presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::foundation::math::Color;

/// Selectable particle effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticlePreset {
    /// Rising flame
    Fire,
    /// Slow drifting plume
    Smoke,
    /// Fast falling streaks
    Rain,
    /// Slow falling flakes
    Snow,
    /// Short radial burst
    Explosion,
}

/// Parameters bundled by a preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetParams {
    /// Particles per second
    pub emission_rate: f64,
    /// Shortest life span in seconds
    pub min_life: f64,
    /// Longest life span in seconds
    pub max_life: f64,
    /// Initial speed in meters per second
    pub speed: f64,
    /// Horizontal spread of the initial direction, `0` straight, `1` any
    pub spread: f64,
    /// Vertical component of the initial direction
    pub rise: f64,
    /// Spawn jitter radius in meters
    pub radius: f64,
    /// Color at birth
    pub start_color: Color,
    /// Color at death
    pub end_color: Color,
    /// Scale at birth
    pub start_scale: f64,
    /// Scale at death
    pub end_scale: f64,
    /// Gravity in east-north-up meters per second squared
    pub gravity: [f64; 3],
}

impl ParticlePreset {
    /// Every preset
    pub const ALL: [Self; 5] = [Self::Fire, Self::Smoke, Self::Rain, Self::Snow, Self::Explosion];

    /// Preset name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fire => "fire",
            Self::Smoke => "smoke",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Explosion => "explosion",
        }
    }

    /// Parameters of the preset
    pub const fn params(self) -> PresetParams {
        match self {
            Self::Fire => PresetParams {
                emission_rate: 60.0,
                min_life: 0.6,
                max_life: 1.2,
                speed: 6.0,
                spread: 0.3,
                rise: 1.0,
                radius: 1.5,
                start_color: Color::new(1.0, 0.75, 0.2, 1.0),
                end_color: Color::new(0.8, 0.1, 0.0, 0.0),
                start_scale: 1.5,
                end_scale: 0.3,
                gravity: [0.0, 0.0, 2.0],
            },
            Self::Smoke => PresetParams {
                emission_rate: 20.0,
                min_life: 2.5,
                max_life: 4.0,
                speed: 2.0,
                spread: 0.5,
                rise: 1.0,
                radius: 2.0,
                start_color: Color::new(0.4, 0.4, 0.4, 0.7),
                end_color: Color::new(0.6, 0.6, 0.6, 0.0),
                start_scale: 1.0,
                end_scale: 4.0,
                gravity: [0.0, 0.0, 0.5],
            },
            Self::Rain => PresetParams {
                emission_rate: 200.0,
                min_life: 0.8,
                max_life: 1.0,
                speed: 15.0,
                spread: 0.05,
                rise: -1.0,
                radius: 50.0,
                start_color: Color::new(0.6, 0.7, 1.0, 0.8),
                end_color: Color::new(0.6, 0.7, 1.0, 0.4),
                start_scale: 0.2,
                end_scale: 0.2,
                gravity: [0.0, 0.0, -9.81],
            },
            Self::Snow => PresetParams {
                emission_rate: 80.0,
                min_life: 4.0,
                max_life: 6.0,
                speed: 1.0,
                spread: 0.6,
                rise: -1.0,
                radius: 50.0,
                start_color: Color::new(1.0, 1.0, 1.0, 0.9),
                end_color: Color::new(1.0, 1.0, 1.0, 0.6),
                start_scale: 0.5,
                end_scale: 0.5,
                gravity: [0.0, 0.0, -0.5],
            },
            Self::Explosion => PresetParams {
                emission_rate: 400.0,
                min_life: 0.3,
                max_life: 0.8,
                speed: 25.0,
                spread: 1.0,
                rise: 0.0,
                radius: 0.5,
                start_color: Color::new(1.0, 0.9, 0.5, 1.0),
                end_color: Color::new(0.5, 0.1, 0.0, 0.0),
                start_scale: 2.0,
                end_scale: 0.5,
                gravity: [0.0, 0.0, -3.0],
            },
        }
    }
}

impl fmt::Display for ParticlePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParticlePreset {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RenderError::invalid("", format!("unknown particle preset '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_sane() {
        for preset in ParticlePreset::ALL {
            let params = preset.params();
            assert!(params.emission_rate > 0.0, "{preset}");
            assert!(params.min_life > 0.0 && params.min_life <= params.max_life, "{preset}");
        }
        assert_eq!("Snow".parse::<ParticlePreset>().unwrap(), ParticlePreset::Snow);
        assert!("plasma".parse::<ParticlePreset>().is_err());
    }
}
