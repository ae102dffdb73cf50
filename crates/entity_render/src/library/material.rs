//! Declarative material descriptors

use serde::{Deserialize, Serialize};

use crate::foundation::math::Color;

/// Material family understood by the host's shader library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    /// Flat color
    Basic,
    /// Self-lit color
    Emissive,
    /// Color with a time-varying intensity pulse
    Pulse,
    /// Dashed line
    Dashed,
    /// Soft outer glow
    Glow,
    /// Color ramp from `color` to `end_color` along a line
    Gradient,
}

impl MaterialKind {
    /// Name used in signatures and presets
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Emissive => "emissive",
            Self::Pulse => "pulse",
            Self::Dashed => "dashed",
            Self::Glow => "glow",
            Self::Gradient => "gradient",
        }
    }
}

/// Inputs to [`create_material`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialOptions {
    /// Primary color
    pub color: Color,
    /// Ramp end color for gradients
    pub end_color: Option<Color>,
    /// Line width in pixels
    pub width: f32,
    /// Emissive strength
    pub emissive_intensity: f32,
    /// Dash length in pixels (dashed materials)
    pub dash_length: f32,
    /// Pulses per second (pulse materials)
    pub pulse_speed: f32,
}

impl MaterialOptions {
    /// Options with a given color
    pub fn colored(color: Color) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Set the width
    pub const fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    /// Set the gradient end color
    pub const fn with_end_color(mut self, color: Color) -> Self {
        self.end_color = Some(color);
        self
    }
}

impl Default for MaterialOptions {
    fn default() -> Self {
        Self {
            color: Color::CYAN,
            end_color: None,
            width: 2.0,
            emissive_intensity: 0.0,
            dash_length: 16.0,
            pulse_speed: 1.0,
        }
    }
}

/// Renderer-native material description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDescriptor {
    /// Material family
    pub kind: MaterialKind,
    /// Resolved inputs
    pub options: MaterialOptions,
}

impl MaterialDescriptor {
    /// Stable key describing this material's inputs
    pub fn signature(&self) -> String {
        material_signature(self.kind, &self.options)
    }

    /// Primary color
    pub const fn color(&self) -> Color {
        self.options.color
    }

    /// Line width
    pub const fn width(&self) -> f32 {
        self.options.width
    }
}

/// Build a material descriptor; pure function of its inputs
pub fn create_material(kind: MaterialKind, options: &MaterialOptions) -> MaterialDescriptor {
    let mut options = *options;
    options.width = options.width.max(0.0);
    options.color = clamp_color(options.color);
    options.end_color = options.end_color.map(clamp_color);
    match kind {
        MaterialKind::Emissive | MaterialKind::Glow if options.emissive_intensity <= 0.0 => {
            options.emissive_intensity = 1.0;
        }
        MaterialKind::Gradient if options.end_color.is_none() => {
            options.end_color = Some(options.color.with_alpha(0.0));
        }
        _ => {}
    }
    MaterialDescriptor { kind, options }
}

/// Signature of a material without building it
pub fn material_signature(kind: MaterialKind, options: &MaterialOptions) -> String {
    let c = options.color;
    let end = options
        .end_color
        .map_or_else(|| "-".to_string(), |e| format!("{:.3},{:.3},{:.3},{:.3}", e.r, e.g, e.b, e.a));
    format!(
        "mat:{}:{:.3},{:.3},{:.3},{:.3}:{}:{:.2}:{:.2}:{:.2}:{:.2}",
        kind.name(),
        c.r,
        c.g,
        c.b,
        c.a,
        end,
        options.width,
        options.emissive_intensity,
        options.dash_length,
        options.pulse_speed
    )
}

fn clamp_color(color: Color) -> Color {
    Color::new(
        color.r.clamp(0.0, 1.0),
        color.g.clamp(0.0, 1.0),
        color.b.clamp(0.0, 1.0),
        color.a.clamp(0.0, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_material_is_pure() {
        let options = MaterialOptions::colored(Color::ORANGE).with_width(3.0);
        let a = create_material(MaterialKind::Dashed, &options);
        let b = create_material(MaterialKind::Dashed, &options);
        assert_eq!(a, b);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_gradient_gets_end_color() {
        let material = create_material(MaterialKind::Gradient, &MaterialOptions::default());
        assert_eq!(material.options.end_color, Some(Color::CYAN.with_alpha(0.0)));
    }

    #[test]
    fn test_signature_distinguishes_kind() {
        let options = MaterialOptions::default();
        assert_ne!(
            material_signature(MaterialKind::Basic, &options),
            material_signature(MaterialKind::Glow, &options)
        );
    }
}
