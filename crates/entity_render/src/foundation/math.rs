//! Math utilities and types
//!
//! Provides the vector aliases, geodetic anchors and color type shared by all
//! renderers. World positions use double precision because earth-centered
//! coordinates are in the millions of meters.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Vector2, Vector3};

/// 2D vector type (screen space)
pub type Vec2 = Vector2<f64>;

/// 3D vector type (earth-centered world space, meters)
pub type Vec3 = Vector3<f64>;

/// Mean earth radius used by the spherical world model
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geodetic anchor: longitude/latitude in degrees, height in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Longitude in degrees
    pub lon: f64,
    /// Latitude in degrees
    pub lat: f64,
    /// Height above the reference sphere in meters
    #[serde(default)]
    pub height: f64,
}

impl Anchor {
    /// Create a new anchor
    pub const fn new(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }

    /// Create an anchor on the surface
    pub const fn surface(lon: f64, lat: f64) -> Self {
        Self::new(lon, lat, 0.0)
    }

    /// Whether all components are finite and latitude is in range
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && self.height.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Earth-centered world position
    pub fn world(&self) -> Vec3 {
        let (lon, lat) = (self.lon.to_radians(), self.lat.to_radians());
        let radius = EARTH_RADIUS_M + self.height;
        Vec3::new(
            radius * lat.cos() * lon.cos(),
            radius * lat.cos() * lon.sin(),
            radius * lat.sin(),
        )
    }

    /// Local up direction (unit length)
    pub fn up(&self) -> Vec3 {
        let (lon, lat) = (self.lon.to_radians(), self.lat.to_radians());
        Vec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
    }

    /// Convert an east-north-up vector at this anchor into world space
    pub fn enu_to_world(&self, enu: Vec3) -> Vec3 {
        let (lon, lat) = (self.lon.to_radians(), self.lat.to_radians());
        let east = Vec3::new(-lon.sin(), lon.cos(), 0.0);
        let north = Vec3::new(-lat.sin() * lon.cos(), -lat.sin() * lon.sin(), lat.cos());
        east * enu.x + north * enu.y + self.up() * enu.z
    }
}

/// Linear interpolation between two points
pub fn lerp(a: &Vec3, b: &Vec3, t: f64) -> Vec3 {
    a + (b - a) * t
}

/// Centroid of a set of points
pub fn centroid(points: &[Vec3]) -> Option<Vec3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p);
    Some(sum / points.len() as f64)
}

/// Point at normalized arc-length `t` along a polyline
pub fn polyline_point(points: &[Vec3], t: f64) -> Option<Vec3> {
    match points {
        [] => None,
        [only] => Some(*only),
        _ => {
            let total: f64 = points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
            if total <= f64::EPSILON {
                return Some(points[0]);
            }
            let mut remaining = t.clamp(0.0, 1.0) * total;
            for w in points.windows(2) {
                let length = (w[1] - w[0]).norm();
                if remaining <= length {
                    let local = if length > 0.0 { remaining / length } else { 0.0 };
                    return Some(lerp(&w[0], &w[1], local));
                }
                remaining -= length;
            }
            points.last().copied()
        }
    }
}

/// RGBA color with linear components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Selection highlight
    pub const YELLOW: Self = Self::rgb(1.0, 0.85, 0.0);
    /// Default line color
    pub const CYAN: Self = Self::rgb(0.0, 0.8, 1.0);
    /// Warm accent
    pub const ORANGE: Self = Self::rgb(1.0, 0.6, 0.0);
    /// Neutral grey
    pub const GREY: Self = Self::rgb(0.55, 0.55, 0.55);

    /// Create a color from components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Same color with a different alpha
    pub const fn with_alpha(self, a: f32) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Blend towards white by `amount`
    pub fn lighten(self, amount: f32) -> Self {
        self.lerp(Self::WHITE.with_alpha(self.a), amount)
    }

    /// Linear interpolation between two colors
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    /// Components as an array
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::CYAN
    }
}
