//! Caller-supplied entity records and partial updates

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::foundation::math::{centroid, Anchor, Color, Vec3};
use crate::renderers::particle::ParticlePreset;

/// Unique entity identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Entity family handled by one renderer implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Targets and points of interest
    Point,
    /// Time-tagged paths
    Trajectory,
    /// Arcs between two anchors
    Relationship,
    /// Loaded 3D models
    Model,
    /// Particle effect emitters
    Particle,
}

impl Family {
    /// Every supported family
    pub const ALL: [Self; 5] = [
        Self::Point,
        Self::Trajectory,
        Self::Relationship,
        Self::Model,
        Self::Particle,
    ];

    /// Registry name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Trajectory => "trajectory",
            Self::Relationship => "relationship",
            Self::Model => "model",
            Self::Particle => "particle",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RenderError::UnsupportedFamily(s.to_string()))
    }
}

/// Optional per-record style overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOverrides {
    /// Primary color
    pub color: Option<Color>,
    /// Line width in pixels
    pub width: Option<f32>,
    /// Material preset name
    pub material: Option<String>,
    /// Geometry preset name (shared geometry enables instancing)
    pub geometry: Option<String>,
    /// Opacity in `[0, 1]`
    pub opacity: Option<f32>,
}

impl StyleOverrides {
    /// Whether any appearance value differs from the preset
    pub const fn has_overrides(&self) -> bool {
        self.color.is_some() || self.width.is_some() || self.opacity.is_some()
    }

    /// Override the color
    pub const fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Use a named geometry preset
    pub fn with_geometry(mut self, geometry: impl Into<String>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    /// Use a named material preset
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }
}

fn default_pixel_size() -> f64 {
    12.0
}

fn default_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Family-specific attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum FamilyPayload {
    /// Billboard at the first anchor
    Point {
        /// Label text
        #[serde(default)]
        label: Option<String>,
        /// Icon resource, loaded asynchronously
        #[serde(default)]
        icon: Option<String>,
        /// Billboard size in pixels
        #[serde(default = "default_pixel_size")]
        pixel_size: f64,
    },
    /// Path through the anchors, optionally time-tagged
    Trajectory {
        /// One time (seconds) per anchor, ascending; empty for an untimed path
        #[serde(default)]
        times: Vec<f64>,
        /// Label text
        #[serde(default)]
        label: Option<String>,
        /// Draw start and end markers
        #[serde(default)]
        show_endpoints: bool,
    },
    /// Arc from the first anchor to the second
    Relationship {
        /// Label text
        #[serde(default)]
        label: Option<String>,
        /// Arc apex height in meters
        #[serde(default)]
        arc_height: f64,
        /// Draw a direction arrow at the target
        #[serde(default = "default_true")]
        show_arrow: bool,
        /// Flow marker progress per second; zero disables the marker
        #[serde(default)]
        flow_speed: f64,
    },
    /// Model loaded from a resource
    Model {
        /// Model resource
        uri: String,
        /// Uniform scale
        #[serde(default = "default_scale")]
        scale: f64,
        /// Label text
        #[serde(default)]
        label: Option<String>,
    },
    /// Particle emitter at the first anchor
    Particle {
        /// Effect preset
        preset: ParticlePreset,
        /// Particles per second replacing the preset rate
        #[serde(default)]
        rate_override: Option<f64>,
    },
}

impl FamilyPayload {
    /// Family this payload belongs to
    pub const fn family(&self) -> Family {
        match self {
            Self::Point { .. } => Family::Point,
            Self::Trajectory { .. } => Family::Trajectory,
            Self::Relationship { .. } => Family::Relationship,
            Self::Model { .. } => Family::Model,
            Self::Particle { .. } => Family::Particle,
        }
    }

    /// Label text, for families that carry one
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Point { label, .. }
            | Self::Trajectory { label, .. }
            | Self::Relationship { label, .. }
            | Self::Model { label, .. } => label.as_deref(),
            Self::Particle { .. } => None,
        }
    }
}

/// Domain entity submitted by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Unique id within one renderer
    pub id: EntityId,
    /// Spatial anchors
    pub anchors: Vec<Anchor>,
    /// Family-specific attributes
    pub payload: Option<FamilyPayload>,
    /// Caller visibility flag
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Style overrides
    #[serde(default)]
    pub style: StyleOverrides,
    /// Culling distance; the renderer default applies when absent
    #[serde(default)]
    pub max_distance: Option<f64>,
}

impl EntityRecord {
    /// Record with no anchors or payload
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            anchors: Vec::new(),
            payload: None,
            visible: true,
            style: StyleOverrides::default(),
            max_distance: None,
        }
    }

    /// Point at an anchor
    pub fn point(id: impl Into<EntityId>, anchor: Anchor) -> Self {
        Self::new(id).with_anchors(vec![anchor]).with_payload(FamilyPayload::Point {
            label: None,
            icon: None,
            pixel_size: default_pixel_size(),
        })
    }

    /// Untimed trajectory through anchors
    pub fn trajectory(id: impl Into<EntityId>, anchors: Vec<Anchor>) -> Self {
        Self::new(id).with_anchors(anchors).with_payload(FamilyPayload::Trajectory {
            times: Vec::new(),
            label: None,
            show_endpoints: false,
        })
    }

    /// Relationship arc between two anchors
    pub fn relationship(id: impl Into<EntityId>, source: Anchor, target: Anchor) -> Self {
        Self::new(id)
            .with_anchors(vec![source, target])
            .with_payload(FamilyPayload::Relationship {
                label: None,
                arc_height: 0.0,
                show_arrow: true,
                flow_speed: 0.0,
            })
    }

    /// Model at an anchor
    pub fn model(id: impl Into<EntityId>, anchor: Anchor, uri: impl Into<String>) -> Self {
        Self::new(id).with_anchors(vec![anchor]).with_payload(FamilyPayload::Model {
            uri: uri.into(),
            scale: default_scale(),
            label: None,
        })
    }

    /// Particle emitter at an anchor
    pub fn particle(id: impl Into<EntityId>, anchor: Anchor, preset: ParticlePreset) -> Self {
        Self::new(id).with_anchors(vec![anchor]).with_payload(FamilyPayload::Particle {
            preset,
            rate_override: None,
        })
    }

    /// Replace the anchors
    pub fn with_anchors(mut self, anchors: Vec<Anchor>) -> Self {
        self.anchors = anchors;
        self
    }

    /// Replace the payload
    pub fn with_payload(mut self, payload: FamilyPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Replace the style overrides
    pub fn with_style(mut self, style: StyleOverrides) -> Self {
        self.style = style;
        self
    }

    /// Set the culling distance
    pub const fn with_max_distance(mut self, distance: f64) -> Self {
        self.max_distance = Some(distance);
        self
    }

    /// Start hidden
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Set the label of a labelled payload
    pub fn with_label(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        match &mut self.payload {
            Some(
                FamilyPayload::Point { label, .. }
                | FamilyPayload::Trajectory { label, .. }
                | FamilyPayload::Relationship { label, .. }
                | FamilyPayload::Model { label, .. },
            ) => *label = Some(text),
            Some(FamilyPayload::Particle { .. }) | None => {}
        }
        self
    }

    /// Check the fields `family` requires
    pub fn validate_for(&self, family: Family) -> RenderResult<()> {
        if self.id.is_empty() {
            return Err(RenderError::invalid("", "missing id"));
        }
        let invalid = |reason: &str| RenderError::invalid(self.id.as_str(), reason);
        if self.anchors.is_empty() {
            return Err(invalid("missing anchor"));
        }
        if let Some(index) = self.anchors.iter().position(|a| !a.is_valid()) {
            return Err(invalid(&format!("anchor {index} is not a valid position")));
        }
        let payload = self.payload.as_ref().ok_or_else(|| invalid("missing payload"))?;
        if payload.family() != family {
            return Err(invalid(&format!(
                "payload is for the {} family, renderer handles {}",
                payload.family(),
                family
            )));
        }
        if let Some(max) = self.max_distance {
            if !(max > 0.0) {
                return Err(invalid("max distance must be positive"));
            }
        }
        match payload {
            FamilyPayload::Point { pixel_size, .. } if !(*pixel_size > 0.0) => {
                Err(invalid("pixel size must be positive"))
            }
            FamilyPayload::Trajectory { times, .. } => {
                if self.anchors.len() < 2 {
                    Err(invalid("trajectory needs at least two anchors"))
                } else if !times.is_empty() && times.len() != self.anchors.len() {
                    Err(invalid("trajectory times must match anchors one to one"))
                } else if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[0] > w[1]) {
                    Err(invalid("trajectory times must be finite and ascending"))
                } else {
                    Ok(())
                }
            }
            FamilyPayload::Relationship {
                arc_height, flow_speed, ..
            } => {
                if self.anchors.len() < 2 {
                    Err(invalid("relationship needs a source and a target anchor"))
                } else if !arc_height.is_finite() || !flow_speed.is_finite() || *flow_speed < 0.0 {
                    Err(invalid("arc height and flow speed must be finite"))
                } else {
                    Ok(())
                }
            }
            FamilyPayload::Model { uri, scale, .. } => {
                if uri.trim().is_empty() {
                    Err(invalid("model uri is empty"))
                } else if !(*scale > 0.0) {
                    Err(invalid("model scale must be positive"))
                } else {
                    Ok(())
                }
            }
            FamilyPayload::Particle {
                rate_override: Some(rate),
                ..
            } if !(*rate > 0.0) => Err(invalid("emission rate must be positive")),
            _ => Ok(()),
        }
    }

    /// World positions of the anchors
    pub fn world_points(&self) -> Vec<Vec3> {
        self.anchors.iter().map(Anchor::world).collect()
    }

    /// Point used for camera distance
    pub fn focus(&self) -> Vec3 {
        centroid(&self.world_points()).unwrap_or_else(Vec3::zeros)
    }

    /// Geometry identifier used to decide instancing eligibility
    pub fn geometry_id(&self) -> Option<String> {
        match (&self.style.geometry, &self.payload) {
            (Some(geometry), _) => Some(geometry.clone()),
            (None, Some(FamilyPayload::Model { uri, .. })) => Some(uri.clone()),
            _ => None,
        }
    }

    /// Apply a partial update
    pub fn apply(&mut self, update: EntityUpdate) {
        if let Some(anchors) = update.anchors {
            self.anchors = anchors;
        }
        if let Some(payload) = update.payload {
            self.payload = Some(payload);
        }
        if let Some(visible) = update.visible {
            self.visible = visible;
        }
        if let Some(style) = update.style {
            self.style = style;
        }
        if let Some(max_distance) = update.max_distance {
            self.max_distance = Some(max_distance);
        }
    }
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityUpdate {
    /// New anchors
    pub anchors: Option<Vec<Anchor>>,
    /// New payload
    pub payload: Option<FamilyPayload>,
    /// New visibility flag
    pub visible: Option<bool>,
    /// New style overrides
    pub style: Option<StyleOverrides>,
    /// New culling distance
    pub max_distance: Option<f64>,
}

impl EntityUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the entity
    pub fn anchors(mut self, anchors: Vec<Anchor>) -> Self {
        self.anchors = Some(anchors);
        self
    }

    /// Replace the payload
    pub fn payload(mut self, payload: FamilyPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Show or hide
    pub const fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Replace the style overrides
    pub fn style(mut self, style: StyleOverrides) -> Self {
        self.style = Some(style);
        self
    }

    /// Change the culling distance
    pub const fn max_distance(mut self, distance: f64) -> Self {
        self.max_distance = Some(distance);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_str() {
        assert_eq!("Trajectory".parse::<Family>().unwrap(), Family::Trajectory);
        let err = "satellite".parse::<Family>().unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFamily(name) if name == "satellite"));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let bare = EntityRecord::new("a");
        assert!(matches!(
            bare.validate_for(Family::Point),
            Err(RenderError::InvalidRecord { .. })
        ));
        let no_payload = EntityRecord::new("a").with_anchors(vec![Anchor::surface(0.0, 0.0)]);
        assert!(no_payload.validate_for(Family::Point).is_err());
        let no_id = EntityRecord::point("", Anchor::surface(0.0, 0.0));
        assert!(no_id.validate_for(Family::Point).is_err());
        EntityRecord::point("a", Anchor::surface(0.0, 0.0))
            .validate_for(Family::Point)
            .unwrap();
    }

    #[test]
    fn test_payload_family_must_match() {
        let record = EntityRecord::point("a", Anchor::surface(0.0, 0.0));
        assert!(record.validate_for(Family::Model).is_err());
    }

    #[test]
    fn test_trajectory_times_checked() {
        let anchors = vec![Anchor::surface(0.0, 0.0), Anchor::surface(1.0, 1.0)];
        let mut record = EntityRecord::trajectory("t", anchors);
        record.payload = Some(FamilyPayload::Trajectory {
            times: vec![5.0, 1.0],
            label: None,
            show_endpoints: false,
        });
        assert!(record.validate_for(Family::Trajectory).is_err());
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut record = EntityRecord::point("a", Anchor::surface(0.0, 0.0)).with_label("alpha");
        record.apply(EntityUpdate::new().visible(false));
        assert!(!record.visible);
        assert_eq!(record.payload.as_ref().and_then(FamilyPayload::label), Some("alpha"));
        assert_eq!(record.anchors.len(), 1);
    }

    #[test]
    fn test_geometry_id() {
        let model = EntityRecord::model("m", Anchor::surface(0.0, 0.0), "jet.glb");
        assert_eq!(model.geometry_id().as_deref(), Some("jet.glb"));
        let styled = EntityRecord::point("p", Anchor::surface(0.0, 0.0))
            .with_style(StyleOverrides::default().with_geometry("sphere"));
        assert_eq!(styled.geometry_id().as_deref(), Some("sphere"));
        assert!(EntityRecord::point("q", Anchor::surface(0.0, 0.0)).geometry_id().is_none());
    }
}
