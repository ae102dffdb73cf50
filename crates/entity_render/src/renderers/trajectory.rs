//! Trajectory family: a path through the anchors, split by time
//!
//! A timed trajectory carries one time per anchor. Against the simulation
//! clock its points fall into three segments:
//!
//! * history: older than the current window, drawn solid as the trail
//! * current: inside the window up to now, drawn with a gradient
//! * prediction: after now, drawn dashed
//!
//! Neighbouring segments share their boundary point so the path stays
//! connected. Clock ticks move points between segments by patching positions
//! of the existing primitives. An untimed trajectory is drawn as one path with
//! a head marker travelling along it on the animation clock.

use async_trait::async_trait;

use super::label_desc;
use crate::animation::AnimationState;
use crate::core::config::TrajectoryConfig;
use crate::entity::{
    DetailMask, EntityRecord, EntityRegistry, Family, FamilyPayload, FamilyRenderer, FamilyStats, HandleBuilder,
    RenderContext, StyleOverrides, VisualHandle,
};
use crate::error::{RenderError, RenderResult};
use crate::foundation::collections::EntityKey;
use crate::foundation::math::{lerp, polyline_point, Vec3};
use crate::host::{PrimitiveDesc, PrimitiveId, PrimitiveKind, PrimitivePatch};
use crate::selection::Highlight;

/// Points of a path split by time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segments {
    /// Points older than the current window
    pub history: Vec<Vec3>,
    /// Points inside the window up to now
    pub current: Vec<Vec3>,
    /// Points after now
    pub prediction: Vec<Vec3>,
}

/// Split `points` by `times` relative to `now`
///
/// `times` must be ascending and match `points` one to one. Segments shorter
/// than two points are left empty.
pub fn segment(points: &[Vec3], times: &[f64], now: f64, window: f64) -> Segments {
    let n = points.len().min(times.len());
    let (points, times) = (&points[..n], &times[..n]);
    let h = times.partition_point(|t| *t < now - window);
    let p = times.partition_point(|t| *t <= now);

    let mut segments = Segments::default();
    if h > 0 {
        segments.history = points[..(h + 1).min(n)].to_vec();
    }
    if p > h {
        segments.current = points[h..(p + 1).min(n)].to_vec();
    }
    if p < n {
        segments.prediction = points[p..].to_vec();
    }
    for part in [&mut segments.history, &mut segments.current, &mut segments.prediction] {
        if part.len() < 2 {
            part.clear();
        }
    }
    segments
}

/// Interpolated position along a timed path at `now`, clamped to its ends
pub fn position_at(points: &[Vec3], times: &[f64], now: f64) -> Option<Vec3> {
    let n = points.len().min(times.len());
    if n == 0 {
        return None;
    }
    let i = times[..n].partition_point(|t| *t <= now);
    if i == 0 {
        return Some(points[0]);
    }
    if i == n {
        return Some(points[n - 1]);
    }
    let span = times[i] - times[i - 1];
    let t = if span > 0.0 { (now - times[i - 1]) / span } else { 1.0 };
    Some(lerp(&points[i - 1], &points[i], t))
}

/// Per-trajectory state
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryState {
    /// World positions of the anchors
    pub points: Vec<Vec3>,
    /// Time of each point; empty for an untimed path
    pub times: Vec<f64>,
    /// Split at the last clock time
    pub segments: Segments,
    /// Head marker position
    pub head: Vec3,
}

impl TrajectoryState {
    fn from_record(record: &EntityRecord, now: f64, window: f64) -> RenderResult<Self> {
        let times = match &record.payload {
            Some(FamilyPayload::Trajectory { times, .. }) => times.clone(),
            _ => return Err(RenderError::invalid(record.id.as_str(), "missing trajectory payload")),
        };
        let points = record.world_points();
        let mut state = Self {
            head: points.first().copied().unwrap_or_else(Vec3::zeros),
            points,
            times,
            segments: Segments::default(),
        };
        state.resegment(now, window);
        Ok(state)
    }

    /// Whether the points carry times
    pub fn is_timed(&self) -> bool {
        !self.times.is_empty()
    }

    fn resegment(&mut self, now: f64, window: f64) {
        if !self.is_timed() {
            return;
        }
        self.segments = segment(&self.points, &self.times, now, window);
        if let Some(head) = position_at(&self.points, &self.times, now) {
            self.head = head;
        }
    }
}

/// Renders trajectories
pub struct TrajectoryFamily {
    config: TrajectoryConfig,
    clock_time: Option<f64>,
}

impl TrajectoryFamily {
    /// Create the family
    pub const fn new(config: TrajectoryConfig) -> Self {
        Self {
            config,
            clock_time: None,
        }
    }

    fn now(&self, ctx: &RenderContext<'_>) -> f64 {
        self.clock_time.unwrap_or_else(|| ctx.host.current_time())
    }
}

/// Style with the record's material choice dropped, for fixed segment looks
fn segment_style(style: &StyleOverrides) -> StyleOverrides {
    StyleOverrides {
        material: None,
        ..style.clone()
    }
}

fn polyline(ctx: &RenderContext<'_>, style: &StyleOverrides, preset: &str, points: &[Vec3]) -> Option<PrimitiveDesc> {
    (points.len() >= 2)
        .then(|| PrimitiveDesc::new(PrimitiveKind::Polyline, ctx.material(style, preset)).with_positions(points.to_vec()))
}

fn primary_preset(state: &TrajectoryState) -> &'static str {
    if state.is_timed() {
        "gradient"
    } else {
        "basic"
    }
}

/// Desired primitive for every role, in creation order
fn parts(ctx: &RenderContext<'_>, record: &EntityRecord, state: &TrajectoryState) -> Vec<(DetailMask, Option<PrimitiveDesc>)> {
    let fixed = segment_style(&record.style);
    let (show_endpoints, label) = match &record.payload {
        Some(FamilyPayload::Trajectory { show_endpoints, label, .. }) => (*show_endpoints, label.as_deref()),
        _ => (false, None),
    };
    let (trail, primary, prediction) = if state.is_timed() {
        (
            polyline(ctx, &fixed, "basic", &state.segments.history),
            polyline(ctx, &record.style, primary_preset(state), &state.segments.current),
            polyline(ctx, &fixed, "dashed", &state.segments.prediction),
        )
    } else {
        (None, polyline(ctx, &record.style, primary_preset(state), &state.points), None)
    };
    let head = PrimitiveDesc::new(PrimitiveKind::Marker, ctx.catalog.material_or_basic("pulse")).at(state.head);
    let endpoints = match (show_endpoints, state.points.first(), state.points.last()) {
        (true, Some(first), Some(last)) => {
            Some(PrimitiveDesc::new(PrimitiveKind::Marker, ctx.catalog.basic()).with_positions(vec![*first, *last]))
        }
        _ => None,
    };
    let label_at = if state.is_timed() {
        state.head
    } else {
        state.points.last().copied().unwrap_or(state.head)
    };
    vec![
        (DetailMask::TRAIL, trail),
        (DetailMask::PRIMARY, primary),
        (DetailMask::PREDICTION, prediction),
        (DetailMask::FLOW, Some(head)),
        (DetailMask::ENDPOINTS, endpoints),
        (DetailMask::LABEL, label.map(|text| label_desc(ctx, text, label_at))),
    ]
}

#[async_trait(?Send)]
impl FamilyRenderer for TrajectoryFamily {
    type State = TrajectoryState;

    const FAMILY: Family = Family::Trajectory;

    async fn build(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
    ) -> RenderResult<(VisualHandle, TrajectoryState)> {
        let state = TrajectoryState::from_record(record, self.now(ctx), self.config.current_window_s)?;
        let mut builder = HandleBuilder::new(ctx.host);
        for (role, desc) in parts(ctx, record, &state) {
            builder.create_optional(role, desc)?;
        }
        Ok((builder.finish(), state))
    }

    fn refresh(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &mut VisualHandle,
        state: &mut TrajectoryState,
    ) -> RenderResult<()> {
        let mut next = TrajectoryState::from_record(record, self.now(ctx), self.config.current_window_s)?;
        if !next.is_timed() && next.points == state.points {
            next.head = state.head;
        }
        for (role, desc) in parts(ctx, record, &next) {
            handle.sync_part(ctx.host, role, desc)?;
        }
        *state = next;
        Ok(())
    }

    fn animation(&self, _record: &EntityRecord, state: &TrajectoryState) -> Option<AnimationState> {
        if state.is_timed() || self.config.head_speed <= 0.0 {
            return None;
        }
        let (first, last) = (state.points.first()?, state.points.last()?);
        Some(AnimationState::new(*first, *last, self.config.head_speed))
    }

    fn animate(
        &mut self,
        ctx: &RenderContext<'_>,
        handle: &VisualHandle,
        state: &mut TrajectoryState,
        animation: &AnimationState,
    ) -> RenderResult<()> {
        if let Some(head) = polyline_point(&state.points, animation.progress) {
            state.head = head;
            handle.patch(ctx.host, DetailMask::FLOW, PrimitivePatch::new().positions(vec![head]))?;
        }
        Ok(())
    }

    fn on_clock(
        &mut self,
        ctx: &RenderContext<'_>,
        registry: &mut EntityRegistry<TrajectoryState>,
        time: f64,
    ) -> RenderResult<()> {
        self.clock_time = Some(time);
        let window = self.config.current_window_s;
        let mut reshaped: Vec<(EntityKey, Vec<PrimitiveId>)> = Vec::new();
        for (key, entry) in registry.iter_mut() {
            if !entry.state.is_timed() {
                continue;
            }
            entry.state.resegment(time, window);
            let before: Vec<PrimitiveId> = entry.handle.primitive_ids().collect();
            for (role, desc) in parts(ctx, &entry.record, &entry.state) {
                entry.handle.sync_positions(ctx.host, role, desc)?;
            }
            entry.handle.sync_visibility(ctx.host, entry.visible_mask())?;
            if !entry.handle.primitive_ids().eq(before.iter().copied()) {
                reshaped.push((key, before));
            }
        }
        for (key, before) in reshaped {
            registry.reindex(key, &before);
        }
        Ok(())
    }

    fn apply_highlight(
        &mut self,
        ctx: &RenderContext<'_>,
        record: &EntityRecord,
        handle: &VisualHandle,
        state: &TrajectoryState,
        highlight: Highlight,
    ) -> RenderResult<()> {
        let base = ctx.material(&record.style, primary_preset(state));
        handle.patch(
            ctx.host,
            DetailMask::PRIMARY,
            PrimitivePatch::new().material(ctx.highlighted(&base, highlight)),
        )?;
        let trail = ctx.material(&segment_style(&record.style), "basic");
        handle.patch(
            ctx.host,
            DetailMask::TRAIL,
            PrimitivePatch::new().material(ctx.highlighted(&trail, highlight)),
        )?;
        Ok(())
    }

    fn stats(&self, registry: &EntityRegistry<TrajectoryState>) -> FamilyStats {
        let (mut history_segments, mut prediction_segments) = (0, 0);
        for (_, entry) in registry.iter() {
            history_segments += usize::from(!entry.state.segments.history.is_empty());
            prediction_segments += usize::from(!entry.state.segments.prediction.is_empty());
        }
        FamilyStats::Trajectory {
            history_segments,
            prediction_segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use approx::assert_relative_eq;

    use crate::core::config::RendererConfig;
    use crate::entity::{EntityRenderer, EntityUpdate, RenderOptions, RenderServices};
    use crate::foundation::math::Anchor;
    use crate::host::HeadlessHost;

    fn line(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_segment_splits_around_now() {
        let points = line(5);
        let times = [0.0, 10.0, 20.0, 30.0, 40.0];
        let segments = segment(&points, &times, 25.0, 10.0);
        assert_eq!(segments.history, points[..3].to_vec());
        assert_eq!(segments.current, points[2..4].to_vec());
        assert_eq!(segments.prediction, points[3..].to_vec());
    }

    #[test]
    fn test_segment_before_and_after_the_path() {
        let points = line(3);
        let times = [10.0, 20.0, 30.0];

        let early = segment(&points, &times, 0.0, 5.0);
        assert!(early.history.is_empty() && early.current.is_empty());
        assert_eq!(early.prediction, points);

        let late = segment(&points, &times, 100.0, 5.0);
        assert_eq!(late.history, points);
        assert!(late.current.is_empty() && late.prediction.is_empty());
    }

    #[test]
    fn test_position_at_interpolates_and_clamps() {
        let points = line(3);
        let times = [0.0, 10.0, 20.0];
        assert_relative_eq!(position_at(&points, &times, 5.0).unwrap(), Vec3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(position_at(&points, &times, -1.0).unwrap(), points[0]);
        assert_relative_eq!(position_at(&points, &times, 99.0).unwrap(), points[2]);
    }

    fn anchors() -> Vec<Anchor> {
        (0..5).map(|i| Anchor::new(f64::from(i) * 0.01, 0.0, 100.0)).collect()
    }

    fn timed(id: &str) -> EntityRecord {
        EntityRecord::trajectory(id, anchors()).with_payload(FamilyPayload::Trajectory {
            times: vec![0.0, 10.0, 20.0, 30.0, 40.0],
            label: Some("track".to_string()),
            show_endpoints: true,
        })
    }

    fn renderer() -> (Rc<HeadlessHost>, EntityRenderer<TrajectoryFamily>) {
        let host = Rc::new(HeadlessHost::new());
        host.set_camera_position(Anchor::new(0.02, 0.0, 2_000.0).world());
        let mut config = RendererConfig::new();
        config.trajectory.current_window_s = 10.0;
        let services = RenderServices::new(host.clone(), 64);
        let family = TrajectoryFamily::new(config.trajectory.clone());
        (host, EntityRenderer::new(family, services, &config).unwrap())
    }

    #[tokio::test]
    async fn test_clock_tick_resegments_in_place() {
        let (host, mut renderer) = renderer();
        host.with_clock(|clock| clock.set_time(5.0));
        renderer.add_entity(timed("t")).await.unwrap();
        let prediction = renderer.handle("t").unwrap().part(DetailMask::PREDICTION).unwrap();
        assert!(renderer.handle("t").unwrap().part(DetailMask::TRAIL).is_none());
        let (created_before, _) = host.churn();

        renderer.on_clock_tick(25.0).unwrap();
        let handle = renderer.handle("t").unwrap();
        assert_eq!(handle.part(DetailMask::PREDICTION), Some(prediction));
        assert!(handle.part(DetailMask::TRAIL).is_some());
        assert_eq!(host.churn().0, created_before + 1);
        assert_eq!(host.primitive(prediction).unwrap().positions.len(), 2);

        match renderer.stats().family {
            FamilyStats::Trajectory {
                history_segments,
                prediction_segments,
            } => assert_eq!((history_segments, prediction_segments), (1, 1)),
            other => panic!("unexpected stats {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_patches_existing_primitives() {
        let (host, mut renderer) = renderer();
        renderer.add_entity(timed("t")).await.unwrap();
        let (created, removed) = host.churn();

        let shifted: Vec<Anchor> = anchors().into_iter().map(|a| Anchor::new(a.lon, 0.001, a.height)).collect();
        assert!(renderer.update_entity("t", EntityUpdate::new().anchors(shifted)).unwrap());
        assert_eq!(host.churn(), (created, removed));
    }

    #[tokio::test]
    async fn test_untimed_head_follows_the_animation_clock() {
        let (host, mut renderer) = renderer();
        renderer
            .render(vec![EntityRecord::trajectory("u", anchors())], RenderOptions::default())
            .await
            .unwrap();
        let head = renderer.handle("u").unwrap().part(DetailMask::FLOW).unwrap();
        let start = host.primitive(head).unwrap().positions[0];

        let mut now = 0.0;
        for _ in 0..30 {
            now += 1000.0 / 60.0;
            renderer.on_animation_frame(now).unwrap();
        }
        assert_ne!(host.primitive(head).unwrap().positions[0], start);
        assert_eq!(renderer.stats().animating_entities, 1);
    }
}
