//! In-memory rendering host
//!
//! Records every primitive it is asked to manage instead of drawing it. Used
//! by the demo application and by tests, which can script camera moves,
//! pick results and resource failures.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use super::{
    CameraState, HostError, PrimitiveDesc, PrimitiveId, PrimitivePatch, RenderHost, ResourceInfo,
    SimulationClock,
};
use crate::foundation::math::{Vec2, Vec3};

#[derive(Default)]
struct HeadlessState {
    primitives: BTreeMap<PrimitiveId, PrimitiveDesc>,
    failing_uris: HashSet<String>,
    pick_result: Option<PrimitiveId>,
    created_total: u64,
    removed_total: u64,
    loads: u64,
}

/// Headless [`RenderHost`] implementation
pub struct HeadlessHost {
    state: RefCell<HeadlessState>,
    clock: RefCell<SimulationClock>,
    camera: Cell<CameraState>,
    next_id: Cell<u64>,
    frame_requests: Cell<u64>,
    disposed: Cell<bool>,
}

impl HeadlessHost {
    /// Create an empty host with the camera at the world origin
    pub fn new() -> Self {
        Self {
            state: RefCell::new(HeadlessState::default()),
            clock: RefCell::new(SimulationClock::default()),
            camera: Cell::new(CameraState::at(Vec3::zeros())),
            next_id: Cell::new(1),
            frame_requests: Cell::new(0),
            disposed: Cell::new(false),
        }
    }

    /// Move the camera
    pub fn set_camera_position(&self, position: Vec3) {
        self.camera.set(CameraState::at(position));
    }

    /// Make loads of `uri` fail
    pub fn fail_resource(&self, uri: impl Into<String>) {
        self.state.borrow_mut().failing_uris.insert(uri.into());
    }

    /// Script the result of the next pick queries
    pub fn set_pick_result(&self, primitive: Option<PrimitiveId>) {
        self.state.borrow_mut().pick_result = primitive;
    }

    /// Dispose the scene; later operations fail with [`HostError::Disposed`]
    pub fn dispose(&self) {
        self.disposed.set(true);
    }

    /// Snapshot of a registered primitive
    pub fn primitive(&self, id: PrimitiveId) -> Option<PrimitiveDesc> {
        self.state.borrow().primitives.get(&id).cloned()
    }

    /// Whether a primitive is registered
    pub fn contains(&self, id: PrimitiveId) -> bool {
        self.state.borrow().primitives.contains_key(&id)
    }

    /// Whether a primitive is registered and drawn
    pub fn is_visible(&self, id: PrimitiveId) -> bool {
        self.state
            .borrow()
            .primitives
            .get(&id)
            .is_some_and(|desc| desc.visible)
    }

    /// Number of registered primitives
    pub fn primitive_count(&self) -> usize {
        self.state.borrow().primitives.len()
    }

    /// Number of registered primitives currently drawn
    pub fn visible_count(&self) -> usize {
        self.state.borrow().primitives.values().filter(|d| d.visible).count()
    }

    /// Total primitives created and removed over the host's life
    pub fn churn(&self) -> (u64, u64) {
        let state = self.state.borrow();
        (state.created_total, state.removed_total)
    }

    /// Number of resource loads served
    pub fn resource_loads(&self) -> u64 {
        self.state.borrow().loads
    }

    /// Number of frame requests received
    pub fn frame_requests(&self) -> u64 {
        self.frame_requests.get()
    }

    /// Run a closure against the simulation clock
    pub fn with_clock<R>(&self, f: impl FnOnce(&mut SimulationClock) -> R) -> R {
        f(&mut self.clock.borrow_mut())
    }

    fn ensure_alive(&self) -> Result<(), HostError> {
        if self.disposed.get() {
            Err(HostError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl RenderHost for HeadlessHost {
    fn create_primitive(&self, desc: PrimitiveDesc) -> Result<PrimitiveId, HostError> {
        self.ensure_alive()?;
        if desc.positions.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(HostError::InvalidPrimitive("non-finite position".to_string()));
        }
        let id = PrimitiveId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let mut state = self.state.borrow_mut();
        state.primitives.insert(id, desc);
        state.created_total += 1;
        Ok(id)
    }

    fn update_primitive(&self, id: PrimitiveId, patch: PrimitivePatch) -> Result<(), HostError> {
        self.ensure_alive()?;
        let mut state = self.state.borrow_mut();
        let desc = state
            .primitives
            .get_mut(&id)
            .ok_or(HostError::UnknownPrimitive(id))?;
        desc.apply(patch);
        Ok(())
    }

    fn set_visible(&self, id: PrimitiveId, visible: bool) -> Result<(), HostError> {
        self.ensure_alive()?;
        let mut state = self.state.borrow_mut();
        let desc = state
            .primitives
            .get_mut(&id)
            .ok_or(HostError::UnknownPrimitive(id))?;
        desc.visible = visible;
        Ok(())
    }

    fn remove_primitive(&self, id: PrimitiveId) -> Result<(), HostError> {
        self.ensure_alive()?;
        let mut state = self.state.borrow_mut();
        state
            .primitives
            .remove(&id)
            .ok_or(HostError::UnknownPrimitive(id))?;
        state.removed_total += 1;
        Ok(())
    }

    fn camera(&self) -> CameraState {
        self.camera.get()
    }

    fn pick(&self, _screen: Vec2) -> Result<Option<PrimitiveId>, HostError> {
        self.ensure_alive()?;
        let state = self.state.borrow();
        Ok(state.pick_result.filter(|id| state.primitives.contains_key(id)))
    }

    fn request_frame(&self) {
        self.frame_requests.set(self.frame_requests.get() + 1);
    }

    fn current_time(&self) -> f64 {
        self.clock.borrow().current_time()
    }

    async fn load_resource(&self, uri: &str) -> Result<ResourceInfo, HostError> {
        self.ensure_alive()?;
        // Loads complete on a later poll, like a real fetch
        tokio::task::yield_now().await;
        let mut state = self.state.borrow_mut();
        if state.failing_uris.contains(uri) {
            return Err(HostError::ResourceUnavailable {
                uri: uri.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        state.loads += 1;
        Ok(ResourceInfo {
            uri: uri.to_string(),
            size_bytes: uri.len() * 1024,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PrimitiveKind;
    use crate::library::Catalog;

    #[test]
    fn test_primitive_lifecycle() {
        let host = HeadlessHost::new();
        let catalog = Catalog::standard();
        let desc = PrimitiveDesc::new(PrimitiveKind::Marker, catalog.basic())
            .at(Vec3::new(1.0, 2.0, 3.0));
        let id = host.create_primitive(desc).unwrap();
        assert!(host.contains(id));
        assert!(!host.is_visible(id));
        host.set_visible(id, true).unwrap();
        assert!(host.is_visible(id));
        host.update_primitive(id, PrimitivePatch::new().scale(2.0)).unwrap();
        assert!((host.primitive(id).unwrap().scale - 2.0).abs() < f64::EPSILON);
        host.remove_primitive(id).unwrap();
        assert_eq!(host.remove_primitive(id), Err(HostError::UnknownPrimitive(id)));
        assert_eq!(host.churn(), (1, 1));
    }

    #[test]
    fn test_disposed_host_rejects_picks() {
        let host = HeadlessHost::new();
        host.dispose();
        assert_eq!(host.pick(Vec2::zeros()), Err(HostError::Disposed));
    }

    #[tokio::test]
    async fn test_scripted_resource_failure() {
        let host = HeadlessHost::new();
        host.fail_resource("models/broken.glb");
        assert!(host.load_resource("models/ok.glb").await.is_ok());
        let err = host.load_resource("models/broken.glb").await.unwrap_err();
        assert!(matches!(err, HostError::ResourceUnavailable { .. }));
        assert_eq!(host.resource_loads(), 1);
    }
}
