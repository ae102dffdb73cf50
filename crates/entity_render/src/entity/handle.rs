//! Visual handles: the host primitives owned by one entity
//!
//! Every primitive carries a single [`DetailMask`] role. Level-of-detail,
//! culling and caller visibility all reduce to one mask per entity, and
//! [`VisualHandle::sync_visibility`] only touches parts whose state changes.

use bitflags::bitflags;

use crate::host::{HostError, PrimitiveDesc, PrimitiveId, PrimitivePatch, RenderHost};

bitflags! {
    /// Sub-element roles of a visual handle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DetailMask: u8 {
        /// The entity's main shape
        const PRIMARY = 1 << 0;
        /// Text label
        const LABEL = 1 << 1;
        /// Direction arrow
        const ARROW = 1 << 2;
        /// Animated flow or head marker
        const FLOW = 1 << 3;
        /// Trailing (historical) geometry
        const TRAIL = 1 << 4;
        /// Start/end markers
        const ENDPOINTS = 1 << 5;
        /// Predicted (future) geometry
        const PREDICTION = 1 << 6;
    }
}

/// One primitive of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualPart {
    /// Host primitive
    pub primitive: PrimitiveId,
    /// Role used for detail toggling
    pub role: DetailMask,
    shown: bool,
}

impl VisualPart {
    /// Whether the host currently draws this part
    pub const fn is_shown(&self) -> bool {
        self.shown
    }
}

/// Primitives owned by one entity
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VisualHandle {
    parts: Vec<VisualPart>,
}

impl VisualHandle {
    /// All parts in creation order
    pub fn parts(&self) -> &[VisualPart] {
        &self.parts
    }

    /// Number of primitives
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the handle owns nothing
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Every primitive id
    pub fn primitive_ids(&self) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.parts.iter().map(|p| p.primitive)
    }

    /// First primitive with a role
    pub fn part(&self, role: DetailMask) -> Option<PrimitiveId> {
        self.parts.iter().find(|p| p.role == role).map(|p| p.primitive)
    }

    /// All primitives with a role
    pub fn parts_with(&self, role: DetailMask) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.parts.iter().filter(move |p| p.role == role).map(|p| p.primitive)
    }

    /// Patch the first primitive with a role; no-op when absent
    pub fn patch(&self, host: &dyn RenderHost, role: DetailMask, patch: PrimitivePatch) -> Result<bool, HostError> {
        match self.part(role) {
            Some(id) => host.update_primitive(id, patch).map(|()| true),
            None => Ok(false),
        }
    }

    /// Create a hidden primitive and adopt it
    pub fn attach(&mut self, host: &dyn RenderHost, role: DetailMask, desc: PrimitiveDesc) -> Result<PrimitiveId, HostError> {
        let primitive = host.create_primitive(PrimitiveDesc { visible: false, ..desc })?;
        self.parts.push(VisualPart {
            primitive,
            role,
            shown: false,
        });
        Ok(primitive)
    }

    /// Remove every primitive with a role
    pub fn detach(&mut self, host: &dyn RenderHost, role: DetailMask) -> Result<usize, HostError> {
        let mut removed = 0;
        let mut first_error = None;
        self.parts.retain(|part| {
            if part.role != role {
                return true;
            }
            removed += 1;
            if let Err(e) = host.remove_primitive(part.primitive) {
                first_error.get_or_insert(e);
            }
            false
        });
        first_error.map_or(Ok(removed), Err)
    }

    /// Make the role's part match `desired`: patch it, create it or remove it
    pub fn sync_part(
        &mut self,
        host: &dyn RenderHost,
        role: DetailMask,
        desired: Option<PrimitiveDesc>,
    ) -> Result<(), HostError> {
        match (self.part(role), desired) {
            (Some(id), Some(desc)) => host.update_primitive(id, PrimitivePatch::replace_with(desc)),
            (None, Some(desc)) => self.attach(host, role, desc).map(|_| ()),
            (Some(_), None) => self.detach(host, role).map(|_| ()),
            (None, None) => Ok(()),
        }
    }

    /// Like [`Self::sync_part`], but an existing part only receives new positions
    ///
    /// Leaves materials alone, so a highlight applied to the part survives.
    pub fn sync_positions(
        &mut self,
        host: &dyn RenderHost,
        role: DetailMask,
        desired: Option<PrimitiveDesc>,
    ) -> Result<(), HostError> {
        match (self.part(role), desired) {
            (Some(id), Some(desc)) => host.update_primitive(id, PrimitivePatch::new().positions(desc.positions)),
            (_, desired) => self.sync_part(host, role, desired),
        }
    }

    /// Show exactly the parts whose role is in `mask`
    ///
    /// Returns the number of host visibility calls made.
    pub fn sync_visibility(&mut self, host: &dyn RenderHost, mask: DetailMask) -> Result<usize, HostError> {
        let mut changed = 0;
        for part in &mut self.parts {
            let wanted = mask.contains(part.role);
            if part.shown != wanted {
                host.set_visible(part.primitive, wanted)?;
                part.shown = wanted;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Remove every primitive; all removals are attempted
    pub fn release(self, host: &dyn RenderHost) -> Result<(), HostError> {
        let mut first_error = None;
        for part in self.parts {
            if let Err(e) = host.remove_primitive(part.primitive) {
                log::warn!("Failed to remove {}: {}", part.primitive, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Collects primitives while a handle is built
///
/// Dropping the builder without [`HandleBuilder::finish`] removes everything
/// it created, so a failed build never leaves a partial handle on the host.
pub struct HandleBuilder<'a> {
    host: &'a dyn RenderHost,
    handle: VisualHandle,
}

impl<'a> HandleBuilder<'a> {
    /// Start an empty handle
    pub fn new(host: &'a dyn RenderHost) -> Self {
        Self {
            host,
            handle: VisualHandle::default(),
        }
    }

    /// Create a hidden primitive with a role
    pub fn create(&mut self, role: DetailMask, desc: PrimitiveDesc) -> Result<PrimitiveId, HostError> {
        self.handle.attach(self.host, role, desc)
    }

    /// Create a primitive only when `desc` is present
    pub fn create_optional(&mut self, role: DetailMask, desc: Option<PrimitiveDesc>) -> Result<(), HostError> {
        match desc {
            Some(desc) => self.create(role, desc).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Hand over the completed handle
    pub fn finish(mut self) -> VisualHandle {
        std::mem::take(&mut self.handle)
    }

    /// Remove everything created so far
    pub fn abandon(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        let handle = std::mem::take(&mut self.handle);
        if !handle.is_empty() {
            log::debug!("Discarding {} primitives of an unfinished handle", handle.len());
        }
        if let Err(e) = handle.release(self.host) {
            log::warn!("Cleanup of unfinished handle failed: {}", e);
        }
    }
}

impl Drop for HandleBuilder<'_> {
    fn drop(&mut self) {
        self.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessHost, PrimitiveKind};
    use crate::library::Catalog;

    fn marker(catalog: &Catalog) -> PrimitiveDesc {
        PrimitiveDesc::new(PrimitiveKind::Marker, catalog.basic())
    }

    #[test]
    fn test_dropped_builder_leaves_nothing() {
        let host = HeadlessHost::new();
        let catalog = Catalog::standard();
        {
            let mut builder = HandleBuilder::new(&host);
            builder.create(DetailMask::PRIMARY, marker(&catalog)).unwrap();
            builder.create(DetailMask::LABEL, marker(&catalog)).unwrap();
            assert_eq!(host.primitive_count(), 2);
        }
        assert_eq!(host.primitive_count(), 0);
    }

    #[test]
    fn test_visibility_only_touches_changed_parts() {
        let host = HeadlessHost::new();
        let catalog = Catalog::standard();
        let mut builder = HandleBuilder::new(&host);
        builder.create(DetailMask::PRIMARY, marker(&catalog)).unwrap();
        builder.create(DetailMask::LABEL, marker(&catalog)).unwrap();
        let mut handle = builder.finish();
        assert_eq!(host.primitive_count(), 2);

        assert_eq!(handle.sync_visibility(&host, DetailMask::all()).unwrap(), 2);
        assert_eq!(handle.sync_visibility(&host, DetailMask::all()).unwrap(), 0);
        assert_eq!(handle.sync_visibility(&host, DetailMask::PRIMARY).unwrap(), 1);
        assert!(!host.is_visible(handle.part(DetailMask::LABEL).unwrap()));

        handle.release(&host).unwrap();
        assert_eq!(host.primitive_count(), 0);
    }

    #[test]
    fn test_sync_part_creates_patches_and_removes() {
        let host = HeadlessHost::new();
        let catalog = Catalog::standard();
        let mut handle = VisualHandle::default();
        handle
            .sync_part(&host, DetailMask::LABEL, Some(marker(&catalog).with_text("a")))
            .unwrap();
        let id = handle.part(DetailMask::LABEL).unwrap();
        handle
            .sync_part(&host, DetailMask::LABEL, Some(marker(&catalog).with_text("b")))
            .unwrap();
        assert_eq!(handle.part(DetailMask::LABEL), Some(id));
        assert_eq!(host.primitive(id).unwrap().text.as_deref(), Some("b"));
        handle.sync_part(&host, DetailMask::LABEL, None).unwrap();
        assert!(handle.is_empty());
        assert!(!host.contains(id));
    }
}
