use std::sync::{Arc, Weak};

use log::trace;

use crate::area::SubRect;
use crate::slab::{Slab, SlabId};

/// A packed sub-image: which slab it lives in and where.
///
/// Handles compare (and hash) by slab only. Two handles are equal when they
/// can be drawn in the same batch, even if they show different sub-images.
///
/// The handle never keeps its slab alive; every GPU access goes through the
/// slab id and a weak reference, so a disposed or dropped slab is detected
/// rather than used.
#[derive(Clone)]
pub struct TextureHandle {
    slab_id: SlabId,
    slab: Weak<Slab>,
    slab_size: [u32; 2],
    area: SubRect,
    disposed: bool,
}

impl std::fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureHandle")
            .field("slab_id", &self.slab_id)
            .field("area", &self.area)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl TextureHandle {
    pub(crate) fn new(slab: &Arc<Slab>, area: SubRect) -> Self {
        debug_assert!(area.fits_in(slab.size()));
        Self {
            slab_id: slab.id(),
            slab: Arc::downgrade(slab),
            slab_size: slab.size(),
            area,
            disposed: false,
        }
    }

    pub fn slab_id(&self) -> SlabId {
        self.slab_id
    }

    /// Size of the packed sub-image. The slab's size is never exposed here.
    pub fn size(&self) -> [u32; 2] {
        self.area.size()
    }

    /// Placement inside the slab, in slab pixels.
    pub fn area(&self) -> SubRect {
        self.area
    }

    /// The slab, if it is still alive and not disposed.
    pub fn slab(&self) -> Option<Arc<Slab>> {
        self.slab.upgrade().filter(|slab| !slab.is_disposed())
    }

    /// Whether the handle can still be bound.
    pub fn is_valid(&self) -> bool {
        !self.disposed && self.slab().is_some()
    }

    /// Normalized `[min, max]` UV corners of the sub-image in its slab.
    pub fn uv_bounds(&self) -> [[f32; 2]; 2] {
        self.area.uv_bounds(self.slab_size)
    }

    /// Map UVs local to the sub-image (`[0, 1]²`) into slab UV space.
    pub fn translate_uv(&self, uvs: &[[f32; 2]]) -> Vec<[f32; 2]> {
        let [min, max] = self.uv_bounds();
        uvs.iter()
            .map(|&[u, v]| {
                [
                    (min[0] + u * (max[0] - min[0])).clamp(0.0, 1.0),
                    (min[1] + v * (max[1] - min[1])).clamp(0.0, 1.0),
                ]
            })
            .collect()
    }

    /// Bind the slab this handle points into.
    ///
    /// # Panics
    ///
    /// Panics if the handle was disposed, or its slab was disposed or dropped.
    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>, index: u32) {
        assert!(
            !self.disposed,
            "TextureHandle::bind: handle into slab {} used after dispose",
            self.slab_id
        );
        let slab = self.slab.upgrade().unwrap_or_else(|| {
            panic!(
                "TextureHandle::bind: slab {} was dropped while a handle still refers to it",
                self.slab_id
            )
        });
        slab.bind(render_pass, index);
    }

    /// Mark the handle invalid.
    ///
    /// The area stays occupied in the slab; packed space is not reclaimed.
    pub fn dispose(&mut self) {
        if !self.disposed {
            trace!(
                "TextureHandle::dispose: released {:?} in slab {}",
                self.area, self.slab_id
            );
            self.disposed = true;
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.slab_id == other.slab_id
    }
}

impl Eq for TextureHandle {}

impl std::hash::Hash for TextureHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slab_id.hash(state);
    }
}
