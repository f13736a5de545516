use std::sync::Arc;

use crate::area::SubRect;
use crate::handle::TextureHandle;
use crate::pixel_format::PixelFormat;
use crate::slab::{Slab, SlabError, SlabId};

/// A texture a sprite can draw: either a surface of its own or a view into a
/// shared slab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Texture {
    Owned(OwnedTexture),
    Packed(TextureHandle),
}

impl Texture {
    pub fn slab_id(&self) -> SlabId {
        match self {
            Texture::Owned(owned) => owned.slab_id(),
            Texture::Packed(handle) => handle.slab_id(),
        }
    }

    pub fn size(&self) -> [u32; 2] {
        match self {
            Texture::Owned(owned) => owned.size(),
            Texture::Packed(handle) => handle.size(),
        }
    }

    pub fn uv_bounds(&self) -> [[f32; 2]; 2] {
        match self {
            Texture::Owned(_) => [[0.0, 0.0], [1.0, 1.0]],
            Texture::Packed(handle) => handle.uv_bounds(),
        }
    }

    /// # Panics
    ///
    /// Panics if the texture or its slab has been disposed.
    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>, index: u32) {
        match self {
            Texture::Owned(owned) => owned.bind(render_pass, index),
            Texture::Packed(handle) => handle.bind(render_pass, index),
        }
    }

    /// An owned texture frees its surface; a packed one only invalidates the handle.
    pub fn dispose(&mut self) {
        match self {
            Texture::Owned(owned) => owned.dispose(),
            Texture::Packed(handle) => handle.dispose(),
        }
    }
}

impl From<OwnedTexture> for Texture {
    fn from(owned: OwnedTexture) -> Self {
        Texture::Owned(owned)
    }
}

impl From<TextureHandle> for Texture {
    fn from(handle: TextureHandle) -> Self {
        Texture::Packed(handle)
    }
}

/// A slab holding exactly one image and owned by it.
#[derive(Debug, Clone)]
pub struct OwnedTexture {
    slab: Arc<Slab>,
}

impl OwnedTexture {
    /// Create a slab the size of `pixels` and upload them.
    pub fn from_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        pixels: &[u8],
        size: [u32; 2],
        format: PixelFormat,
    ) -> Result<Self, SlabError> {
        crate::slab::check_buffer_len(size, pixels, format)?;
        let slab = Slab::new(device, queue, layout, size);
        slab.upload_region(SubRect::from_size(size), pixels, format)?;
        Ok(Self { slab })
    }

    pub fn slab(&self) -> &Arc<Slab> {
        &self.slab
    }

    pub fn slab_id(&self) -> SlabId {
        self.slab.id()
    }

    pub fn size(&self) -> [u32; 2] {
        self.slab.size()
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>, index: u32) {
        self.slab.bind(render_pass, index);
    }

    pub fn dispose(&self) {
        self.slab.dispose();
    }
}

impl PartialEq for OwnedTexture {
    fn eq(&self, other: &Self) -> bool {
        self.slab.id() == other.slab.id()
    }
}

impl Eq for OwnedTexture {}

impl std::hash::Hash for OwnedTexture {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slab.id().hash(state);
    }
}
