use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use thiserror::Error;

use crate::area::SubRect;
use crate::pixel_format::PixelFormat;

pub(crate) mod readback;

static SLAB_ID: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// Process-unique identity of a slab. Never reused, even after disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlabId {
    id: usize,
}

impl SlabId {
    fn new() -> Self {
        let id = SLAB_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Self { id }
    }
}

impl std::fmt::Display for SlabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// One fixed-size GPU surface that packed sub-images are stitched into.
///
/// The texture is RGBA8, sampled with nearest filtering and repeat addressing.
/// Pixel coordinates are top-left origin, which is also wgpu's texel origin,
/// so uploads and readbacks need no vertical flip.
pub struct Slab {
    id: SlabId,
    size: [u32; 2],
    device: wgpu::Device,
    queue: wgpu::Queue,
    // `None` once disposed.
    resources: RwLock<Option<SlabResources>>,
}

struct SlabResources {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl std::fmt::Debug for Slab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slab")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Constructor and information methods.
impl Slab {
    /// Every byte written to a slab is treated as sRGB-encoded colour.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Allocate a slab of exactly `size` pixels.
    ///
    /// # Panics
    ///
    /// A zero dimension or one above the device's `max_texture_dimension_2d`
    /// is an unsupported configuration and aborts.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        size: [u32; 2],
    ) -> Arc<Self> {
        let max_dimension = device.limits().max_texture_dimension_2d;
        assert!(
            size[0] > 0 && size[1] > 0,
            "Slab::new: slab size must be non-zero, got {size:?}"
        );
        assert!(
            size[0] <= max_dimension && size[1] <= max_dimension,
            "Slab::new: slab size {size:?} exceeds the device limit of {max_dimension}px"
        );

        let id = SlabId::new();
        let resources = Self::create_resources(device, layout, id, size);
        debug!("Slab::new: created slab id={id} size={size:?}");

        Arc::new(Self {
            id,
            size,
            device: device.clone(),
            queue: queue.clone(),
            resources: RwLock::new(Some(resources)),
        })
    }

    /// The layout every slab bind group follows:
    /// binding 0 is the texture view, binding 1 the sampler.
    pub fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slab_bind_group_layout"),
            entries: &[
                // texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    pub fn id(&self) -> SlabId {
        self.id
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn is_disposed(&self) -> bool {
        self.resources.read().is_none()
    }

    /// Clone of the underlying texture, e.g. to render into it.
    ///
    /// # Panics
    ///
    /// Panics if the slab has been disposed.
    pub fn texture(&self) -> wgpu::Texture {
        self.live("texture").texture.clone()
    }
}

/// GPU operations.
impl Slab {
    /// Make this slab the sampled texture of `render_pass` at bind group `index`.
    ///
    /// # Panics
    ///
    /// Panics if the slab has been disposed.
    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>, index: u32) {
        let resources = self.live("bind");
        render_pass.set_bind_group(index, &resources.bind_group, &[]);
    }

    /// Upload a tightly packed row-major buffer into `rect`.
    ///
    /// # Panics
    ///
    /// Panics if the slab has been disposed.
    pub fn upload_region(
        &self,
        rect: SubRect,
        pixels: &[u8],
        format: PixelFormat,
    ) -> Result<(), SlabError> {
        trace!(
            "Slab::upload_region: slab={} rect={rect:?} format={format:?} bytes={}",
            self.id,
            pixels.len()
        );
        check_buffer_len(rect.size(), pixels, format)?;
        if !rect.fits_in(self.size) {
            warn!(
                "Slab::upload_region: rect {rect:?} is outside slab {} of size {:?}",
                self.id, self.size
            );
            return Err(SlabError::OutOfBounds {
                rect,
                slab_size: self.size,
            });
        }

        let resources = self.live("upload_region");
        if rect.is_empty() {
            return Ok(());
        }

        let rgba = format.to_rgba8(pixels);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &resources.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.x,
                    y: rect.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(rect.width * PixelFormat::Rgba8.bytes_per_pixel()),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: rect.width,
                height: rect.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(())
    }

    /// Read the whole slab back as tightly packed RGBA8, rows top to bottom.
    ///
    /// Blocks until the GPU has finished every submitted upload.
    ///
    /// # Panics
    ///
    /// Panics if the slab has been disposed.
    pub fn read_all(&self) -> Result<Vec<u8>, SlabError> {
        let texture = self.live("read_all").texture.clone();
        let (pixels, _) = readback::read_texture(&self.device, &self.queue, &texture)?;
        Ok(pixels)
    }

    /// Read another texture on this slab's device, e.g. to stitch it in.
    pub(crate) fn read_foreign_texture(
        &self,
        texture: &wgpu::Texture,
    ) -> Result<(Vec<u8>, PixelFormat), SlabError> {
        readback::read_texture(&self.device, &self.queue, texture)
    }

    /// Check that `texture` could be read back without reading it.
    pub(crate) fn check_readable(texture: &wgpu::Texture) -> Result<PixelFormat, SlabError> {
        readback::readable_format(texture)
    }

    /// Release the GPU texture. Calling this again is a no-op.
    pub fn dispose(&self) {
        if let Some(resources) = self.resources.write().take() {
            resources.texture.destroy();
            debug!("Slab::dispose: disposed slab id={}", self.id);
        }
    }
}

// helper functions
impl Slab {
    fn live(&self, operation: &str) -> MappedRwLockReadGuard<'_, SlabResources> {
        RwLockReadGuard::map(self.resources.read(), |resources| {
            resources.as_ref().unwrap_or_else(|| {
                panic!("Slab::{operation}: slab {} used after dispose", self.id)
            })
        })
    }

    fn create_resources(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        id: SlabId,
        size: [u32; 2],
    ) -> SlabResources {
        let texture_label = format!("slab_texture_{id}");

        // wgpu zero-initializes textures, so a new slab starts fully transparent.
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&texture_label),
            size: wgpu::Extent3d {
                width: size[0],
                height: size[1],
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("slab_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("slab_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        SlabResources {
            texture,
            bind_group,
        }
    }
}

/// Check that `pixels` holds exactly one `size` image in `format`.
pub(crate) fn check_buffer_len(
    size: [u32; 2],
    pixels: &[u8],
    format: PixelFormat,
) -> Result<(), SlabError> {
    // An overflowing expectation can never match a real buffer.
    let expected = format.buffer_len(size).unwrap_or(usize::MAX);
    if pixels.len() != expected {
        warn!(
            "check_buffer_len: buffer of {} bytes does not match {size:?} in {format:?} ({expected} bytes)",
            pixels.len()
        );
        return Err(SlabError::Format {
            size,
            format,
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

#[derive(Error, Debug)]
pub enum SlabError {
    #[error(
        "Pixel buffer of {actual} bytes does not match a {size:?} image in {format:?} ({expected} bytes)."
    )]
    Format {
        size: [u32; 2],
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
    #[error("Region {rect:?} lies outside the slab of size {slab_size:?}.")]
    OutOfBounds { rect: SubRect, slab_size: [u32; 2] },
    #[error("Texture format {0:?} cannot be read back as 8-bit colour.")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("Texture was not created with COPY_SRC usage and cannot be read back.")]
    NotCopySource,
    #[error("Mapping the readback buffer failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
    #[error("The readback buffer was dropped before it was mapped.")]
    MapCallbackDropped,
    #[error("Waiting for the device failed: {0}")]
    Poll(#[from] wgpu::PollError),
}
