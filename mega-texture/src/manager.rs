use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::config::AtlasConfig;
use crate::handle::TextureHandle;
use crate::pixel_format::PixelFormat;
use crate::shelf::{PackCursor, ShelfPacker};
use crate::slab::{Slab, SlabError, SlabId, check_buffer_len};
use crate::texture::OwnedTexture;

/// Owns every slab and decides where new blocks are packed.
///
/// Blocks go into the first packer with room, in the order the slabs were
/// opened. When none has room a fresh slab of `AtlasConfig::slab_size` is
/// opened and the block is retried there once. Packers that cannot take even
/// a 1x1 block are retired; their slabs stay registered.
///
/// Slab disposal is deferred: [`schedule_dispose`](Self::schedule_dispose)
/// takes a slab out of packing right away, and [`end_frame`](Self::end_frame)
/// frees it once the frame that may still sample it has been submitted.
pub struct SlabManager {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: AtlasConfig,
    bind_group_layout: wgpu::BindGroupLayout,

    slabs: BTreeMap<SlabId, Arc<Slab>>,
    packers: Vec<ShelfPacker>,
    pending_disposal: Vec<SlabId>,
}

impl std::fmt::Debug for SlabManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlabManager")
            .field("config", &self.config)
            .field("slabs", &self.slabs.keys().collect::<Vec<_>>())
            .field("packers", &self.packers)
            .field("pending_disposal", &self.pending_disposal)
            .finish()
    }
}

impl SlabManager {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: AtlasConfig) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            bind_group_layout: Slab::create_bind_group_layout(device),
            config,
            slabs: BTreeMap::new(),
            packers: Vec::new(),
            pending_disposal: Vec::new(),
        }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// The layout sprite pipelines must use for the slab bind group.
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn slab(&self, id: SlabId) -> Option<&Arc<Slab>> {
        self.slabs.get(&id)
    }

    /// Every registered slab, oldest first.
    pub fn slabs(&self) -> impl Iterator<Item = &Arc<Slab>> {
        self.slabs.values()
    }

    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Packers still accepting blocks, oldest first.
    pub fn packers(&self) -> &[ShelfPacker] {
        &self.packers
    }

    /// Create and register a slab that is not used for packing.
    ///
    /// # Panics
    ///
    /// Panics if the device cannot allocate `size`, see [`Slab::new`].
    pub fn create_slab(&mut self, size: [u32; 2]) -> Arc<Slab> {
        let slab = Slab::new(&self.device, &self.queue, &self.bind_group_layout, size);
        self.slabs.insert(slab.id(), Arc::clone(&slab));
        slab
    }

    /// Upload `pixels` as a texture with a slab of its own.
    pub fn create_owned(
        &mut self,
        pixels: &[u8],
        size: [u32; 2],
        format: PixelFormat,
    ) -> Result<OwnedTexture, SlabError> {
        let owned = OwnedTexture::from_pixels(
            &self.device,
            &self.queue,
            &self.bind_group_layout,
            pixels,
            size,
            format,
        )?;
        self.slabs.insert(owned.slab_id(), Arc::clone(owned.slab()));
        Ok(owned)
    }
}

/// Packing.
impl SlabManager {
    /// Pack a block, opening a new slab when every open one is full.
    ///
    /// `Ok(None)` only when the block does not fit even an empty slab.
    pub fn stitch(
        &mut self,
        pixels: &[u8],
        size: [u32; 2],
        format: PixelFormat,
    ) -> Result<Option<TextureHandle>, SlabError> {
        check_buffer_len(size, pixels, format)?;

        for packer in &mut self.packers {
            if let Some(handle) = packer.stitch(pixels, size, format)? {
                return Ok(Some(handle));
            }
        }
        self.retire_full_packers();

        if !self.fits_empty_slab(size) {
            return Ok(None);
        }
        self.open_packer().stitch(pixels, size, format)
    }

    /// Pack the contents of an existing GPU texture, see [`ShelfPacker::stitch_texture`].
    ///
    /// A texture that cannot be read back is rejected before any slab is opened.
    pub fn stitch_texture(
        &mut self,
        texture: &wgpu::Texture,
    ) -> Result<Option<TextureHandle>, SlabError> {
        Slab::check_readable(texture)?;

        for packer in &mut self.packers {
            if let Some(handle) = packer.stitch_texture(texture)? {
                return Ok(Some(handle));
            }
        }
        self.retire_full_packers();

        if !self.fits_empty_slab([texture.width(), texture.height()]) {
            return Ok(None);
        }
        self.open_packer().stitch_texture(texture)
    }

    fn fits_empty_slab(&self, size: [u32; 2]) -> bool {
        let fits = PackCursor::new()
            .peek(self.config.slab_size, size)
            .is_some();
        if !fits {
            warn!(
                "SlabManager: block {size:?} is larger than a whole slab {:?}",
                self.config.slab_size
            );
        }
        fits
    }

    fn retire_full_packers(&mut self) {
        self.packers.retain(|packer| {
            let full = packer.is_full();
            if full {
                trace!(
                    "SlabManager: slab {} is full, no longer packed into",
                    packer.slab().id()
                );
            }
            !full
        });
    }

    fn open_packer(&mut self) -> &mut ShelfPacker {
        let slab = self.create_slab(self.config.slab_size);
        debug!(
            "SlabManager::open_packer: opened slab {} ({} packers)",
            slab.id(),
            self.packers.len() + 1
        );
        self.packers.push(ShelfPacker::new(slab));
        let last = self.packers.len() - 1;
        &mut self.packers[last]
    }
}

/// Disposal.
impl SlabManager {
    /// Queue a slab for disposal at the next [`end_frame`](Self::end_frame).
    ///
    /// The slab stops receiving new blocks immediately. Returns `false` if the
    /// id is unknown or already queued.
    pub fn schedule_dispose(&mut self, id: SlabId) -> bool {
        if !self.slabs.contains_key(&id) || self.pending_disposal.contains(&id) {
            return false;
        }
        self.packers.retain(|packer| packer.slab().id() != id);
        self.pending_disposal.push(id);
        trace!("SlabManager::schedule_dispose: slab {id} queued");
        true
    }

    pub fn pending_disposal(&self) -> &[SlabId] {
        &self.pending_disposal
    }

    /// Dispose every queued slab. Call between frames.
    ///
    /// Returns how many slabs were freed.
    pub fn end_frame(&mut self) -> usize {
        let mut disposed = 0;
        for id in self.pending_disposal.drain(..) {
            if let Some(slab) = self.slabs.remove(&id) {
                slab.dispose();
                disposed += 1;
            }
        }
        if disposed > 0 {
            debug!("SlabManager::end_frame: disposed {disposed} slab(s)");
        }
        disposed
    }

    /// Dispose every slab immediately, e.g. at shutdown.
    pub fn dispose_all(&mut self) {
        self.packers.clear();
        self.pending_disposal.clear();
        for (_, slab) in std::mem::take(&mut self.slabs) {
            slab.dispose();
        }
        debug!("SlabManager::dispose_all: all slabs disposed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::wgpu_utils::noop_wgpu;

    async fn manager(slab_size: [u32; 2]) -> SlabManager {
        let (_instance, _adapter, device, queue) = noop_wgpu().await;
        SlabManager::new(
            &device,
            &queue,
            AtlasConfig {
                slab_size,
                ..Default::default()
            },
        )
    }

    fn block(size: [u32; 2]) -> Vec<u8> {
        vec![0x7f; (size[0] * size[1] * 4) as usize]
    }

    #[tokio::test]
    async fn no_slab_is_opened_before_the_first_stitch() {
        let manager = manager([64, 64]).await;
        assert_eq!(manager.slab_count(), 0);
        assert!(manager.packers().is_empty());
    }

    #[tokio::test]
    async fn full_slab_rolls_over_to_a_new_one() {
        let mut manager = manager([64, 64]).await;

        let a = manager
            .stitch(&block([64, 48]), [64, 48], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();
        let b = manager
            .stitch(&block([64, 32]), [64, 32], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(b.area().position(), [0, 0]);
        assert_eq!(manager.slab_count(), 2);
    }

    #[tokio::test]
    async fn small_blocks_still_fill_older_slabs_first() {
        let mut manager = manager([64, 64]).await;

        let a = manager
            .stitch(&block([64, 48]), [64, 48], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();
        manager
            .stitch(&block([64, 32]), [64, 32], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();
        let c = manager
            .stitch(&block([16, 16]), [16, 16], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();

        assert_eq!(c, a);
        assert_eq!(c.area().position(), [0, 48]);
    }

    #[tokio::test]
    async fn block_larger_than_a_slab_has_no_room() {
        let mut manager = manager([64, 64]).await;
        let result = manager
            .stitch(&block([65, 1]), [65, 1], PixelFormat::Rgba8)
            .unwrap();

        assert!(result.is_none());
        assert_eq!(manager.slab_count(), 0);
    }

    #[tokio::test]
    async fn format_errors_do_not_open_slabs() {
        let mut manager = manager([64, 64]).await;
        let err = manager
            .stitch(&[0; 3], [1, 1], PixelFormat::Rgba8)
            .unwrap_err();

        assert!(matches!(err, SlabError::Format { .. }));
        assert_eq!(manager.slab_count(), 0);
    }

    #[tokio::test]
    async fn full_packers_are_retired() {
        let mut manager = manager([64, 64]).await;
        let whole = manager
            .stitch(&block([64, 64]), [64, 64], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();
        let next = manager
            .stitch(&block([8, 8]), [8, 8], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();

        assert_ne!(whole, next);
        assert_eq!(manager.slab_count(), 2);
        assert_eq!(manager.packers().len(), 1);
        assert_eq!(manager.packers()[0].slab().id(), next.slab_id());
        assert!(manager.slab(whole.slab_id()).is_some());
    }

    fn source_texture(
        manager: &SlabManager,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> wgpu::Texture {
        manager.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("stitch_source"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    }

    #[tokio::test]
    async fn rejected_sources_do_not_open_slabs() {
        let mut manager = manager([64, 64]).await;
        let no_copy = source_texture(
            &manager,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let float = source_texture(
            &manager,
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureUsages::COPY_SRC,
        );

        for _ in 0..3 {
            assert!(matches!(
                manager.stitch_texture(&no_copy),
                Err(SlabError::NotCopySource)
            ));
        }
        assert!(matches!(
            manager.stitch_texture(&float),
            Err(SlabError::UnsupportedFormat(wgpu::TextureFormat::Rgba16Float))
        ));

        assert_eq!(manager.slab_count(), 0);
        assert!(manager.packers().is_empty());
    }

    #[tokio::test]
    async fn disposal_waits_for_end_frame() {
        let mut manager = manager([64, 64]).await;
        let handle = manager
            .stitch(&block([8, 8]), [8, 8], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();
        let id = handle.slab_id();

        assert!(manager.schedule_dispose(id));
        assert!(!manager.schedule_dispose(id));
        assert!(handle.is_valid());
        assert!(manager.packers().is_empty());

        assert_eq!(manager.end_frame(), 1);
        assert!(!handle.is_valid());
        assert!(manager.slab(id).is_none());
        assert_eq!(manager.end_frame(), 0);
    }

    #[tokio::test]
    async fn scheduled_slab_receives_no_new_blocks() {
        let mut manager = manager([64, 64]).await;
        let first = manager
            .stitch(&block([8, 8]), [8, 8], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();
        manager.schedule_dispose(first.slab_id());

        let second = manager
            .stitch(&block([8, 8]), [8, 8], PixelFormat::Rgba8)
            .unwrap()
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn owned_textures_are_registered() {
        let mut manager = manager([64, 64]).await;
        let owned = manager
            .create_owned(&block([3, 5]), [3, 5], PixelFormat::Rgba8)
            .unwrap();

        assert_eq!(owned.size(), [3, 5]);
        assert!(manager.slab(owned.slab_id()).is_some());
        assert!(manager.packers().is_empty());
    }

    #[tokio::test]
    async fn dispose_all_frees_everything() {
        let mut manager = manager([64, 64]).await;
        let slab = manager.create_slab([16, 16]);
        manager
            .stitch(&block([8, 8]), [8, 8], PixelFormat::Rgba8)
            .unwrap();

        manager.dispose_all();
        assert!(slab.is_disposed());
        assert_eq!(manager.slab_count(), 0);
        assert!(manager.packers().is_empty());
    }
}
