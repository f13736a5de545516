//! Shelf packing: blocks are laid left to right along a shelf, and a block
//! that does not fit horizontally opens a new shelf below the tallest block
//! of the current one.
//!
//! Placement only looks at the cursor, never at earlier placements, so space
//! left above short blocks or at the end of a wrapped shelf is never reused.
//! Placements therefore depend only on insertion order, and sprite UVs stay
//! stable across runs that load the same assets in the same order.

use std::sync::Arc;

use log::{debug, trace};

use crate::area::SubRect;
use crate::handle::TextureHandle;
use crate::pixel_format::PixelFormat;
use crate::slab::{Slab, SlabError, check_buffer_len};

/// Where the next block goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackCursor {
    x_offset: u32,
    shelf_y: u32,
    shelf_height: u32,
}

impl PackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Horizontal write position on the current shelf.
    pub fn x_offset(&self) -> u32 {
        self.x_offset
    }

    /// Top of the current shelf.
    pub fn shelf_y(&self) -> u32 {
        self.shelf_y
    }

    /// Tallest block placed on the current shelf so far.
    pub fn shelf_height(&self) -> u32 {
        self.shelf_height
    }

    /// Place a `size` block inside `bounds` and advance.
    ///
    /// Returns `None` when there is no room; the cursor is then left untouched.
    pub fn place(&mut self, bounds: [u32; 2], size: [u32; 2]) -> Option<SubRect> {
        let (area, next) = self.peek(bounds, size)?;
        *self = next;
        Some(area)
    }

    /// The placement `place` would make, and the cursor it would leave behind.
    pub fn peek(&self, bounds: [u32; 2], size: [u32; 2]) -> Option<(SubRect, PackCursor)> {
        let [width, height] = size;
        let mut next = *self;

        if next.x_offset as u64 + width as u64 > bounds[0] as u64 {
            next.x_offset = 0;
            next.shelf_y += next.shelf_height;
            next.shelf_height = 0;
        }

        if height as u64 + next.shelf_y as u64 > bounds[1] as u64 {
            return None;
        }
        // Still too wide on an empty shelf: wider than the slab itself.
        if width > bounds[0] {
            return None;
        }

        let area = SubRect::new(next.x_offset, next.shelf_y, width, height);
        next.shelf_height = next.shelf_height.max(height);
        next.x_offset += width;

        Some((area, next))
    }
}

/// Stitches pixel blocks into one slab.
///
/// Packing mutates the cursor through `&mut self`; the packer is meant to be
/// driven from a single loading thread.
pub struct ShelfPacker {
    slab: Arc<Slab>,
    cursor: PackCursor,
    used_area: u64,
    placed_count: usize,
}

impl std::fmt::Debug for ShelfPacker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelfPacker")
            .field("slab", &self.slab.id())
            .field("cursor", &self.cursor)
            .field("placed_count", &self.placed_count)
            .finish()
    }
}

impl ShelfPacker {
    pub fn new(slab: Arc<Slab>) -> Self {
        Self {
            slab,
            cursor: PackCursor::new(),
            used_area: 0,
            placed_count: 0,
        }
    }

    pub fn slab(&self) -> &Arc<Slab> {
        &self.slab
    }

    pub fn cursor(&self) -> PackCursor {
        self.cursor
    }

    /// Total pixel area of every block placed so far.
    pub fn used_area(&self) -> u64 {
        self.used_area
    }

    pub fn placed_count(&self) -> usize {
        self.placed_count
    }

    /// Whether not even a 1x1 block fits any more.
    pub fn is_full(&self) -> bool {
        self.cursor.peek(self.slab.size(), [1, 1]).is_none()
    }

    /// Place `pixels` (a `size` image in `format`) in the slab.
    ///
    /// `Ok(None)` means the slab has no room left for this block; nothing was
    /// uploaded and the cursor did not move. Callers typically open a fresh
    /// slab and retry.
    ///
    /// # Panics
    ///
    /// Panics if the slab has been disposed.
    pub fn stitch(
        &mut self,
        pixels: &[u8],
        size: [u32; 2],
        format: PixelFormat,
    ) -> Result<Option<TextureHandle>, SlabError> {
        assert!(
            !self.slab.is_disposed(),
            "ShelfPacker::stitch: slab {} used after dispose",
            self.slab.id()
        );
        check_buffer_len(size, pixels, format)?;

        let Some((area, next)) = self.cursor.peek(self.slab.size(), size) else {
            trace!(
                "ShelfPacker::stitch: no room for {size:?} in slab {} (cursor {:?})",
                self.slab.id(),
                self.cursor
            );
            return Ok(None);
        };

        self.slab.upload_region(area, pixels, format)?;
        self.cursor = next;
        self.used_area += area.area();
        self.placed_count += 1;
        trace!(
            "ShelfPacker::stitch: placed {size:?} at {:?} in slab {}",
            area.position(),
            self.slab.id()
        );

        Ok(Some(TextureHandle::new(&self.slab, area)))
    }

    /// Stitch the contents of a texture that already lives on the GPU.
    ///
    /// The texture must be an 8-bit colour format created with `COPY_SRC`.
    /// Only mip 0 of layer 0 is copied. The readback is skipped when the
    /// block could not be placed anyway.
    ///
    /// Texel bytes are copied as they are. A linear source such as
    /// `Rgba8Unorm` is therefore sampled as sRGB from the slab and looks
    /// darker than it did on its own.
    ///
    /// # Panics
    ///
    /// Panics if the slab has been disposed.
    pub fn stitch_texture(
        &mut self,
        texture: &wgpu::Texture,
    ) -> Result<Option<TextureHandle>, SlabError> {
        assert!(
            !self.slab.is_disposed(),
            "ShelfPacker::stitch_texture: slab {} used after dispose",
            self.slab.id()
        );
        let size = [texture.width(), texture.height()];
        if self.cursor.peek(self.slab.size(), size).is_none() {
            trace!(
                "ShelfPacker::stitch_texture: no room for {size:?} in slab {}",
                self.slab.id()
            );
            return Ok(None);
        }

        let (pixels, format) = self.slab.read_foreign_texture(texture)?;
        debug!("ShelfPacker::stitch_texture: read back {size:?} {format:?} texture");
        self.stitch(&pixels, size, format)
    }
}
