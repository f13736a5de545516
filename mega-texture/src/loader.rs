//! Entry points that turn image files and buffers into packed textures.
//!
//! Everything loaded here is expected to be loaded once at startup, so a block
//! that does not fit is an error rather than a result to branch on.

use std::path::Path;

use log::{debug, warn};
use thiserror::Error;

use crate::handle::TextureHandle;
use crate::manager::SlabManager;
use crate::pixel_format::PixelFormat;
use crate::slab::SlabError;

/// Decode an image file (any format `image` was built with) and pack it.
pub fn load_file(
    manager: &mut SlabManager,
    path: impl AsRef<Path>,
) -> Result<TextureHandle, LoadError> {
    let path = path.as_ref();
    let image = image::open(path)?.to_rgba8();
    debug!(
        "load_file: decoded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    pack_rgba8(manager, image)
}

/// Decode an encoded image held in memory and pack it.
pub fn load_memory(manager: &mut SlabManager, bytes: &[u8]) -> Result<TextureHandle, LoadError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    pack_rgba8(manager, image)
}

/// Pack an already decoded pixel buffer, e.g. a generated texture.
pub fn load_pixels(
    manager: &mut SlabManager,
    pixels: &[u8],
    size: [u32; 2],
    format: PixelFormat,
) -> Result<TextureHandle, LoadError> {
    manager.stitch(pixels, size, format)?.ok_or_else(|| {
        warn!("load_pixels: no slab can hold a {size:?} block");
        LoadError::NoRoom { size }
    })
}

fn pack_rgba8(
    manager: &mut SlabManager,
    image: image::RgbaImage,
) -> Result<TextureHandle, LoadError> {
    let size = [image.width(), image.height()];
    load_pixels(manager, image.as_raw(), size, PixelFormat::Rgba8)
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Slab(#[from] SlabError),
    #[error("No slab has room for a {size:?} image.")]
    NoRoom { size: [u32; 2] },
}
