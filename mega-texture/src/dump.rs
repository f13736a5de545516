//! Debug dumps of slab contents. Not meant for production paths.

use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::config::AtlasConfig;
use crate::slab::{Slab, SlabError};

/// Write the full contents of `slab` to `<dir>/slab_<id>.png`.
///
/// `dir` is created if it does not exist. Blocks on a GPU readback.
pub fn dump_slab(slab: &Slab, dir: impl AsRef<Path>) -> Result<PathBuf, DumpError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let [width, height] = slab.size();
    let pixels = slab.read_all()?;
    let image =
        image::RgbaImage::from_raw(width, height, pixels).ok_or(DumpError::BufferSize)?;

    let path = dir.join(format!("slab_{}.png", slab.id()));
    image.save_with_format(&path, image::ImageFormat::Png)?;
    debug!("dump_slab: wrote {}", path.display());

    Ok(path)
}

/// [`dump_slab`] into the configured debug directory.
pub fn dump_slab_default(slab: &Slab, config: &AtlasConfig) -> Result<PathBuf, DumpError> {
    dump_slab(slab, &config.dump_dir)
}

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Failed to create the dump directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode the dump: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Slab(#[from] SlabError),
    #[error("Readback size does not match the slab size.")]
    BufferSize,
}
