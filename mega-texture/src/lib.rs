//! Runtime texture packing for 2D sprites.
//!
//! Pixel blocks of any size are stitched into a few large GPU textures
//! (slabs) so that sprites sharing a slab can be drawn in one batch.
//! A [`ShelfPacker`] places blocks into one [`Slab`]; a [`SlabManager`] owns
//! all slabs, opens new ones when the current ones are full and defers
//! disposal to the end of a frame.

pub mod area;
pub mod config;
pub mod dump;
pub mod handle;
pub mod loader;
pub mod manager;
pub mod pixel_format;
pub mod shelf;
pub mod slab;
pub mod texture;

#[cfg(debug_assertions)]
pub mod wgpu_utils;

pub use area::SubRect;
pub use config::AtlasConfig;
pub use dump::{DumpError, dump_slab, dump_slab_default};
pub use handle::TextureHandle;
pub use loader::{LoadError, load_file, load_memory, load_pixels};
pub use manager::SlabManager;
pub use pixel_format::PixelFormat;
pub use shelf::{PackCursor, ShelfPacker};
pub use slab::{Slab, SlabError, SlabId};
pub use texture::{OwnedTexture, Texture};
