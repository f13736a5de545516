use std::path::PathBuf;

/// Settings for a [`SlabManager`](crate::SlabManager).
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Size of every slab the manager opens for packing.
    pub slab_size: [u32; 2],
    /// Directory debug dumps are written to. Created on first dump.
    pub dump_dir: PathBuf,
}

impl AtlasConfig {
    pub const DEFAULT_SLAB_SIZE: [u32; 2] = [1024, 1024];
    pub const DEFAULT_DUMP_DIR: &'static str = "debug/textures";
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            slab_size: Self::DEFAULT_SLAB_SIZE,
            dump_dir: PathBuf::from(Self::DEFAULT_DUMP_DIR),
        }
    }
}
