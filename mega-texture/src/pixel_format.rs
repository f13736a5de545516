use std::borrow::Cow;

/// Layout of a tightly packed, row-major pixel buffer handed to a slab.
///
/// Slabs always store RGBA8; other layouts are expanded on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Rgba8,
    Bgra8,
    Rgb8,
    LumaAlpha8,
    Luma8,
    /// Red and green channels, as `Rg8Unorm` textures store them.
    Rg8,
    /// Red channel only, as `R8Unorm` textures store it.
    R8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::LumaAlpha8 | PixelFormat::Rg8 => 2,
            PixelFormat::Luma8 | PixelFormat::R8 => 1,
        }
    }

    /// Expected byte length of a `size` buffer in this format, `None` on overflow.
    pub fn buffer_len(self, size: [u32; 2]) -> Option<usize> {
        (size[0] as usize)
            .checked_mul(size[1] as usize)?
            .checked_mul(self.bytes_per_pixel() as usize)
    }

    /// The byte layout of a readable 8-bit texture format.
    ///
    /// Linear and sRGB variants share a layout: the bytes are taken as they
    /// are, and the slab samples them as sRGB.
    pub fn from_texture_format(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {
                Some(PixelFormat::Rgba8)
            }
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => {
                Some(PixelFormat::Bgra8)
            }
            wgpu::TextureFormat::Rg8Unorm => Some(PixelFormat::Rg8),
            wgpu::TextureFormat::R8Unorm => Some(PixelFormat::R8),
            _ => None,
        }
    }

    /// Expand `pixels` to RGBA8. The caller has already checked the length.
    pub fn to_rgba8(self, pixels: &[u8]) -> Cow<'_, [u8]> {
        match self {
            PixelFormat::Rgba8 => Cow::Borrowed(pixels),
            PixelFormat::Bgra8 => Cow::Owned(
                pixels
                    .chunks_exact(4)
                    .flat_map(|p| [p[2], p[1], p[0], p[3]])
                    .collect(),
            ),
            PixelFormat::Rgb8 => Cow::Owned(
                pixels
                    .chunks_exact(3)
                    .flat_map(|p| [p[0], p[1], p[2], u8::MAX])
                    .collect(),
            ),
            PixelFormat::LumaAlpha8 => Cow::Owned(
                pixels
                    .chunks_exact(2)
                    .flat_map(|p| [p[0], p[0], p[0], p[1]])
                    .collect(),
            ),
            PixelFormat::Luma8 => Cow::Owned(
                pixels
                    .iter()
                    .flat_map(|&l| [l, l, l, u8::MAX])
                    .collect(),
            ),
            // Missing channels read as 0, alpha as 1, like the GPU samples them.
            PixelFormat::Rg8 => Cow::Owned(
                pixels
                    .chunks_exact(2)
                    .flat_map(|p| [p[0], p[1], 0, u8::MAX])
                    .collect(),
            ),
            PixelFormat::R8 => Cow::Owned(
                pixels
                    .iter()
                    .flat_map(|&r| [r, 0, 0, u8::MAX])
                    .collect(),
            ),
        }
    }
}
