use log::trace;

use super::SlabError;
use crate::pixel_format::PixelFormat;

/// The layout `read_texture` would return, or why `texture` cannot be read.
///
/// Touches no GPU state.
pub(crate) fn readable_format(texture: &wgpu::Texture) -> Result<PixelFormat, SlabError> {
    let format = PixelFormat::from_texture_format(texture.format())
        .ok_or(SlabError::UnsupportedFormat(texture.format()))?;
    if !texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
        return Err(SlabError::NotCopySource);
    }
    Ok(format)
}

/// Copy mip 0, layer 0 of `texture` to the CPU.
///
/// Returns the tightly packed rows (top to bottom) and the layout they are in.
/// The bytes are copied unchanged, so a linear `Rgba8Unorm` source keeps its
/// byte values and is sampled as sRGB once it sits in a slab.
/// Blocks on `device.poll` until the copy has landed.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<(Vec<u8>, PixelFormat), SlabError> {
    let format = readable_format(texture)?;

    let width = texture.width();
    let height = texture.height();
    let unpadded_bytes_per_row = width * format.bytes_per_pixel();
    let padded_bytes_per_row = unpadded_bytes_per_row
        .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    trace!(
        "read_texture: {width}x{height} {format:?}, row pitch {padded_bytes_per_row} (tight {unpadded_bytes_per_row})"
    );

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("slab_readback_buffer"),
        size: padded_bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("slab_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        // The receiver only disappears if this function already returned.
        let _ = tx.send(result);
    });
    device.poll(wgpu::PollType::Wait)?;
    rx.recv().map_err(|_| SlabError::MapCallbackDropped)??;

    let mut pixels = Vec::with_capacity(unpadded_bytes_per_row as usize * height as usize);
    {
        let padded = buffer_slice.get_mapped_range();
        for row in padded.chunks(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
    }
    buffer.unmap();

    Ok((pixels, format))
}
