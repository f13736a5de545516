#![allow(clippy::unwrap_used)]

// These tests need a device that executes copies. They are skipped when the
// machine has no adapter at all.

use mega_texture::wgpu_utils::executing_wgpu;
use mega_texture::{AtlasConfig, PixelFormat, Slab, SlabManager, SubRect, dump_slab};

fn pattern(size: [u32; 2], seed: u8) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size[0] * size[1] * 4) as usize);
    for y in 0..size[1] {
        for x in 0..size[0] {
            pixels.extend_from_slice(&[
                (x as u8).wrapping_mul(7).wrapping_add(seed),
                (y as u8).wrapping_mul(13),
                seed,
                0xff,
            ]);
        }
    }
    pixels
}

/// Copy `rect` out of a tightly packed RGBA8 image `width` pixels wide.
fn crop(pixels: &[u8], width: u32, rect: SubRect) -> Vec<u8> {
    let mut out = Vec::new();
    for row in rect.y..rect.y + rect.height {
        let start = ((row * width + rect.x) * 4) as usize;
        out.extend_from_slice(&pixels[start..start + (rect.width * 4) as usize]);
    }
    out
}

macro_rules! device_or_skip {
    () => {
        match executing_wgpu().await {
            Some(device_queue) => device_queue,
            None => {
                eprintln!("No compatible GPU adapter found; skipping gpu test");
                return;
            }
        }
    };
}

fn manager(device: &wgpu::Device, queue: &wgpu::Queue) -> SlabManager {
    SlabManager::new(
        device,
        queue,
        AtlasConfig {
            // 100px rows are not a multiple of the copy alignment.
            slab_size: [100, 64],
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn stitched_pixels_read_back_unchanged() {
    let (device, queue) = device_or_skip!();
    let mut manager = manager(&device, &queue);

    let a_pixels = pattern([30, 10], 1);
    let b_pixels = pattern([25, 17], 2);
    let a = manager
        .stitch(&a_pixels, [30, 10], PixelFormat::Rgba8)
        .unwrap()
        .unwrap();
    let b = manager
        .stitch(&b_pixels, [25, 17], PixelFormat::Rgba8)
        .unwrap()
        .unwrap();
    assert_eq!(a, b);

    let slab = manager.slab(a.slab_id()).unwrap();
    let all = slab.read_all().unwrap();
    assert_eq!(all.len(), 100 * 64 * 4);

    // Row 0 of a block is its top row, at the block's y in the slab.
    assert_eq!(crop(&all, 100, a.area()), a_pixels);
    assert_eq!(crop(&all, 100, b.area()), b_pixels);
}

#[tokio::test]
async fn untouched_slab_area_is_transparent() {
    let (device, queue) = device_or_skip!();
    let mut manager = manager(&device, &queue);

    manager
        .stitch(&pattern([10, 10], 3), [10, 10], PixelFormat::Rgba8)
        .unwrap()
        .unwrap();
    let slab = manager.slabs().next().unwrap();
    let all = slab.read_all().unwrap();

    assert!(crop(&all, 100, SubRect::new(10, 0, 90, 64))
        .iter()
        .all(|&byte| byte == 0));
}

#[tokio::test]
async fn narrow_formats_are_expanded_on_upload() {
    let (device, queue) = device_or_skip!();
    let mut manager = manager(&device, &queue);

    let luma: Vec<u8> = (0..12).collect();
    let handle = manager
        .stitch(&luma, [4, 3], PixelFormat::Luma8)
        .unwrap()
        .unwrap();

    let all = manager.slab(handle.slab_id()).unwrap().read_all().unwrap();
    let expected: Vec<u8> = luma.iter().flat_map(|&l| [l, l, l, 0xff]).collect();
    assert_eq!(crop(&all, 100, handle.area()), expected);
}

#[tokio::test]
async fn existing_textures_are_stitched_by_content() {
    let (device, queue) = device_or_skip!();
    let mut manager = manager(&device, &queue);

    manager
        .stitch(&pattern([40, 8], 4), [40, 8], PixelFormat::Rgba8)
        .unwrap()
        .unwrap();

    let size = [13, 9];
    let source_pixels = pattern(size, 5);
    let source = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("stitch_source"),
        size: wgpu::Extent3d {
            width: size[0],
            height: size[1],
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        source.as_image_copy(),
        &source_pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size[0] * 4),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width: size[0],
            height: size[1],
            depth_or_array_layers: 1,
        },
    );

    let handle = manager.stitch_texture(&source).unwrap().unwrap();
    assert_eq!(handle.area(), SubRect::new(40, 0, 13, 9));

    let all = manager.slab(handle.slab_id()).unwrap().read_all().unwrap();
    assert_eq!(crop(&all, 100, handle.area()), source_pixels);
}

#[tokio::test]
async fn dump_writes_a_png_of_the_slab() {
    let (device, queue) = device_or_skip!();
    let layout = Slab::create_bind_group_layout(&device);
    let slab = Slab::new(&device, &queue, &layout, [20, 12]);
    let pixels = pattern([20, 12], 6);
    slab.upload_region(SubRect::from_size([20, 12]), &pixels, PixelFormat::Rgba8)
        .unwrap();

    let dir = std::env::temp_dir()
        .join(format!("mega-texture-dump-{}", std::process::id()))
        .join("nested");
    let path = dump_slab(&slab, &dir).unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        format!("slab_{}.png", slab.id())
    );
    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (20, 12));
    assert_eq!(decoded.into_raw(), pixels);

    std::fs::remove_dir_all(dir.parent().unwrap()).unwrap();
}
