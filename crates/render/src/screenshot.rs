use anyhow::{Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use std::path::Path;
use std::sync::mpsc;

/// Copy an offscreen target back to the CPU as tightly packed RGBA8.
///
/// Blocks on the device until the copy completes.
pub fn capture_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    format: wgpu::TextureFormat,
    size: (u32, u32),
) -> Result<Vec<u8>> {
    let swap_red_blue = match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
        other => anyhow::bail!("unsupported render target format for capture: {other:?}"),
    };

    let (width, height) = size;
    let row_bytes = width * 4;
    let padded_row_bytes = padded_bytes_per_row(width);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Particle Capture Buffer"),
        size: padded_row_bytes as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Particle Capture Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row_bytes),
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

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .context("capture readback channel closed")?
        .context("capture readback failed")?;

    let mapped = slice.get_mapped_range();
    let mut rgba = unpad_rows(&mapped, row_bytes, padded_row_bytes, height);
    drop(mapped);
    staging.unmap();

    if swap_red_blue {
        for pixel in rgba.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
    }
    Ok(rgba)
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

fn unpad_rows(padded: &[u8], row_bytes: u32, padded_row_bytes: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((row_bytes * height) as usize);
    for row in padded
        .chunks(padded_row_bytes as usize)
        .take(height as usize)
    {
        out.extend_from_slice(&row[..row_bytes as usize]);
    }
    out
}

/// Write an RGBA8 image to disk as a PNG, creating parent directories.
pub fn write_png(path: &Path, size: (u32, u32), rgba: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let encoder = PngEncoder::new_with_quality(file, CompressionType::Fast, FilterType::NoFilter);
    encoder
        .write_image(rgba, size.0, size.1, ExtendedColorType::Rgba8)
        .context("failed to encode particle capture png")?;
    Ok(())
}
