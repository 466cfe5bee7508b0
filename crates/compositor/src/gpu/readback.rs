use image::RgbaImage;

use super::targets::Texture2D;

#[derive(Debug, thiserror::Error)]
pub enum ReadbackError {
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("readback buffer was dropped before it was mapped")]
    Disconnected,
    #[error("readback produced {actual} bytes for a {width}x{height} image")]
    Size { width: u32, height: u32, actual: usize },
}

/// Row pitch of a readback buffer; wgpu requires 256-byte aligned rows.
fn padded_bytes_per_row(width: u32) -> u32 {
    (width * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

/// Copies `texture` into host memory, blocking until the GPU is done.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &Texture2D,
) -> Result<RgbaImage, ReadbackError> {
    let (width, height) = texture.size();
    let padded_row = padded_bytes_per_row(width);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("texture readback"),
        size: u64::from(padded_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("texture readback"),
    });
    encoder.copy_texture_to_buffer(
        texture.texture().as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        texture.extent(),
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::PollType::Wait)?;
    receiver.recv().map_err(|_| ReadbackError::Disconnected)??;

    let pixels = {
        let mapped = slice.get_mapped_range();
        unpad_rows(&mapped, width, height, padded_row)
    };
    buffer.unmap();

    let actual = pixels.len();
    RgbaImage::from_raw(width, height, pixels).ok_or(ReadbackError::Size {
        width,
        height,
        actual,
    })
}

fn unpad_rows(mapped: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let row = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for chunk in mapped.chunks(padded_row as usize).take(height as usize) {
        pixels.extend_from_slice(&chunk[..row]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn unpadding_keeps_only_pixel_bytes() {
        let padded_row = 256;
        let mut mapped = vec![0xAAu8; padded_row * 2];
        mapped[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        mapped[padded_row..padded_row + 8].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        let pixels = unpad_rows(&mapped, 2, 2, padded_row as u32);
        assert_eq!(pixels, (1..=16).collect::<Vec<u8>>());
    }
}
