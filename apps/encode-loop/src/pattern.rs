//! Synthetic render output

use bytes::Bytes;
use surface::{CpuSurface, PixelFormat, SurfaceResult};

/// Scrolling gradient with a moving bar, so consecutive frames differ
pub fn render(width: u32, height: u32, format: PixelFormat, frame: u64) -> SurfaceResult<CpuSurface> {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    let shift = (frame * 4) as u32;
    let bar = (frame as u32 * 8) % width.max(1);

    for y in 0..height {
        for x in 0..width {
            let r = ((x + shift) * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = if x.abs_diff(bar) < 16 { 255 } else { 64 };

            match format {
                PixelFormat::Bgra8Unorm => data.extend_from_slice(&[b, g, r, 255]),
                _ => data.extend_from_slice(&[r, g, b, 255]),
            }
        }
    }

    CpuSurface::new(Bytes::from(data), width, height, width * 4, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_differ() {
        let a = render(64, 32, PixelFormat::Rgba8Unorm, 0).unwrap();
        let b = render(64, 32, PixelFormat::Rgba8Unorm, 1).unwrap();
        assert_eq!(a.data.len(), 64 * 32 * 4);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_bgra_channel_order() {
        let mut bgra = render(16, 16, PixelFormat::Bgra8Unorm, 3).unwrap();
        let rgba = render(16, 16, PixelFormat::Rgba8Unorm, 3).unwrap();
        bgra.bgra_to_rgba();
        assert_eq!(bgra.data, rgba.data);
    }
}
