//! Surface references and CPU-side pixel data

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{SurfaceError, SurfaceResult};

/// Pixel format of a render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// RGBA 8-bit per channel, unsigned normalized
    Rgba8Unorm,
    /// BGRA 8-bit per channel, unsigned normalized
    Bgra8Unorm,
    /// NV12 (YUV 4:2:0, used by hardware encoders)
    Nv12,
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::Rgba8Unorm
    }
}

impl PixelFormat {
    /// Bytes per pixel for packed RGB formats
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgba8Unorm | PixelFormat::Bgra8Unorm => Some(4),
            PixelFormat::Nv12 => None, // Planar
        }
    }

    /// DXGI format code the native plugin expects
    pub fn native_code(&self) -> u32 {
        match self {
            PixelFormat::Rgba8Unorm => 28,
            PixelFormat::Bgra8Unorm => 87,
            PixelFormat::Nv12 => 103,
        }
    }

    /// Inverse of [`PixelFormat::native_code`]
    pub fn from_native_code(code: u32) -> Option<Self> {
        match code {
            28 => Some(PixelFormat::Rgba8Unorm),
            87 => Some(PixelFormat::Bgra8Unorm),
            103 => Some(PixelFormat::Nv12),
            _ => None,
        }
    }
}

/// Opaque reference to a renderable surface.
///
/// Handle `0` is the null reference. The encoder never dereferences the
/// handle itself; it passes it through to the native encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceRef {
    handle: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl SurfaceRef {
    /// The null surface reference
    pub const NULL: SurfaceRef = SurfaceRef {
        handle: 0,
        width: 0,
        height: 0,
        format: PixelFormat::Rgba8Unorm,
    };

    pub fn new(handle: u64, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            handle,
            width,
            height,
            format,
        }
    }

    pub fn is_null(&self) -> bool {
        self.handle == 0
    }

    /// Native handle value
    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

impl Default for SurfaceRef {
    fn default() -> Self {
        Self::NULL
    }
}

/// CPU-resident surface contents
#[derive(Debug, Clone)]
pub struct CpuSurface {
    /// Raw pixel data
    pub data: Bytes,
    /// Surface width
    pub width: u32,
    /// Surface height
    pub height: u32,
    /// Stride (bytes per row, may include padding)
    pub stride: u32,
    /// Pixel format
    pub format: PixelFormat,
}

impl CpuSurface {
    /// Wrap packed pixel data, checking that it covers `stride * height`
    pub fn new(
        data: Bytes,
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> SurfaceResult<Self> {
        let bpp = format
            .bytes_per_pixel()
            .ok_or(SurfaceError::UnsupportedFormat(format))?;

        let row = width as usize * bpp;
        let required = (stride as usize).max(row) * height as usize;
        if data.len() < required {
            return Err(SurfaceError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            stride: stride.max(row as u32),
            format,
        })
    }

    /// A surface filled with one color (channels in `format` order)
    pub fn solid(width: u32, height: u32, format: PixelFormat, pixel: [u8; 4]) -> SurfaceResult<Self> {
        let bpp = format
            .bytes_per_pixel()
            .ok_or(SurfaceError::UnsupportedFormat(format))?;
        let count = width as usize * height as usize;
        let data: Vec<u8> = pixel.iter().copied().cycle().take(count * bpp).collect();
        Self::new(Bytes::from(data), width, height, width * bpp as u32, format)
    }

    /// Pixel bytes of row `y`, without padding
    pub fn row(&self, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel().unwrap_or(1);
        let start = y as usize * self.stride as usize;
        &self.data[start..start + self.width as usize * bpp]
    }

    /// Convert BGRA to RGBA (no-op for other formats)
    pub fn bgra_to_rgba(&mut self) {
        if self.format != PixelFormat::Bgra8Unorm {
            return;
        }

        let data = Bytes::from(
            self.data
                .chunks_exact(4)
                .flat_map(|chunk| [chunk[2], chunk[1], chunk[0], chunk[3]])
                .collect::<Vec<u8>>(),
        );

        self.data = data;
        self.format = PixelFormat::Rgba8Unorm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_reference() {
        assert!(SurfaceRef::NULL.is_null());
        assert!(SurfaceRef::default().is_null());
        assert!(!SurfaceRef::new(7, 16, 16, PixelFormat::Rgba8Unorm).is_null());
    }

    #[test]
    fn test_native_codes() {
        assert_eq!(PixelFormat::default().native_code(), 28);
        assert_eq!(PixelFormat::from_native_code(87), Some(PixelFormat::Bgra8Unorm));
        assert_eq!(PixelFormat::from_native_code(1), None);
    }

    #[test]
    fn test_buffer_too_small() {
        let result = CpuSurface::new(Bytes::from(vec![0u8; 10]), 4, 4, 16, PixelFormat::Rgba8Unorm);
        assert!(matches!(
            result,
            Err(SurfaceError::BufferTooSmall { required: 64, actual: 10 })
        ));
    }

    #[test]
    fn test_solid_and_swizzle() {
        let mut surface = CpuSurface::solid(2, 2, PixelFormat::Bgra8Unorm, [1, 2, 3, 4]).unwrap();
        assert_eq!(surface.row(1), &[1, 2, 3, 4, 1, 2, 3, 4]);

        surface.bgra_to_rgba();
        assert_eq!(surface.format, PixelFormat::Rgba8Unorm);
        assert_eq!(&surface.data[..4], &[3, 2, 1, 4]);
    }

    #[test]
    fn test_planar_rejected() {
        assert!(matches!(
            CpuSurface::solid(2, 2, PixelFormat::Nv12, [0; 4]),
            Err(SurfaceError::UnsupportedFormat(PixelFormat::Nv12))
        ));
    }
}
