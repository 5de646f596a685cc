//! Surface error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface reference is null")]
    NullSurface,

    #[error("Unknown surface handle: {0}")]
    UnknownSurface(u64),

    #[error("Surface size changed: expected {expected_width}x{expected_height}, got {width}x{height}")]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Pixel buffer too small: {actual} bytes (need {required})")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("Unsupported pixel format: {0:?}")]
    UnsupportedFormat(crate::PixelFormat),

    #[error("Surface handles exhausted")]
    HandlesExhausted,
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;
