//! Session and dispatch configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use surface::{PixelFormat, SurfaceRef};

use crate::{EncoderError, EncoderResult};

/// Encoder session configuration.
///
/// Recorded when a session is created and never changed afterwards; a
/// different configuration needs a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Target FPS
    pub frame_rate: u32,
    /// Input surface format
    pub pixel_format: PixelFormat,
    /// Target bitrate in bits per second (encoder default if unset)
    pub bit_rate: Option<u32>,
    /// Upper bound for a single encoded frame in bytes
    pub max_frame_size: Option<u32>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 60,
            pixel_format: PixelFormat::Rgba8Unorm,
            bit_rate: None,
            max_frame_size: None,
        }
    }
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
            ..Default::default()
        }
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.max_frame_size = Some(max_frame_size);
        self
    }

    /// The configuration a surface implies, keeping everything a surface
    /// cannot express from `self`
    pub fn for_surface(&self, surface: &SurfaceRef) -> Self {
        Self {
            width: surface.width(),
            height: surface.height(),
            pixel_format: surface.format(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> EncoderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EncoderError::InvalidConfig(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 {
            return Err(EncoderError::InvalidConfig(
                "frame rate must be non-zero".to_string(),
            ));
        }
        if self.bit_rate == Some(0) {
            return Err(EncoderError::InvalidConfig(
                "bit rate must be non-zero when set".to_string(),
            ));
        }
        if self.max_frame_size == Some(0) {
            return Err(EncoderError::InvalidConfig(
                "max frame size must be non-zero when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which fields count as configuration drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DriftPolicy {
    /// Width, height and frame rate only
    Dimensions,
    /// Every recorded field
    #[default]
    Strict,
}

/// How encode requests are dispatched to the native encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Run native encode calls on a per-session worker thread
    pub multithreaded: bool,
    /// Give up on an in-flight encode after this long
    pub submit_timeout_ms: Option<u64>,
    /// Fields checked before every encode
    pub drift_policy: DriftPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            multithreaded: false,
            submit_timeout_ms: None,
            drift_policy: DriftPolicy::Strict,
        }
    }
}

impl DispatchConfig {
    pub fn multithreaded() -> Self {
        Self {
            multithreaded: true,
            ..Default::default()
        }
    }

    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }
}
