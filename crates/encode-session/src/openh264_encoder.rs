//! OpenH264 software backend
//!
//! Stands in for a hardware encoder: surfaces are resolved through a
//! [`SurfaceStore`] instead of a GPU device, but the session sees the same
//! native contract.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use openh264::Error as OpenH264Error;
use openh264::encoder::{Encoder, EncoderConfig as OpenH264Config};
use surface::{CpuSurface, PixelFormat, SurfaceRef, SurfaceStore};
use tracing::{debug, info};

use crate::{EncoderConfig, EncoderError, EncoderResult, NativeBackend, NativeEncoder};

/// Creates [`SoftwareEncoder`]s reading from a shared surface store
pub struct SoftwareBackend {
    surfaces: Arc<SurfaceStore>,
}

impl SoftwareBackend {
    pub fn new(surfaces: Arc<SurfaceStore>) -> Self {
        Self { surfaces }
    }
}

impl NativeBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "openh264"
    }

    fn create_encoder(&self, config: &EncoderConfig) -> EncoderResult<Box<dyn NativeEncoder>> {
        Ok(Box::new(SoftwareEncoder::new(self.surfaces.clone(), config)?))
    }
}

/// OpenH264-based software encoder
pub struct SoftwareEncoder {
    encoder: Encoder,
    config: EncoderConfig,
    surfaces: Arc<SurfaceStore>,
    pending: Vec<Bytes>,
    frame_counter: u64,
}

impl SoftwareEncoder {
    pub fn new(surfaces: Arc<SurfaceStore>, config: &EncoderConfig) -> EncoderResult<Self> {
        if config.pixel_format.bytes_per_pixel().is_none() {
            return Err(EncoderError::ResourceExhausted(format!(
                "OpenH264 cannot read {:?} surfaces",
                config.pixel_format
            )));
        }
        // I420 chroma planes are subsampled 2x2
        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(EncoderError::InvalidConfig(format!(
                "OpenH264 needs even dimensions, got {}x{}",
                config.width, config.height
            )));
        }

        info!(
            "Initializing OpenH264 encoder: {}x{} @ {} fps, {:?} bps",
            config.width, config.height, config.frame_rate, config.bit_rate
        );

        let mut openh264_config = OpenH264Config::new()
            .max_frame_rate(config.frame_rate as f32)
            .usage_type(openh264::encoder::UsageType::ScreenContentRealTime)
            .enable_skip_frame(false);

        if let Some(bit_rate) = config.bit_rate {
            openh264_config = openh264_config.set_bitrate_bps(bit_rate);
        }

        let encoder =
            Encoder::with_api_config(openh264::OpenH264API::from_source(), openh264_config)
                .map_err(|e: OpenH264Error| EncoderError::ResourceExhausted(e.to_string()))?;

        Ok(Self {
            encoder,
            config: config.clone(),
            surfaces,
            pending: Vec::new(),
            frame_counter: 0,
        })
    }

    /// Convert BGRA/RGBA to I420 (YUV planar)
    fn rgb_to_yuv(surface: &CpuSurface) -> Vec<u8> {
        let width = surface.width as usize;
        let height = surface.height as usize;

        // I420 size: Y plane + U plane (1/4) + V plane (1/4) = 1.5 * width * height
        let y_size = width * height;
        let uv_size = (width / 2) * (height / 2);
        let mut yuv = vec![0u8; y_size + 2 * uv_size];

        let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
        let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

        let is_bgra = surface.format == PixelFormat::Bgra8Unorm;
        let uv_width = width / 2;

        for y in 0..height {
            let row = surface.row(y as u32);
            for x in 0..width {
                let pixel = &row[x * 4..x * 4 + 4];

                let (r, g, b) = if is_bgra {
                    (pixel[2] as i32, pixel[1] as i32, pixel[0] as i32)
                } else {
                    (pixel[0] as i32, pixel[1] as i32, pixel[2] as i32)
                };

                // BT.601 conversion
                let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
                y_plane[y * width + x] = y_val.clamp(0, 255) as u8;

                // Subsample for U and V (every 2x2 block)
                if (x % 2 == 0) && (y % 2 == 0) {
                    let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                    let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;

                    let uv_idx = (y / 2) * uv_width + (x / 2);
                    u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                    v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
                }
            }
        }

        yuv
    }
}

impl NativeEncoder for SoftwareEncoder {
    fn encode(&mut self, surface: SurfaceRef, force_idr_frame: bool) -> EncoderResult<()> {
        let pixels = self
            .surfaces
            .get(surface)
            .map_err(|e| EncoderError::native("SurfaceStore::get", e.to_string()))?;

        if pixels.width != self.config.width || pixels.height != self.config.height {
            return Err(EncoderError::native(
                "SoftwareEncoder::encode",
                format!(
                    "surface is {}x{}, encoder expects {}x{}",
                    pixels.width, pixels.height, self.config.width, self.config.height
                ),
            ));
        }
        if pixels.format.bytes_per_pixel() != Some(4) {
            return Err(EncoderError::native(
                "SoftwareEncoder::encode",
                format!("unsupported pixel format {:?}", pixels.format),
            ));
        }

        let start = Instant::now();
        let yuv_data = Self::rgb_to_yuv(&pixels);

        let yuv_source = openh264::formats::YUVBuffer::from_vec(
            yuv_data,
            self.config.width as usize,
            self.config.height as usize,
        );

        if force_idr_frame {
            self.encoder.force_intra_frame();
            debug!("Forcing IDR frame");
        }

        let bitstream = self
            .encoder
            .encode(&yuv_source)
            .map_err(|e| EncoderError::native("Encoder::encode", e.to_string()))?;

        // One packet per NAL unit, each with an Annex-B start code
        let mut produced = 0;
        for l in 0..bitstream.num_layers() {
            if let Some(layer) = bitstream.layer(l) {
                for n in 0..layer.nal_count() {
                    if let Some(nal) = layer.nal_unit(n) {
                        let has_start_code =
                            nal.starts_with(&[0, 0, 0, 1]) || nal.starts_with(&[0, 0, 1]);

                        let mut unit = Vec::with_capacity(nal.len() + 4);
                        if !has_start_code {
                            unit.extend_from_slice(&[0, 0, 0, 1]);
                        }
                        unit.extend_from_slice(nal);

                        self.pending.push(Bytes::from(unit));
                        produced += 1;
                    }
                }
            }
        }

        self.frame_counter += 1;
        debug!(
            frame = self.frame_counter,
            nal_units = produced,
            encode_us = start.elapsed().as_micros() as u64,
            "Encoded frame"
        );

        Ok(())
    }

    fn copy_encoded_data(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.pending)
    }

    fn finish(&mut self) -> EncoderResult<()> {
        // OpenH264 doesn't buffer frames in low-latency mode
        debug!("OpenH264 encoder finished after {} frames", self.frame_counter);
        Ok(())
    }
}
