//! Native encoder boundary
//!
//! Everything below these traits (rate control, motion estimation, the
//! bitstream itself) belongs to the backend.

use bytes::Bytes;
use surface::SurfaceRef;

use crate::{EncoderConfig, EncoderResult};

/// Allocates native encoder resources
pub trait NativeBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Reserve one native encoder configured with `config`.
    ///
    /// Dropping the returned encoder releases the resource.
    fn create_encoder(&self, config: &EncoderConfig) -> EncoderResult<Box<dyn NativeEncoder>>;
}

/// One live native encoder resource
pub trait NativeEncoder: Send {
    /// Submit the surface behind `surface` for encoding
    fn encode(&mut self, surface: SurfaceRef, force_idr_frame: bool) -> EncoderResult<()>;

    /// Move every packet produced since the last call out of the native
    /// output queue, in encode order
    fn copy_encoded_data(&mut self) -> Vec<Bytes>;

    /// Signal end of stream. Called once, right before release.
    fn finish(&mut self) -> EncoderResult<()> {
        Ok(())
    }
}
