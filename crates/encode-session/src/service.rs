//! Multi-instance encoder facade

use std::sync::Arc;

use surface::{PixelFormat, SurfaceRef};
use tracing::warn;

use crate::{
    DispatchConfig, DispatchState, EncodedPacket, EncoderConfig, EncoderError, EncoderStats,
    NativeBackend, PacketListener, SessionHandle, SessionTable, SubscriptionId,
};

/// Any number of encoder sessions, addressed by handle.
///
/// The host calls [`EncoderService::tick`] once per frame and
/// [`EncoderService::encode`] whenever it has a surface to submit. Every
/// failure is latched per handle and read back with
/// [`EncoderService::last_error`].
///
/// Queries on a dead handle return `None` (or `0`/`false` for counts and
/// flags); they never latch an error.
pub struct EncoderService {
    table: SessionTable,
}

impl EncoderService {
    pub fn new(backend: Arc<dyn NativeBackend>, dispatch: DispatchConfig) -> Self {
        Self {
            table: SessionTable::new(backend, dispatch),
        }
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    /// Create a session for surfaces of the given shape
    pub fn configure(
        &self,
        width: u32,
        height: u32,
        frame_rate: u32,
        pixel_format: Option<PixelFormat>,
    ) -> SessionHandle {
        let config = EncoderConfig::new(width, height, frame_rate)
            .with_pixel_format(pixel_format.unwrap_or_default());
        self.table.create(config)
    }

    pub fn create(&self, config: EncoderConfig) -> SessionHandle {
        self.table.create(config)
    }

    pub fn destroy(&self, handle: SessionHandle) -> bool {
        self.table.destroy(handle)
    }

    pub fn is_valid(&self, handle: SessionHandle) -> bool {
        self.table.is_valid(handle)
    }

    pub fn session_count(&self) -> usize {
        self.table.len()
    }

    pub fn config(&self, handle: SessionHandle) -> Option<EncoderConfig> {
        self.table.config(handle)
    }

    pub fn width(&self, handle: SessionHandle) -> Option<u32> {
        self.table.width(handle)
    }

    pub fn height(&self, handle: SessionHandle) -> Option<u32> {
        self.table.height(handle)
    }

    pub fn frame_rate(&self, handle: SessionHandle) -> Option<u32> {
        self.table.frame_rate(handle)
    }

    /// Submit `surface` to the session behind `handle`.
    ///
    /// Returns `false` with an error latched when the surface is null, the
    /// handle is dead, the surface no longer matches the session, the
    /// previous encode is still outstanding, or (synchronous dispatch) the
    /// native call fails.
    pub fn encode(&self, handle: SessionHandle, surface: SurfaceRef, force_key_frame: bool) -> bool {
        let Some(session) = self.table.get(handle) else {
            let error = if surface.is_null() {
                EncoderError::NullSurface
            } else {
                EncoderError::InvalidHandle(handle)
            };
            warn!("Encode on session {} failed: {}", handle, error);
            self.table.set_error(handle, error);
            return false;
        };

        session.encode(surface, force_key_frame, session.config())
    }

    /// Per-frame step for every live session
    pub fn tick(&self) -> usize {
        self.table
            .snapshot()
            .iter()
            .map(|session| session.tick())
            .sum()
    }

    /// Harvest without notifying. Dead handles harvest nothing.
    pub fn harvest(&self, handle: SessionHandle) -> usize {
        self.table.get(handle).map_or(0, |s| s.harvest())
    }

    pub fn packet_count(&self, handle: SessionHandle) -> usize {
        self.table.get(handle).map_or(0, |s| s.packet_count())
    }

    /// Packet `index` of the current cycle, `None` for a dead handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is live and `index` is out of range.
    pub fn packet_at(&self, handle: SessionHandle, index: usize) -> Option<EncodedPacket> {
        self.table.get(handle).map(|s| s.packet_at(index))
    }

    pub fn subscribe(&self, handle: SessionHandle, listener: PacketListener) -> Option<SubscriptionId> {
        self.table
            .get(handle)
            .map(|s| s.notifier().subscribe(listener))
    }

    pub fn unsubscribe(&self, handle: SessionHandle, id: SubscriptionId) -> bool {
        self.table
            .get(handle)
            .is_some_and(|s| s.notifier().unsubscribe(id))
    }

    pub fn has_error(&self, handle: SessionHandle) -> bool {
        self.table.has_error(handle)
    }

    pub fn take_error(&self, handle: SessionHandle) -> Option<EncoderError> {
        self.table.take_error(handle)
    }

    /// Read and clear the latched error message; empty when none
    pub fn last_error(&self, handle: SessionHandle) -> String {
        self.table.last_error(handle)
    }

    pub fn state(&self, handle: SessionHandle) -> Option<DispatchState> {
        self.table.get(handle).map(|s| s.state())
    }

    pub fn stats(&self, handle: SessionHandle) -> Option<EncoderStats> {
        self.table.get(handle).map(|s| s.stats())
    }
}
