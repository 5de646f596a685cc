//! One live encoder session

use std::sync::Arc;

use parking_lot::Mutex;
use surface::SurfaceRef;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::validator;
use crate::{
    DispatchConfig, DispatchState, DriftPolicy, EncodedPacket, EncoderConfig, EncoderError,
    EncoderResult, EncoderStats, ErrorLatch, NativeBackend, Notifier, PacketBuffer, SessionHandle,
};

/// Native encoder, recorded configuration, error latch, packet buffer and
/// dispatcher of one session.
///
/// The latch is shared with whoever owns the session, so the owner's own
/// errors and the session's land in one read-and-clear slot.
///
/// Dropping the session releases the native encoder after any outstanding
/// encode call has returned.
pub(crate) struct Session {
    handle: SessionHandle,
    config: EncoderConfig,
    drift_policy: DriftPolicy,
    latch: Arc<ErrorLatch>,
    packets: Mutex<PacketBuffer>,
    notifier: Arc<Notifier>,
    dispatcher: Dispatcher,
}

impl Session {
    pub fn open(
        handle: SessionHandle,
        config: EncoderConfig,
        backend: &dyn NativeBackend,
        dispatch: &DispatchConfig,
        latch: Arc<ErrorLatch>,
        notifier: Arc<Notifier>,
    ) -> EncoderResult<Self> {
        config.validate()?;

        let native = backend.create_encoder(&config)?;
        let dispatcher = Dispatcher::new(handle, native, dispatch)?;

        info!(
            "Opened encoder session {} on {}: {}x{} @ {} fps ({})",
            handle,
            backend.name(),
            config.width,
            config.height,
            config.frame_rate,
            if dispatcher.is_multithreaded() {
                "multithreaded"
            } else {
                "synchronous"
            }
        );

        Ok(Self {
            handle,
            config,
            drift_policy: dispatch.drift_policy,
            latch,
            packets: Mutex::new(PacketBuffer::new()),
            notifier,
            dispatcher,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn latch(&self) -> &ErrorLatch {
        &self.latch
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub fn stats(&self) -> EncoderStats {
        self.dispatcher.stats()
    }

    /// Submit `surface`, checking it and `declared` against the recorded
    /// configuration first. Failures are latched and reported as `false`.
    pub fn encode(&self, surface: SurfaceRef, force_key_frame: bool, declared: &EncoderConfig) -> bool {
        match self.try_encode(surface, force_key_frame, declared) {
            Ok(()) => true,
            Err(e) => {
                warn!("Encode on session {} failed: {}", self.handle, e);
                self.latch.set(e);
                false
            }
        }
    }

    fn try_encode(
        &self,
        surface: SurfaceRef,
        force_key_frame: bool,
        declared: &EncoderConfig,
    ) -> EncoderResult<()> {
        if surface.is_null() {
            return Err(EncoderError::NullSurface);
        }

        validator::check(declared, &self.config, self.drift_policy)?;
        validator::check(&self.config.for_surface(&surface), &self.config, self.drift_policy)?;

        self.dispatcher.submit(surface, force_key_frame)
    }

    /// Start a new packet cycle from the native output queue
    pub fn harvest(&self) -> usize {
        let mut packets = self.packets.lock();
        self.dispatcher.harvest(&mut packets)
    }

    /// Per-frame step: settle finished encodes, harvest, then notify
    /// listeners once per packet in encode order
    pub fn tick(&self) -> usize {
        for error in self.dispatcher.poll() {
            warn!("Encode on session {} failed: {}", self.handle, error);
            self.latch.set(error);
        }

        let cycle: Vec<EncodedPacket> = {
            let mut packets = self.packets.lock();
            self.dispatcher.harvest(&mut packets);
            packets.packets().to_vec()
        };

        if !cycle.is_empty() {
            debug!(
                session = %self.handle,
                packets = cycle.len(),
                bytes = cycle.iter().map(EncodedPacket::size).sum::<usize>(),
                "Harvested encoded packets"
            );
        }

        self.notifier.emit(&cycle);
        cycle.len()
    }

    pub fn packet_count(&self) -> usize {
        self.packets.lock().count()
    }

    /// # Panics
    ///
    /// Panics if `index` is not below [`Session::packet_count`].
    pub fn packet_at(&self, index: usize) -> EncodedPacket {
        self.packets.lock().packet_at(index).clone()
    }

    pub fn last_packet(&self) -> Option<EncodedPacket> {
        self.packets.lock().last().cloned()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!("Closing encoder session {}", self.handle);
    }
}
