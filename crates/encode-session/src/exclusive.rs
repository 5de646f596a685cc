//! Process-wide single-session encoder
//!
//! Only one [`ExclusiveEncoder`] per registry may hold a live session. The
//! right to do so is an [`ExclusiveToken`]: whoever owns the token owns the
//! session, and dropping it lets the next encoder start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use surface::{PixelFormat, SurfaceRef};
use tracing::{info, warn};

use crate::session::Session;
use crate::{
    DispatchConfig, DispatchState, EncoderConfig, EncoderError, EncoderStats, ErrorLatch,
    NativeBackend, Notifier, PacketListener, SessionHandle, SubscriptionId,
};

/// Hands out at most one [`ExclusiveToken`] at a time
#[derive(Debug, Default)]
pub struct ExclusiveRegistry {
    active: AtomicBool,
}

impl ExclusiveRegistry {
    /// A registry of its own, independent of [`ExclusiveRegistry::global`]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide registry
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ExclusiveRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(ExclusiveRegistry::new).clone()
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<ExclusiveToken> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExclusiveToken {
                registry: self.clone(),
            })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof of exclusivity; released on drop
#[derive(Debug)]
pub struct ExclusiveToken {
    registry: Arc<ExclusiveRegistry>,
}

impl Drop for ExclusiveToken {
    fn drop(&mut self) {
        self.registry.active.store(false, Ordering::Release);
    }
}

// Field order matters: the session is released before the token.
struct ActiveSession {
    session: Session,
    _token: ExclusiveToken,
}

/// Singleton encoder component.
///
/// Holds a declared configuration the host may change at any time. Encodes
/// are refused while the declared configuration differs from the one the
/// running session was started with; [`ExclusiveEncoder::reinitialize`]
/// restarts the session with the declared values.
///
/// Start/stop failures and session failures share one error latch.
pub struct ExclusiveEncoder {
    registry: Arc<ExclusiveRegistry>,
    backend: Arc<dyn NativeBackend>,
    dispatch: DispatchConfig,
    declared: EncoderConfig,
    notifier: Arc<Notifier>,
    latch: Arc<ErrorLatch>,
    active: Option<ActiveSession>,
}

impl ExclusiveEncoder {
    /// Encoder bound to the process-wide registry
    pub fn new(backend: Arc<dyn NativeBackend>, dispatch: DispatchConfig, config: EncoderConfig) -> Self {
        Self::with_registry(ExclusiveRegistry::global(), backend, dispatch, config)
    }

    pub fn with_registry(
        registry: Arc<ExclusiveRegistry>,
        backend: Arc<dyn NativeBackend>,
        dispatch: DispatchConfig,
        config: EncoderConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            dispatch,
            declared: config,
            notifier: Arc::new(Notifier::new()),
            latch: Arc::new(ErrorLatch::new()),
            active: None,
        }
    }

    /// Start a session with the declared configuration.
    ///
    /// Rejected (and logged) while this or any other encoder on the same
    /// registry is running; the running session is left alone.
    pub fn start_encode(&mut self) -> bool {
        if self.active.is_some() {
            warn!("Exclusive encoder is already running; start ignored");
            self.latch.set(EncoderError::AlreadyActive);
            return false;
        }

        let Some(token) = self.registry.try_acquire() else {
            warn!("Another exclusive encoder is running; start rejected");
            self.latch.set(EncoderError::AlreadyActive);
            return false;
        };

        match Session::open(
            SessionHandle::from_raw(0),
            self.declared.clone(),
            self.backend.as_ref(),
            &self.dispatch,
            self.latch.clone(),
            self.notifier.clone(),
        ) {
            Ok(session) => {
                self.active = Some(ActiveSession {
                    session,
                    _token: token,
                });
                true
            }
            Err(e) => {
                warn!("Failed to start exclusive encoder: {}", e);
                self.latch.set(e);
                false
            }
        }
    }

    /// Release the running session. `false` if nothing was running.
    pub fn stop_encode(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                drop(active);
                info!("Exclusive encoder stopped");
                true
            }
            None => {
                warn!("Exclusive encoder is not running; stop ignored");
                false
            }
        }
    }

    /// Stop, then start again with the declared configuration
    pub fn reinitialize(&mut self) -> bool {
        self.stop_encode();
        self.start_encode()
    }

    pub fn is_valid(&self) -> bool {
        self.active.is_some()
    }

    /// Whether an encode has been submitted and not yet harvested
    pub fn is_encoding(&self) -> bool {
        self.state()
            .is_some_and(|state| state != DispatchState::Idle)
    }

    pub fn state(&self) -> Option<DispatchState> {
        self.session().map(Session::state)
    }

    pub fn stats(&self) -> Option<EncoderStats> {
        self.session().map(Session::stats)
    }

    /// Configuration of the running session
    pub fn width(&self) -> Option<u32> {
        self.session().map(|s| s.config().width)
    }

    pub fn height(&self) -> Option<u32> {
        self.session().map(|s| s.config().height)
    }

    pub fn frame_rate(&self) -> Option<u32> {
        self.session().map(|s| s.config().frame_rate)
    }

    /// Configuration the next start will use
    pub fn declared(&self) -> &EncoderConfig {
        &self.declared
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.declared.width = width;
        self.declared.height = height;
    }

    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.declared.frame_rate = frame_rate;
    }

    pub fn set_pixel_format(&mut self, pixel_format: PixelFormat) {
        self.declared.pixel_format = pixel_format;
    }

    pub fn set_bit_rate(&mut self, bit_rate: Option<u32>) {
        self.declared.bit_rate = bit_rate;
    }

    pub fn encode(&self, surface: SurfaceRef, force_key_frame: bool) -> bool {
        let Some(session) = self.session() else {
            let error = if surface.is_null() {
                EncoderError::NullSurface
            } else {
                EncoderError::NotInitialized
            };
            warn!("Encode failed: {}", error);
            self.latch.set(error);
            return false;
        };

        session.encode(surface, force_key_frame, &self.declared)
    }

    /// Per-frame step; no-op while stopped
    pub fn tick(&self) -> usize {
        self.session().map_or(0, Session::tick)
    }

    /// Listeners survive restarts
    pub fn subscribe(&self, listener: PacketListener) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn has_error(&self) -> bool {
        self.latch.has_error()
    }

    /// Read and clear
    pub fn take_error(&self) -> Option<EncoderError> {
        self.latch.take()
    }

    pub fn last_error(&self) -> String {
        self.latch.take_message()
    }

    /// Size of the newest packet in the current cycle (0 if none)
    pub fn encoded_size(&self) -> usize {
        self.session()
            .and_then(Session::last_packet)
            .map_or(0, |p| p.size())
    }

    /// Bytes of the newest packet in the current cycle
    pub fn encoded_data(&self) -> Option<Bytes> {
        self.session()
            .and_then(Session::last_packet)
            .map(|p| p.data)
    }

    fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|a| &a.session)
    }
}
