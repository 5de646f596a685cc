//! Session handle table

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::session::Session;
use crate::{
    DispatchConfig, EncoderConfig, EncoderError, EncoderResult, ErrorLatch, NativeBackend,
    Notifier, SessionHandle,
};

/// Allocates sessions on a native backend and names them by handle.
///
/// Errors that cannot be attributed to a live session are kept per handle
/// as well: a failed create is read back through [`SessionHandle::INVALID`],
/// a call on a dead handle through that handle. An unread dead-handle
/// error stays until read or until the table is dropped.
pub struct SessionTable {
    backend: Arc<dyn NativeBackend>,
    dispatch: DispatchConfig,
    sessions: DashMap<SessionHandle, Arc<Session>>,
    next_id: AtomicI32,
    orphans: DashMap<SessionHandle, EncoderError>,
}

impl SessionTable {
    pub fn new(backend: Arc<dyn NativeBackend>, dispatch: DispatchConfig) -> Self {
        Self {
            backend,
            dispatch,
            sessions: DashMap::new(),
            next_id: AtomicI32::new(0),
            orphans: DashMap::new(),
        }
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.dispatch
    }

    /// Create a session, returning [`SessionHandle::INVALID`] on failure.
    ///
    /// A failed create reserves nothing; the reason is readable through
    /// the error accessors with the returned handle.
    pub fn create(&self, config: EncoderConfig) -> SessionHandle {
        match self.try_create(config) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to create encoder session: {}", e);
                self.orphans.insert(SessionHandle::INVALID, e);
                SessionHandle::INVALID
            }
        }
    }

    pub fn try_create(&self, config: EncoderConfig) -> EncoderResult<SessionHandle> {
        config.validate()?;

        let handle = self.allocate_handle()?;
        let session = Session::open(
            handle,
            config,
            self.backend.as_ref(),
            &self.dispatch,
            Arc::new(ErrorLatch::new()),
            Arc::new(Notifier::new()),
        )?;

        self.sessions.insert(handle, Arc::new(session));
        Ok(handle)
    }

    /// Release the session behind `handle`. No-op for a dead handle.
    ///
    /// Blocks until an outstanding encode on the session has returned,
    /// unless another caller still holds the session mid-tick, in which
    /// case the release happens when that caller lets go.
    pub fn destroy(&self, handle: SessionHandle) -> bool {
        match self.sessions.remove(&handle) {
            Some((_, session)) => {
                drop(session);
                info!("Destroyed encoder session {}", handle);
                true
            }
            None => false,
        }
    }

    pub fn is_valid(&self, handle: SessionHandle) -> bool {
        self.sessions.contains_key(&handle)
    }

    pub fn config(&self, handle: SessionHandle) -> Option<EncoderConfig> {
        self.get(handle).map(|s| s.config().clone())
    }

    pub fn width(&self, handle: SessionHandle) -> Option<u32> {
        self.get(handle).map(|s| s.config().width)
    }

    pub fn height(&self, handle: SessionHandle) -> Option<u32> {
        self.get(handle).map(|s| s.config().height)
    }

    pub fn frame_rate(&self, handle: SessionHandle) -> Option<u32> {
        self.get(handle).map(|s| s.config().frame_rate)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn has_error(&self, handle: SessionHandle) -> bool {
        match self.get(handle) {
            Some(session) => session.latch().has_error(),
            None => self.orphans.contains_key(&handle),
        }
    }

    /// Read and clear the latched error for `handle`
    pub fn take_error(&self, handle: SessionHandle) -> Option<EncoderError> {
        match self.get(handle) {
            Some(session) => session.latch().take(),
            None => self.orphans.remove(&handle).map(|(_, error)| error),
        }
    }

    /// Read and clear the latched error for `handle` as a message; empty
    /// when none
    pub fn last_error(&self, handle: SessionHandle) -> String {
        match self.get(handle) {
            Some(session) => session.latch().take_message(),
            None => self
                .orphans
                .remove(&handle)
                .map(|(_, error)| error.to_string())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn set_error(&self, handle: SessionHandle, error: EncoderError) {
        match self.get(handle) {
            Some(session) => session.latch().set(error),
            None => {
                self.orphans.insert(handle, error);
            }
        }
    }

    pub(crate) fn get(&self, handle: SessionHandle) -> Option<Arc<Session>> {
        self.sessions.get(&handle).map(|entry| entry.value().clone())
    }

    /// Snapshot of live sessions, in handle order
    pub(crate) fn snapshot(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<Arc<Session>> =
            self.sessions.iter().map(|entry| entry.value().clone()).collect();
        sessions.sort_by_key(|s| s.handle());
        sessions
    }

    fn allocate_handle(&self) -> EncoderResult<SessionHandle> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
            .map(SessionHandle::from_raw)
            .map_err(|_| EncoderError::ResourceExhausted("session handles exhausted".to_string()))
    }
}

impl Drop for SessionTable {
    fn drop(&mut self) {
        if !self.sessions.is_empty() {
            info!("Releasing {} encoder sessions", self.sessions.len());
            self.sessions.clear();
        }
    }
}
