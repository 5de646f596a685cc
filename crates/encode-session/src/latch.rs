//! Sticky per-session error state

use parking_lot::Mutex;

use crate::EncoderError;

/// Holds the most recent unread error.
///
/// Setting overwrites any unread error; taking reads and clears under one
/// lock, so a concurrent `set` lands either before (and is returned) or
/// after (and stays latched).
#[derive(Debug, Default)]
pub struct ErrorLatch {
    slot: Mutex<Option<EncoderError>>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, error: EncoderError) {
        *self.slot.lock() = Some(error);
    }

    pub fn has_error(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Read and clear
    pub fn take(&self) -> Option<EncoderError> {
        self.slot.lock().take()
    }

    /// Read and clear as a message; empty when nothing is latched
    pub fn take_message(&self) -> String {
        self.take().map(|e| e.to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_take_clears() {
        let latch = ErrorLatch::new();
        assert!(!latch.has_error());

        latch.set(EncoderError::NullSurface);
        assert!(latch.has_error());
        assert_eq!(latch.take_message(), "The given surface reference is null");
        assert!(!latch.has_error());
        assert_eq!(latch.take_message(), "");
    }

    #[test]
    fn test_last_write_wins() {
        let latch = ErrorLatch::new();
        latch.set(EncoderError::NullSurface);
        latch.set(EncoderError::EncodeInProgress);
        assert!(matches!(latch.take(), Some(EncoderError::EncodeInProgress)));
        assert!(latch.take().is_none());
    }

    #[test]
    fn test_concurrent_take_delivers_once() {
        let latch = Arc::new(ErrorLatch::new());
        latch.set(EncoderError::EncodeInProgress);

        let takers: Vec<_> = (0..8)
            .map(|_| {
                let latch = latch.clone();
                std::thread::spawn(move || latch.take().is_some())
            })
            .collect();

        let delivered = takers
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|taken| *taken)
            .count();
        assert_eq!(delivered, 1);
    }
}
