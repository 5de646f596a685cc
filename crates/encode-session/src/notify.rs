//! Packet-produced notifications

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::EncodedPacket;

/// Callback fired once per harvested packet
pub type PacketListener = Arc<dyn Fn(&EncodedPacket) + Send + Sync>;

/// Token returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct Notifier {
    listeners: RwLock<Vec<(SubscriptionId, PacketListener)>>,
    next_id: AtomicU64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: PacketListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `packets` in order to every listener.
    ///
    /// Listeners run without the registry lock held, so they may subscribe,
    /// unsubscribe or call back into the encoder.
    pub fn emit(&self, packets: &[EncodedPacket]) {
        if packets.is_empty() {
            return;
        }

        let listeners: Vec<PacketListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for packet in packets {
            for listener in &listeners {
                listener(packet);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;

    fn packet(index: usize, data: &'static [u8]) -> EncodedPacket {
        EncodedPacket {
            data: Bytes::from_static(data),
            cycle: 1,
            index,
        }
    }

    #[test]
    fn test_emit_in_order() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        notifier.subscribe(Arc::new(move |p: &EncodedPacket| sink.lock().push(p.index)));

        notifier.emit(&[packet(0, b"a"), packet(1, b"bb"), packet(2, b"c")]);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = Notifier::new();
        let hits = Arc::new(AtomicU64::new(0));

        let counter = hits.clone();
        let id = notifier.subscribe(Arc::new(move |_: &EncodedPacket| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        notifier.emit(&[packet(0, b"a")]);
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.emit(&[packet(0, b"a")]);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.listener_count(), 0);
    }
}
