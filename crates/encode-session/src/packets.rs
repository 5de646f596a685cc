//! Harvested packet storage

use bytes::Bytes;

/// One encoded unit produced by the native encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Bitstream bytes
    pub data: Bytes,
    /// Harvest cycle this packet belongs to
    pub cycle: u64,
    /// Position within the cycle (encode order)
    pub index: usize,
}

impl EncodedPacket {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Packets of the current harvest cycle.
///
/// Each harvest replaces the previous cycle wholesale. Packet data is
/// reference counted, so a caller that keeps an [`EncodedPacket`] keeps its
/// bytes, but the buffer itself only ever exposes the latest cycle.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    packets: Vec<EncodedPacket>,
    cycle: u64,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new cycle holding `chunks`, dropping empty ones
    pub fn replace(&mut self, chunks: Vec<Bytes>) -> usize {
        self.cycle += 1;
        let cycle = self.cycle;

        self.packets = chunks
            .into_iter()
            .filter(|data| !data.is_empty())
            .enumerate()
            .map(|(index, data)| EncodedPacket { data, cycle, index })
            .collect();

        self.packets.len()
    }

    /// Start a new, empty cycle
    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    pub fn count(&self) -> usize {
        self.packets.len()
    }

    /// Packet `index` of the current cycle.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.count()`.
    pub fn packet_at(&self, index: usize) -> &EncodedPacket {
        assert!(
            index < self.packets.len(),
            "packet index {index} out of range (cycle {} has {} packets)",
            self.cycle,
            self.packets.len()
        );
        &self.packets[index]
    }

    pub fn get(&self, index: usize) -> Option<&EncodedPacket> {
        self.packets.get(index)
    }

    pub fn packets(&self) -> &[EncodedPacket] {
        &self.packets
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn last(&self) -> Option<&EncodedPacket> {
        self.packets.last()
    }

    /// Total bytes in the current cycle
    pub fn total_bytes(&self) -> usize {
        self.packets.iter().map(EncodedPacket::size).sum()
    }
}
