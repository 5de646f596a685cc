//! Per-session counters

use std::time::Duration;

/// Encoder session statistics
#[derive(Debug, Clone, Default)]
pub struct EncoderStats {
    /// Encode calls handed to the native encoder
    pub frames_submitted: u64,
    /// Native encode calls that succeeded
    pub frames_encoded: u64,
    /// Requests dropped because an encode was still in flight
    pub frames_dropped: u64,
    /// Native encode calls that failed or timed out
    pub encode_failures: u64,
    /// Submissions that forced a key frame
    pub keyframes_requested: u64,
    /// Packets harvested across all cycles
    pub packets_harvested: u64,
    /// Total bytes harvested
    pub bytes_output: u64,
    /// Average native encode time in microseconds
    pub avg_encode_time_us: u64,
    /// Average packet size in bytes
    pub avg_packet_size: u64,
}

const ENCODE_TIME_WINDOW: usize = 100;

/// Accumulates [`EncoderStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    stats: EncoderStats,
    encode_times: Vec<u64>,
}

impl StatsRecorder {
    pub fn submitted(&mut self, force_key_frame: bool) {
        self.stats.frames_submitted += 1;
        if force_key_frame {
            self.stats.keyframes_requested += 1;
        }
    }

    pub fn dropped(&mut self) {
        self.stats.frames_dropped += 1;
    }

    pub fn failed(&mut self) {
        self.stats.encode_failures += 1;
    }

    pub fn encoded(&mut self, elapsed: Duration) {
        self.stats.frames_encoded += 1;

        self.encode_times.push(elapsed.as_micros() as u64);
        if self.encode_times.len() > ENCODE_TIME_WINDOW {
            self.encode_times.remove(0);
        }

        self.stats.avg_encode_time_us =
            self.encode_times.iter().sum::<u64>() / self.encode_times.len() as u64;
    }

    pub fn harvested(&mut self, packets: usize, bytes: usize) {
        self.stats.packets_harvested += packets as u64;
        self.stats.bytes_output += bytes as u64;

        if self.stats.packets_harvested > 0 {
            self.stats.avg_packet_size = self.stats.bytes_output / self.stats.packets_harvested;
        }
    }

    pub fn snapshot(&self) -> EncoderStats {
        self.stats.clone()
    }
}
