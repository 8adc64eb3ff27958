use std::time::Duration;

/// Counters collected by one side of a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Application bytes sent or reassembled.
    pub bytes: u64,
    /// Data packets produced (sender) or received (receiver).
    pub packets: u64,
    /// Datagrams handed to the channel, retransmissions included.
    pub transmissions: u64,
    /// Ack waits that ended without an ack.
    pub timeouts: u64,
    /// Packets or acks withheld by a fault hook.
    pub skipped: u64,
    pub elapsed: Duration,
}

impl TransferStats {
    /// Megabits per second over `elapsed`; zero when nothing was timed.
    pub fn throughput_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.bytes as f64 * 8.0) / (secs * 1_000_000.0)
    }
}
