//! Go-Back-N: cumulative acks, in-order-only receiver.
//!
//! The sender keeps up to `capacity` packets in flight, oldest first. An ack
//! for `N` retires every entry with seq <= N. On timeout the driver resends
//! the entire window. The receiver discards anything out of order without
//! acknowledging it, which is what forces the sender back to its window
//! start.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::arq::{AckOutcome, ReceiveWindow, SendWindow, Verdict};
use crate::packet::Header;

#[derive(Debug)]
pub struct GoBackNSender {
    capacity: usize,
    window: VecDeque<(u32, Vec<u8>)>,
}

impl GoBackNSender {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window size must be at least 1");
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity),
        }
    }

    /// Sequence numbers in flight, oldest first.
    pub fn in_flight(&self) -> Vec<u32> {
        self.window.iter().map(|(seq, _)| *seq).collect()
    }
}

impl SendWindow for GoBackNSender {
    fn has_room(&self) -> bool {
        self.window.len() < self.capacity
    }

    fn push(&mut self, seq: u32, packet: Vec<u8>) {
        debug_assert!(self.has_room(), "go-back-n window already full");
        self.window.push_back((seq, packet));
    }

    fn outstanding(&self) -> Vec<(u32, &[u8])> {
        self.window.iter().map(|(seq, p)| (*seq, p.as_slice())).collect()
    }

    fn on_ack(&mut self, ack: u32) -> AckOutcome {
        let mut retired = 0;
        while let Some((seq, _)) = self.window.front() {
            if *seq > ack {
                break;
            }
            trace!(seq = *seq, ack, "retired by cumulative ack");
            self.window.pop_front();
            retired += 1;
        }
        if retired == 0 {
            AckOutcome::Stale
        } else {
            AckOutcome::Advanced(retired)
        }
    }

    fn len(&self) -> usize {
        self.window.len()
    }
}

#[derive(Debug)]
pub struct GoBackNReceiver {
    last_valid_seq: u32,
}

impl GoBackNReceiver {
    pub fn new(last_valid_seq: u32) -> Self {
        Self { last_valid_seq }
    }
}

impl ReceiveWindow for GoBackNReceiver {
    fn on_packet(
        &mut self,
        header: &Header,
        payload: Option<&[u8]>,
        output: &mut Vec<u8>,
    ) -> Verdict {
        let seq = header.seq;
        if seq == self.last_valid_seq {
            debug!(seq, "duplicate, re-acking");
            return Verdict::ack(seq);
        }
        if seq != self.last_valid_seq.wrapping_add(1) {
            debug!(seq, last_valid = self.last_valid_seq, "out of order, discarded");
            return Verdict::ignore();
        }
        self.last_valid_seq = seq;
        if header.flags().fin {
            return Verdict::finish(seq);
        }
        if let Some(data) = payload {
            output.extend_from_slice(data);
        }
        Verdict::ack(seq)
    }

    fn last_valid_seq(&self) -> u32 {
        self.last_valid_seq
    }
}
