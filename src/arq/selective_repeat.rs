//! Selective Repeat: per-packet acks and a reordering receiver.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::arq::{AckOutcome, ReceiveWindow, SendWindow, Verdict};
use crate::packet::Header;

/// In-flight packets keyed by seq; an ack retires exactly its own entry.
#[derive(Debug)]
pub struct SelectiveRepeatSender {
    capacity: usize,
    window: BTreeMap<u32, Vec<u8>>,
}

impl SelectiveRepeatSender {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window size must be at least 1");
        Self {
            capacity,
            window: BTreeMap::new(),
        }
    }

    pub fn in_flight(&self) -> Vec<u32> {
        self.window.keys().copied().collect()
    }
}

impl SendWindow for SelectiveRepeatSender {
    fn has_room(&self) -> bool {
        self.window.len() < self.capacity
    }

    fn push(&mut self, seq: u32, packet: Vec<u8>) {
        debug_assert!(self.has_room(), "selective-repeat window already full");
        self.window.insert(seq, packet);
    }

    fn outstanding(&self) -> Vec<(u32, &[u8])> {
        self.window
            .iter()
            .map(|(seq, p)| (*seq, p.as_slice()))
            .collect()
    }

    fn on_ack(&mut self, ack: u32) -> AckOutcome {
        match self.window.remove(&ack) {
            Some(_) => AckOutcome::Advanced(1),
            None => AckOutcome::Stale,
        }
    }

    fn len(&self) -> usize {
        self.window.len()
    }
}

/// Buffers packets that arrive ahead of a gap and releases them, in
/// ascending order, once every gap is filled.
///
/// Invariant: `missing` holds exactly the sequence numbers between the last
/// flush and `last_valid_seq` that have not arrived yet.
#[derive(Debug)]
pub struct SelectiveRepeatReceiver {
    last_valid_seq: u32,
    /// Everything up to here has been written to the output.
    delivered: u32,
    missing: BTreeSet<u32>,
    buffer: BTreeMap<u32, Vec<u8>>,
    fin_seen: bool,
}

impl SelectiveRepeatReceiver {
    pub fn new(last_valid_seq: u32) -> Self {
        Self {
            last_valid_seq,
            delivered: last_valid_seq,
            missing: BTreeSet::new(),
            buffer: BTreeMap::new(),
            fin_seen: false,
        }
    }

    pub fn missing(&self) -> Vec<u32> {
        self.missing.iter().copied().collect()
    }

    pub fn buffered(&self) -> Vec<u32> {
        self.buffer.keys().copied().collect()
    }

    fn flush(&mut self, output: &mut Vec<u8>) {
        let buffered = std::mem::take(&mut self.buffer);
        trace!(count = buffered.len(), "flushing reorder buffer");
        for (_, data) in buffered {
            output.extend_from_slice(&data);
        }
    }
}

impl ReceiveWindow for SelectiveRepeatReceiver {
    fn on_packet(
        &mut self,
        header: &Header,
        payload: Option<&[u8]>,
        output: &mut Vec<u8>,
    ) -> Verdict {
        let seq = header.seq;

        if self.missing.remove(&seq) {
            debug!(seq, "filled gap");
        }
        let expected = self.last_valid_seq.wrapping_add(1);
        if seq > expected {
            debug!(seq, expected, "out of order, recording gap");
            self.missing.extend(expected..seq);
        }
        if let Some(data) = payload {
            if seq > self.delivered {
                self.buffer.insert(seq, data.to_vec());
            } else {
                debug!(seq, "already delivered, not buffered again");
            }
        }
        if header.flags().fin {
            self.fin_seen = true;
        }
        self.last_valid_seq = self.last_valid_seq.max(seq);

        if self.missing.is_empty() {
            if !self.buffer.is_empty() {
                self.flush(output);
            }
            self.delivered = self.last_valid_seq;
        } else {
            trace!(missing = ?self.missing, "still waiting");
        }

        Verdict {
            ack: Some(seq),
            finished: self.fin_seen && self.missing.is_empty(),
        }
    }

    fn last_valid_seq(&self) -> u32 {
        self.last_valid_seq
    }
}
