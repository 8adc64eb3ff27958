//! Stop-and-Wait: one packet in flight, one ack per packet.

use tracing::debug;

use crate::arq::{AckOutcome, ReceiveWindow, SendWindow, Verdict};
use crate::packet::Header;

/// Holds at most one unacknowledged packet.
#[derive(Debug, Default)]
pub struct StopAndWaitSender {
    pending: Option<(u32, Vec<u8>)>,
}

impl StopAndWaitSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_seq(&self) -> Option<u32> {
        self.pending.as_ref().map(|(seq, _)| *seq)
    }
}

impl SendWindow for StopAndWaitSender {
    fn has_room(&self) -> bool {
        self.pending.is_none()
    }

    fn push(&mut self, seq: u32, packet: Vec<u8>) {
        debug_assert!(self.pending.is_none(), "stop-and-wait window already full");
        self.pending = Some((seq, packet));
    }

    fn outstanding(&self) -> Vec<(u32, &[u8])> {
        self.pending.iter().map(|(seq, p)| (*seq, p.as_slice())).collect()
    }

    fn on_ack(&mut self, ack: u32) -> AckOutcome {
        match self.pending {
            Some((seq, _)) if seq == ack => {
                self.pending = None;
                AckOutcome::Advanced(1)
            }
            _ => AckOutcome::Stale,
        }
    }

    fn len(&self) -> usize {
        usize::from(self.pending.is_some())
    }

    fn resend_on_stale_ack(&self) -> bool {
        true
    }
}

/// Accepts only `last_valid_seq + 1`; anything else is answered with a
/// duplicate ack for `last_valid_seq`.
#[derive(Debug)]
pub struct StopAndWaitReceiver {
    last_valid_seq: u32,
}

impl StopAndWaitReceiver {
    pub fn new(last_valid_seq: u32) -> Self {
        Self { last_valid_seq }
    }
}

impl ReceiveWindow for StopAndWaitReceiver {
    fn on_packet(
        &mut self,
        header: &Header,
        payload: Option<&[u8]>,
        output: &mut Vec<u8>,
    ) -> Verdict {
        if header.seq != self.last_valid_seq.wrapping_add(1) {
            debug!(
                seq = header.seq,
                last_valid = self.last_valid_seq,
                "duplicate or out of order, re-acking"
            );
            return Verdict::ack(self.last_valid_seq);
        }
        if let Some(data) = payload {
            output.extend_from_slice(data);
        }
        self.last_valid_seq = header.seq;
        if header.flags().fin {
            Verdict::finish(header.seq)
        } else {
            Verdict::ack(header.seq)
        }
    }

    fn last_valid_seq(&self) -> u32 {
        self.last_valid_seq
    }
}
