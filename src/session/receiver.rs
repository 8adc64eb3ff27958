use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::arq::Method;
use crate::channel::Channel;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::fault::FaultInjector;
use crate::packet::{encode, packet_kind, Flags, Header, Packet, MAX_PACKET};
use crate::session::{handshake, Announcement, SessionOptions, TransferStats, RECEIVER_WINDOW};

/// Receiving end of a session, bound to the peer that sent the SYN.
pub struct Receiver<C: Channel> {
    channel: C,
    peer: SocketAddr,
    clock: Arc<dyn Clock>,
    opts: SessionOptions,
    fault: Option<FaultInjector>,
    last_valid_seq: u32,
    /// Sequence number for our own ack packets.
    ack_seq: u32,
}

impl<C: Channel> Receiver<C> {
    /// Wait for a peer and complete the handshake with it.
    pub fn accept(mut channel: C, clock: Arc<dyn Clock>, opts: SessionOptions) -> Result<Self> {
        let accepted = handshake::accept(&mut channel, &opts)?;
        Ok(Self {
            channel,
            peer: accepted.peer,
            clock,
            opts,
            fault: None,
            last_valid_seq: accepted.last_valid_seq,
            ack_seq: 0,
        })
    }

    /// Withhold one data ack somewhere in the first eleven.
    pub fn with_fault(mut self, fault: FaultInjector) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Wait for the bootstrap message and check it against `local`.
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub fn expect_announcement(&mut self, local: Method) -> Result<Announcement> {
        let mut buf = [0u8; MAX_PACKET];
        loop {
            let len = self.next_datagram(&mut buf)?;
            let packet = Packet::parse(&buf[..len])?;
            let header = packet.header;
            if header.flags().syn {
                debug!(seq = header.seq, "ignoring repeated syn");
                continue;
            }
            let Some(payload) = packet.payload else {
                debug!(seq = header.seq, "ignoring empty packet before announcement");
                continue;
            };

            let announcement = Announcement::parse(payload)?;
            if announcement.method != local {
                return Err(Error::MethodMismatch {
                    announced: announcement.method,
                    local,
                });
            }
            self.last_valid_seq = header.seq;
            self.send_ack(header.seq, false)?;
            info!(
                file = %announcement.file_name,
                method = announcement.method.long_name(),
                "session announced"
            );
            return Ok(announcement);
        }
    }

    /// Reassemble the peer's byte stream until the transfer completes,
    /// then linger to answer late retransmissions.
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub fn receive(&mut self, method: Method) -> Result<(Vec<u8>, TransferStats)> {
        let started = self.clock.now();
        let mut window = method.receive_window(self.last_valid_seq);
        let mut output = Vec::new();
        let mut stats = TransferStats::default();
        let mut buf = [0u8; MAX_PACKET];

        loop {
            let len = self.next_datagram(&mut buf)?;
            let packet = Packet::parse(&buf[..len])?;
            let header = packet.header;
            let flags = header.flags();
            if flags.syn {
                debug!(seq = header.seq, "ignoring repeated syn");
                continue;
            }
            debug!(seq = header.seq, kind = packet_kind(flags), len, "received");
            if packet.payload.is_some() {
                stats.packets += 1;
            }

            let verdict = window.on_packet(&header, packet.payload, &mut output);
            if let Some(ack) = verdict.ack {
                if !self.send_ack(ack, !flags.fin)? {
                    stats.skipped += 1;
                }
                stats.transmissions += 1;
            }
            if verdict.finished {
                break;
            }
        }

        self.last_valid_seq = window.last_valid_seq();
        stats.bytes = output.len() as u64;
        stats.elapsed = self.clock.since(started);
        info!(bytes = stats.bytes, packets = stats.packets, "transfer complete");

        self.linger()?;
        Ok((output, stats))
    }

    /// Re-ack whatever the peer still sends until it goes quiet.
    fn linger(&mut self) -> Result<()> {
        if self.opts.linger.is_zero() {
            return Ok(());
        }
        self.channel.set_read_timeout(Some(self.opts.linger))?;
        let mut buf = [0u8; MAX_PACKET];
        while let Some((len, from)) = self.channel.recv_from(&mut buf)? {
            if from != self.peer {
                continue;
            }
            match Header::decode(&buf[..len]) {
                Ok(header) => {
                    debug!(seq = header.seq, "late packet, re-acking");
                    self.send_ack(header.seq, false)?;
                }
                Err(e) => debug!(%e, "ignoring late datagram"),
            }
        }
        debug!("peer quiet, closing");
        Ok(())
    }

    /// Next datagram from the bound peer.
    fn next_datagram(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.channel.recv_from(buf)? {
                None => return Err(Error::Idle(self.opts.idle_timeout.unwrap_or_default())),
                Some((len, from)) if from == self.peer => return Ok(len),
                Some((_, from)) => debug!(%from, "ignoring datagram from stranger"),
            }
        }
    }

    /// Acknowledge `ack`. Returns `false` if the fault hook withheld it.
    fn send_ack(&mut self, ack: u32, skippable: bool) -> Result<bool> {
        if skippable && self.fault.as_mut().is_some_and(|f| f.should_skip()) {
            warn!(ack, "skipping ack");
            return Ok(false);
        }
        let packet = encode(self.ack_seq, ack, Flags::ACK, RECEIVER_WINDOW, None)?;
        self.ack_seq = self.ack_seq.wrapping_add(1);
        self.channel.send_to(&packet, self.peer)?;
        debug!(ack, "sent ack");
        Ok(true)
    }
}
