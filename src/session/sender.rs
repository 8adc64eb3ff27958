use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, trace, warn};

use crate::arq::{AckOutcome, Method, SendWindow, StopAndWaitSender};
use crate::channel::Channel;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::fault::FaultInjector;
use crate::packet::{encode, Flags, Header, MAX_PACKET, MAX_PAYLOAD};
use crate::retry::{Attempt, RetryController};
use crate::session::{handshake, Announcement, SessionOptions, TransferStats};

/// Sending end of a session.
pub struct Sender<C: Channel> {
    channel: C,
    peer: SocketAddr,
    clock: Arc<dyn Clock>,
    opts: SessionOptions,
    rtt: Duration,
    timeout: Duration,
    fault: Option<FaultInjector>,
    next_seq: u32,
}

impl<C: Channel> Sender<C> {
    /// Run the handshake against `peer`.
    pub fn connect(
        mut channel: C,
        peer: SocketAddr,
        clock: Arc<dyn Clock>,
        opts: SessionOptions,
    ) -> Result<Self> {
        let hs = handshake::initiate(&mut channel, peer, clock.as_ref(), &opts)?;
        Ok(Self {
            channel,
            peer,
            clock,
            opts,
            rtt: hs.rtt,
            timeout: hs.timeout,
            fault: None,
            next_seq: 1,
        })
    }

    /// Drop one data packet somewhere in the first eleven transmissions.
    pub fn with_fault(mut self, fault: FaultInjector) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn rtt(&self) -> Duration {
        self.rtt
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send the bootstrap message and wait for its ack.
    #[instrument(skip(self))]
    pub fn announce(&mut self, file_name: &str, method: Method) -> Result<()> {
        let payload = Announcement::new(file_name, method).encode()?;
        let mut window = StopAndWaitSender::new();
        window.push(0, encode(0, 0, Flags::NONE, 0, Some(&payload))?);

        let mut retries = RetryController::new(self.opts.max_retries);
        let mut stats = TransferStats::default();
        while !window.is_empty() {
            self.round(&mut window, &mut retries, &mut stats, false)?;
        }
        info!("announcement acknowledged");
        Ok(())
    }

    /// Stream `reader` to the peer using `method`, finishing with a FIN.
    #[instrument(skip(self, reader), fields(peer = %self.peer))]
    pub fn send<R: Read>(
        &mut self,
        method: Method,
        window_size: u16,
        mut reader: R,
    ) -> Result<TransferStats> {
        let started = self.clock.now();
        let advertised = method.advertised_window(window_size);
        let mut window = method.send_window(window_size);
        let mut retries = RetryController::new(self.opts.max_retries);
        let mut stats = TransferStats::default();
        let mut reading = true;

        loop {
            while reading && window.has_room() {
                let chunk = read_chunk(&mut reader)?;
                let seq = self.next_seq;
                self.next_seq = self.next_seq.wrapping_add(1);
                if chunk.is_empty() {
                    trace!(seq, "queued fin");
                    window.push(seq, encode(seq, 0, Flags::FIN, advertised, None)?);
                    reading = false;
                } else {
                    trace!(seq, len = chunk.len(), "queued data");
                    stats.bytes += chunk.len() as u64;
                    stats.packets += 1;
                    window.push(
                        seq,
                        encode(seq, 0, Flags::NONE, advertised, Some(&chunk))?,
                    );
                }
            }
            if window.is_empty() {
                break;
            }
            self.round(window.as_mut(), &mut retries, &mut stats, true)?;
        }

        stats.elapsed = self.clock.since(started);
        info!(
            bytes = stats.bytes,
            transmissions = stats.transmissions,
            timeouts = stats.timeouts,
            "transfer complete"
        );
        Ok(stats)
    }

    /// One transmission round: send everything in flight, then collect acks
    /// until the window drains or the wait times out.
    fn round(
        &mut self,
        window: &mut dyn SendWindow,
        retries: &mut RetryController,
        stats: &mut TransferStats,
        faults_armed: bool,
    ) -> Result<()> {
        match retries.attempt() {
            Attempt::Proceed { attempt } if attempt > 1 => {
                debug!(attempt, in_flight = window.len(), "retransmitting")
            }
            Attempt::Proceed { .. } => {}
            Attempt::Exhausted { limit } => {
                error!(limit, "giving up");
                return Err(Error::RetriesExhausted(limit));
            }
        }

        for (seq, packet) in window.outstanding() {
            stats.transmissions += 1;
            if faults_armed && self.fault.as_mut().is_some_and(|f| f.should_skip()) {
                stats.skipped += 1;
                warn!(seq, "skipping packet");
                continue;
            }
            self.channel.send_to(packet, self.peer)?;
            debug!(seq, len = packet.len(), "sent");
        }

        let mut buf = [0u8; MAX_PACKET];
        while !window.is_empty() {
            let Some(ack) = self.await_ack(&mut buf, stats)? else {
                return Ok(());
            };
            match window.on_ack(ack) {
                AckOutcome::Advanced(retired) => {
                    trace!(ack, retired, "window advanced");
                    retries.reset();
                }
                AckOutcome::Stale => {
                    debug!(ack, "stale ack");
                    if window.resend_on_stale_ack() {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// Next ack number from the peer, or `None` on timeout.
    fn await_ack(&mut self, buf: &mut [u8], stats: &mut TransferStats) -> Result<Option<u32>> {
        loop {
            let Some((len, from)) = self.channel.recv_from(buf)? else {
                stats.timeouts += 1;
                warn!(timeout = ?self.timeout, "no ack");
                return Ok(None);
            };
            if from != self.peer {
                debug!(%from, "ignoring datagram from stranger");
                continue;
            }
            let header = Header::decode(&buf[..len])?;
            let flags = header.flags();
            if !flags.ack {
                return Err(Error::MissingAck(flags.to_string()));
            }
            if flags.syn {
                debug!(ack = header.ack, "ignoring repeated syn-ack");
                continue;
            }
            debug!(ack = header.ack, "received ack");
            return Ok(Some(header.ack));
        }
    }
}

/// Read up to one payload's worth; short only at end of input.
fn read_chunk<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(MAX_PAYLOAD);
    reader
        .by_ref()
        .take(MAX_PAYLOAD as u64)
        .read_to_end(&mut chunk)?;
    Ok(chunk)
}
