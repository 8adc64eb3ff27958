//! Three-way handshake.
//!
//! ```text
//!   sender                          receiver
//!     | SYN seq=0 ------------------->  |  peer bound, lastValidSeq = 0
//!     | <----- SYN-ACK seq=1 ack=0 win=64
//!     | ACK seq=0 ------------------->  |  first non-SYN datagram completes
//! ```
//!
//! The sender times the SYN/SYN-ACK exchange and sizes its retransmission
//! timeout from it. Neither side retries: any failure aborts the session.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::channel::Channel;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::packet::{encode, Flags, Header, MAX_PACKET};
use crate::session::{SessionOptions, RECEIVER_WINDOW};

/// What the sender learned from the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub rtt: Duration,
    /// Operative retransmission timeout.
    pub timeout: Duration,
}

/// What the receiver learned from the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub peer: SocketAddr,
    pub last_valid_seq: u32,
}

/// `rtt * multiplier`, floored at the configured minimum.
pub fn derive_timeout(rtt: Duration, opts: &SessionOptions) -> Duration {
    rtt.saturating_mul(opts.rtt_multiplier).max(opts.min_timeout)
}

/// Sender side. Leaves the channel's read timeout at the derived value.
#[instrument(skip_all, fields(%peer))]
pub fn initiate<C: Channel + ?Sized>(
    channel: &mut C,
    peer: SocketAddr,
    clock: &dyn Clock,
    opts: &SessionOptions,
) -> Result<Handshake> {
    let syn = encode(0, 0, Flags::SYN, 0, None)?;
    channel.set_read_timeout(Some(opts.handshake_timeout))?;

    let sent_at = clock.now();
    channel.send_to(&syn, peer)?;
    debug!("sent syn");

    let mut buf = [0u8; MAX_PACKET];
    let (len, _) = channel.recv_from(&mut buf)?.ok_or_else(|| {
        Error::Handshake(format!("no SYN-ACK within {:?}", opts.handshake_timeout))
    })?;
    let rtt = clock.since(sent_at);

    let header = Header::decode(&buf[..len])?;
    let flags = header.flags();
    if !(flags.syn && flags.ack) {
        return Err(Error::Handshake(format!(
            "expected SYN-ACK, got flags {flags}"
        )));
    }
    if header.ack != 0 {
        return Err(Error::Handshake(format!(
            "SYN-ACK acknowledges {}, expected 0",
            header.ack
        )));
    }

    let timeout = derive_timeout(rtt, opts);
    channel.set_read_timeout(Some(timeout))?;
    channel.send_to(&encode(0, header.seq, Flags::ACK, 0, None)?, peer)?;
    info!(?rtt, ?timeout, "connection established");

    Ok(Handshake { rtt, timeout })
}

/// Receiver side. Leaves the channel's read timeout at the idle timeout.
#[instrument(skip_all)]
pub fn accept<C: Channel + ?Sized>(channel: &mut C, opts: &SessionOptions) -> Result<Accepted> {
    let idle = opts.idle_timeout;
    channel.set_read_timeout(idle)?;

    let mut buf = [0u8; MAX_PACKET];
    let (len, peer) = channel
        .recv_from(&mut buf)?
        .ok_or_else(|| Error::Idle(idle.unwrap_or_default()))?;
    let syn = Header::decode(&buf[..len])?;
    if !syn.flags().syn {
        return Err(Error::Handshake(format!(
            "expected SYN from {peer}, got flags {}",
            syn.flags()
        )));
    }
    debug!(%peer, seq = syn.seq, "received syn");
    let last_valid_seq = syn.seq;

    let syn_ack = encode(1, syn.seq, Flags::SYN_ACK, RECEIVER_WINDOW, None)?;
    channel.send_to(&syn_ack, peer)?;
    debug!("sent syn-ack");

    channel.set_read_timeout(Some(opts.handshake_timeout))?;
    loop {
        let (len, from) = channel.recv_from(&mut buf)?.ok_or_else(|| {
            Error::Handshake(format!("no ACK within {:?}", opts.handshake_timeout))
        })?;
        if from != peer {
            debug!(%from, "ignoring datagram from stranger");
            continue;
        }
        let header = Header::decode(&buf[..len])?;
        if header.flags().syn {
            debug!(seq = header.seq, "duplicate syn, still waiting for ack");
            continue;
        }
        break;
    }

    channel.set_read_timeout(idle)?;
    info!(%peer, "connection established");
    Ok(Accepted {
        peer,
        last_valid_seq,
    })
}
