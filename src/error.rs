//! Error type shared by every layer of the transfer.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::arq::Method;

/// Result type for drtp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every condition that aborts a session.
///
/// Receive timeouts are deliberately absent: the channel reports them as
/// `Ok(None)` and the engines treat them as the retransmission trigger.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying datagram socket or the file system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Datagram too short to hold a header.
    #[error("malformed header: expected {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },

    /// Payload does not fit in a single packet.
    #[error("payload of {0} bytes exceeds the per-packet limit")]
    PayloadTooLarge(usize),

    /// The three-way handshake did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The sender ran out of retransmission attempts.
    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),

    /// The sender expected an acknowledgment and got something else.
    #[error("expected an ack, got a packet with flags {0}")]
    MissingAck(String),

    /// Both peers must agree on the reliability method.
    #[error("peer announced method {announced}, local method is {local}")]
    MethodMismatch { announced: Method, local: Method },

    /// The session announcement could not be built or parsed.
    #[error("invalid session announcement: {0}")]
    Announcement(String),

    /// No packet from the peer within the idle timeout.
    #[error("no packet from peer within {0:?}")]
    Idle(Duration),

    /// Invalid command line or session configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
