//! Connection setup and the sender/receiver drivers.
//!
//! A session runs in three phases: the three-way handshake, the bootstrap
//! announcement (file name and method, sent Stop-and-Wait at seq 0), and
//! the data phase driven by the negotiated [`Method`]'s windows.

mod handshake;
mod receiver;
mod sender;
mod stats;

pub use self::handshake::{accept, derive_timeout, initiate, Accepted, Handshake};
pub use self::receiver::Receiver;
pub use self::sender::Sender;
pub use self::stats::TransferStats;

use std::path::Path;
use std::time::Duration;

use crate::arq::Method;
use crate::error::{Error, Result};
use crate::packet::MAX_PAYLOAD;
use crate::retry::MAX_RETRIES;

/// How long the sender waits for SYN-ACK, before any RTT is known.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);
/// Operative timeout = measured RTT x this.
pub const RTT_MULTIPLIER: u32 = 4;
/// Window advertised by the receiver in SYN-ACK and acks.
pub const RECEIVER_WINDOW: u16 = 64;
/// Token between file name and method in the announcement.
pub const SEPARATOR: &str = "<SEPARATOR>";

/// Timing and retry knobs shared by both roles.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub handshake_timeout: Duration,
    pub rtt_multiplier: u32,
    /// Lower bound on the operative timeout; sockets reject a zero timeout.
    pub min_timeout: Duration,
    pub max_retries: u32,
    /// Receiver: longest wait for the next packet. `None` blocks.
    pub idle_timeout: Option<Duration>,
    /// Receiver: how long to keep re-acking after the transfer completed.
    pub linger: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            rtt_multiplier: RTT_MULTIPLIER,
            min_timeout: Duration::from_millis(1),
            max_retries: MAX_RETRIES,
            idle_timeout: None,
            linger: Duration::from_secs(2),
        }
    }
}

/// The bootstrap message: what is being sent and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub file_name: String,
    pub method: Method,
}

impl Announcement {
    pub fn new(file_name: impl Into<String>, method: Method) -> Self {
        Self {
            file_name: file_name.into(),
            method,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let text = format!("{}{}{}", self.file_name, SEPARATOR, self.method);
        if text.len() > MAX_PAYLOAD {
            return Err(Error::Announcement(format!(
                "{} bytes do not fit in one packet",
                text.len()
            )));
        }
        Ok(text.into_bytes())
    }

    /// Parse `<name><SEPARATOR><method>`. Only the final path component of
    /// the name is kept.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| Error::Announcement("payload is not UTF-8".into()))?;
        let (name, method) = text
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| Error::Announcement(format!("missing separator in {text:?}")))?;
        let method: Method = method.parse()?;
        let file_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Announcement(format!("unusable file name {name:?}")))?;
        Ok(Self::new(file_name, method))
    }
}
