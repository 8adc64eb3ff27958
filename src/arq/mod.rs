//! The three reliability algorithms.
//!
//! Each method contributes a send window (what is in flight and how acks
//! retire it) and a receive window (how an incoming packet changes the
//! reassembled output and what to acknowledge). The session drivers own
//! all I/O and pick the pair once, from the negotiated [`Method`].

mod go_back_n;
mod selective_repeat;
mod stop_and_wait;

pub use self::go_back_n::{GoBackNReceiver, GoBackNSender};
pub use self::selective_repeat::{SelectiveRepeatReceiver, SelectiveRepeatSender};
pub use self::stop_and_wait::{StopAndWaitReceiver, StopAndWaitSender};

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::packet::Header;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Method {
    #[value(name = "saw")]
    StopAndWait,
    #[value(name = "gbn")]
    GoBackN,
    #[value(name = "sr")]
    SelectiveRepeat,
}

impl Method {
    /// Token used on the wire and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::StopAndWait => "saw",
            Method::GoBackN => "gbn",
            Method::SelectiveRepeat => "sr",
        }
    }

    pub fn long_name(self) -> &'static str {
        match self {
            Method::StopAndWait => "stop and wait",
            Method::GoBackN => "go back N",
            Method::SelectiveRepeat => "selective repeat",
        }
    }

    /// Window advertised in data packets; Stop-and-Wait has none.
    pub fn advertised_window(self, window_size: u16) -> u16 {
        match self {
            Method::StopAndWait => 0,
            Method::GoBackN | Method::SelectiveRepeat => window_size,
        }
    }

    pub fn send_window(self, window_size: u16) -> Box<dyn SendWindow> {
        let capacity = usize::from(window_size.max(1));
        match self {
            Method::StopAndWait => Box::new(StopAndWaitSender::new()),
            Method::GoBackN => Box::new(GoBackNSender::new(capacity)),
            Method::SelectiveRepeat => Box::new(SelectiveRepeatSender::new(capacity)),
        }
    }

    pub fn receive_window(self, last_valid_seq: u32) -> Box<dyn ReceiveWindow> {
        match self {
            Method::StopAndWait => Box::new(StopAndWaitReceiver::new(last_valid_seq)),
            Method::GoBackN => Box::new(GoBackNReceiver::new(last_valid_seq)),
            Method::SelectiveRepeat => Box::new(SelectiveRepeatReceiver::new(last_valid_seq)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saw" => Ok(Method::StopAndWait),
            "gbn" => Ok(Method::GoBackN),
            "sr" => Ok(Method::SelectiveRepeat),
            other => Err(Error::Announcement(format!("unknown method {other:?}"))),
        }
    }
}

/// What an ack did to the send window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// This many in-flight packets were retired.
    Advanced(usize),
    /// Nothing in flight matched.
    Stale,
}

/// Sender-side in-flight window.
pub trait SendWindow: Send {
    /// Room for one more packet?
    fn has_room(&self) -> bool;

    /// Put an encoded packet in flight.
    fn push(&mut self, seq: u32, packet: Vec<u8>);

    /// In-flight packets with their sequence numbers, in transmission order.
    fn outstanding(&self) -> Vec<(u32, &[u8])>;

    /// Retire whatever `ack` acknowledges.
    fn on_ack(&mut self, ack: u32) -> AckOutcome;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an ack that retires nothing should trigger an immediate resend.
    fn resend_on_stale_ack(&self) -> bool {
        false
    }
}

/// What the driver must do after a packet was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Acknowledgment number to send back, if any.
    pub ack: Option<u32>,
    /// The transfer is complete.
    pub finished: bool,
}

impl Verdict {
    pub fn ack(seq: u32) -> Self {
        Verdict {
            ack: Some(seq),
            finished: false,
        }
    }

    pub fn ignore() -> Self {
        Verdict {
            ack: None,
            finished: false,
        }
    }

    pub fn finish(seq: u32) -> Self {
        Verdict {
            ack: Some(seq),
            finished: true,
        }
    }
}

/// Receiver-side sequence validation and reassembly.
pub trait ReceiveWindow: Send {
    /// Handle one packet from the peer, appending any completed in-order
    /// data to `output`.
    fn on_packet(&mut self, header: &Header, payload: Option<&[u8]>, output: &mut Vec<u8>)
        -> Verdict;

    /// Highest sequence number accepted so far.
    fn last_valid_seq(&self) -> u32;
}
