mod udp;

pub use self::udp::UdpChannel;

#[cfg(test)]
pub use self::mock::MockChannel;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// An unreliable datagram endpoint.
///
/// Datagrams may be lost, duplicated or reordered but never corrupted.
/// Only receiving is bounded in time: a receive that outlives the read
/// timeout returns `Ok(None)`, which is what drives retransmission.
pub trait Channel: Send {
    /// Send one datagram to `peer`.
    fn send_to(&mut self, buf: &[u8], peer: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram into `buf`, or `None` when the read timeout elapses.
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    /// Bound future receives; `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}
