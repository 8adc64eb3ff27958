use crate::channel::Channel;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// A [`Channel`] backed by a real UDP socket.
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    connected: Option<SocketAddr>,
}

impl UdpChannel {
    /// Bind to `addr` and accept datagrams from anyone (receiver side).
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self {
            socket,
            connected: None,
        })
    }

    /// Bind an ephemeral port and connect it to `peer` (sender side).
    pub fn connect(peer: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;
        Ok(Self {
            socket,
            connected: Some(peer),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Channel for UdpChannel {
    fn send_to(&mut self, buf: &[u8], peer: SocketAddr) -> io::Result<usize> {
        match self.connected {
            Some(addr) if addr == peer => self.socket.send(buf),
            _ => self.socket.send_to(buf, peer),
        }
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            // Unix reports an expired read timeout as WouldBlock, Windows as TimedOut
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }
}
