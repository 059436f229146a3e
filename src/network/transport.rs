//! Datagram Transport
//!
//! The send/receive primitive shared by the server loop and the client
//! correlator. Receives always carry an explicit wait ceiling.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::{GateError, Result};

/// Shortest wait handed to the OS (a zero read timeout means "block forever")
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Whole-datagram send/receive
pub trait Transport: Send {
    /// Send one datagram to `peer`
    fn send_to(&self, datagram: &[u8], peer: SocketAddr) -> Result<()>;

    /// Wait up to `wait` for one datagram
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn recv_from(&self, buf: &mut [u8], wait: Duration) -> Result<Option<(usize, SocketAddr)>>;

    fn local_addr(&self) -> Result<SocketAddr>;
}

/// UDP socket transport
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind a UDP socket
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self { socket })
    }

    /// Wrap an already bound socket
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, datagram: &[u8], peer: SocketAddr) -> Result<()> {
        let sent = self.socket.send_to(datagram, peer)?;
        if sent != datagram.len() {
            return Err(GateError::Network(format!(
                "short send to {}: {} of {} bytes",
                peer,
                sent,
                datagram.len()
            )));
        }
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8], wait: Duration) -> Result<Option<(usize, SocketAddr)>> {
        self.socket.set_read_timeout(Some(wait.max(MIN_WAIT)))?;

        match self.socket.recv_from(buf) {
            Ok((len, peer)) => Ok(Some((len, peer))),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            // Windows reports read timeouts as TimedOut
            Err(ref e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            // ICMP port unreachable from an earlier send (Windows)
            Err(ref e) if e.kind() == ErrorKind::ConnectionReset => {
                tracing::debug!("Ignoring connection reset on UDP socket");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// Resolve a `host:port` string to the first socket address
pub fn resolve_addr(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| GateError::Network(format!("address {} did not resolve", addr)))
}
