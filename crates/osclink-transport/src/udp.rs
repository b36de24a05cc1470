use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{PacketSink, PacketSource, Received};

/// UDP transport: every datagram is one OSC packet.
///
/// Replies are routed to the sender of the request unless the caller passes
/// no destination, in which case the default destination (if any) is used.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    default_dest: Option<SocketAddr>,
}

impl UdpTransport {
    /// Bind to an explicit local address.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;
        info!(%local_addr, "udp transport bound");
        Ok(Self {
            socket,
            local_addr,
            default_dest: None,
        })
    }

    /// Bind to `port` on every IPv4 interface. Port 0 picks an ephemeral port.
    pub fn bind_port(port: u16) -> Result<Self> {
        Self::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }

    /// Set the destination used when a send carries no explicit route.
    pub fn with_default_destination(mut self, dest: SocketAddr) -> Self {
        self.default_dest = Some(dest);
        self
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Locally bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Default destination, if configured.
    pub fn default_destination(&self) -> Option<SocketAddr> {
        self.default_dest
    }

    /// Clone the socket handle so reading and writing can live on different threads.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            local_addr: self.local_addr,
            default_dest: self.default_dest,
        })
    }
}

impl PacketSource for UdpTransport {
    fn recv_packet(&mut self, buf: &mut [u8]) -> Result<Received> {
        loop {
            match self.socket.recv_from(buf) {
                Ok((len, source)) => {
                    debug!(%source, len, "udp datagram received");
                    return Ok(Received {
                        len,
                        source: Some(source),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::from_read(err)),
            }
        }
    }
}

impl PacketSink for UdpTransport {
    fn send_packet(&self, packet: &[u8], dest: Option<SocketAddr>) -> Result<()> {
        let dest = dest
            .or(self.default_dest)
            .ok_or(TransportError::NoDestination)?;
        let sent = self.socket.send_to(packet, dest)?;
        if sent != packet.len() {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short datagram write ({sent} of {} bytes)", packet.len()),
            )));
        }
        debug!(%dest, len = packet.len(), "udp datagram sent");
        Ok(())
    }
}

/// Outgoing half of a tokio UDP socket, usable from synchronous channel flushes.
#[cfg(feature = "async")]
#[derive(Debug, Clone)]
pub struct AsyncUdpSink {
    socket: std::sync::Arc<tokio::net::UdpSocket>,
    default_dest: Option<SocketAddr>,
}

#[cfg(feature = "async")]
impl AsyncUdpSink {
    pub fn new(socket: std::sync::Arc<tokio::net::UdpSocket>) -> Self {
        Self {
            socket,
            default_dest: None,
        }
    }

    pub fn with_default_destination(mut self, dest: SocketAddr) -> Self {
        self.default_dest = Some(dest);
        self
    }
}

#[cfg(feature = "async")]
impl PacketSink for AsyncUdpSink {
    fn send_packet(&self, packet: &[u8], dest: Option<SocketAddr>) -> Result<()> {
        let dest = dest
            .or(self.default_dest)
            .ok_or(TransportError::NoDestination)?;
        // Datagram sockets are almost always writable; a full send buffer is
        // reported to the caller rather than awaited.
        self.socket.try_send_to(packet, dest)?;
        Ok(())
    }
}
