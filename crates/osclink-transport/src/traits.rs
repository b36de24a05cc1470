use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;

/// The physical link a channel is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// USB virtual serial port, SLIP framed.
    Usb,
    /// UDP over Ethernet, one packet per datagram.
    Udp,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Usb => "usb",
            TransportKind::Udp => "udp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of one packet read from a [`PacketSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Number of bytes written into the caller's buffer.
    pub len: usize,
    /// Sender address, when the transport has one (UDP).
    pub source: Option<SocketAddr>,
}

/// Blocking reader of whole packets.
///
/// Each call yields exactly one packet: a datagram for UDP, a frame for SLIP.
/// A read timeout surfaces as [`TransportError::TimedOut`](crate::TransportError::TimedOut)
/// so receive loops can poll a shutdown flag between packets.
pub trait PacketSource {
    fn recv_packet(&mut self, buf: &mut [u8]) -> Result<Received>;
}

/// Writer of whole packets, shared between every producer of a channel.
///
/// `dest` is the reply route for connectionless transports and is ignored
/// by point-to-point links.
pub trait PacketSink: Send + Sync {
    fn send_packet(&self, packet: &[u8], dest: Option<SocketAddr>) -> Result<()>;
}

impl<T: PacketSink + ?Sized> PacketSink for Arc<T> {
    fn send_packet(&self, packet: &[u8], dest: Option<SocketAddr>) -> Result<()> {
        (**self).send_packet(packet, dest)
    }
}

impl<T: PacketSink + ?Sized> PacketSink for Box<T> {
    fn send_packet(&self, packet: &[u8], dest: Option<SocketAddr>) -> Result<()> {
        (**self).send_packet(packet, dest)
    }
}
