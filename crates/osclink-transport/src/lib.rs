//! Packet transports for OSC links.
//!
//! Two links carry OSC packets to and from a device:
//! - UDP over Ethernet, where datagram boundaries are packet boundaries
//! - a USB virtual serial port, where SLIP frames delimit packets
//!
//! This is the lowest layer of osclink. The router only sees the
//! [`PacketSource`] and [`PacketSink`] traits provided here.

pub mod error;
pub mod slip;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use slip::{encode_slip, SerialSink, SlipCodec, SlipReader, SlipWriter};
pub use traits::{PacketSink, PacketSource, Received, TransportKind};
pub use udp::UdpTransport;

#[cfg(feature = "async")]
pub use udp::AsyncUdpSink;
