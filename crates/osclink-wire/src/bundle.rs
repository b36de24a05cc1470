use bytes::{BufMut, BytesMut};

use crate::error::{Result, WireError};

/// Literal opening every bundle, NUL included.
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Bundle tag plus the 8-byte timetag.
pub const BUNDLE_HEADER_LEN: usize = 16;

/// Bytes in front of the first message of a freshly started bundle:
/// the header plus that message's 4-byte length prefix.
pub const SINGLE_MESSAGE_PREAMBLE: usize = BUNDLE_HEADER_LEN + 4;

/// NTP-style timestamp carried by every bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timetag {
    pub seconds: u32,
    pub fraction: u32,
}

impl Timetag {
    /// The special "execute immediately" value.
    pub const IMMEDIATE: Timetag = Timetag {
        seconds: 0,
        fraction: 1,
    };
}

/// What a packet is, judged by its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Message,
    Bundle,
}

/// Classify a raw packet.
///
/// `/` opens a message and `#bundle\0` opens a bundle. A bundle must hold
/// at least its 16-byte header.
pub fn classify(packet: &[u8]) -> Result<PacketKind> {
    match packet.first() {
        None => Err(WireError::EmptyPacket),
        Some(b'/') => Ok(PacketKind::Message),
        Some(b'#') if packet.starts_with(BUNDLE_TAG) => {
            if packet.len() < BUNDLE_HEADER_LEN {
                Err(WireError::ShortBundle(packet.len()))
            } else {
                Ok(PacketKind::Bundle)
            }
        }
        Some(&other) => Err(WireError::UnknownPacket(other)),
    }
}

/// Append a bundle header to `dst`.
pub fn write_bundle_header(dst: &mut BytesMut, timetag: Timetag) {
    dst.reserve(BUNDLE_HEADER_LEN);
    dst.put_slice(BUNDLE_TAG);
    dst.put_u32(timetag.seconds);
    dst.put_u32(timetag.fraction);
}

/// Append one length-prefixed bundle element.
pub fn write_bundle_element(dst: &mut BytesMut, packet: &[u8]) {
    dst.reserve(4 + packet.len());
    dst.put_u32(packet.len() as u32);
    dst.put_slice(packet);
}

/// Iterator over the sub-packets of one bundle, in stream order.
///
/// Every element is a slice of the original bytes. A declared length that
/// runs past the end of the bundle, or a dangling partial length prefix,
/// ends iteration; [`BundleElements::is_truncated`] then reports it.
#[derive(Debug, Clone)]
pub struct BundleElements<'a> {
    rest: &'a [u8],
    truncated: bool,
}

impl<'a> BundleElements<'a> {
    /// Iterate the elements of `packet`, which must be a complete bundle.
    pub fn new(packet: &'a [u8]) -> Result<Self> {
        match classify(packet)? {
            PacketKind::Bundle => Ok(Self {
                rest: &packet[BUNDLE_HEADER_LEN..],
                truncated: false,
            }),
            PacketKind::Message => Err(WireError::UnknownPacket(b'/')),
        }
    }

    /// Whether iteration stopped on a malformed element.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> Iterator for BundleElements<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() || self.truncated {
            return None;
        }
        let Some((prefix, body)) = self.rest.split_first_chunk::<4>() else {
            self.truncated = true;
            return None;
        };
        let len = u32::from_be_bytes(*prefix) as usize;
        if len > body.len() {
            self.truncated = true;
            return None;
        }
        let (element, rest) = body.split_at(len);
        self.rest = rest;
        Some(element)
    }
}
