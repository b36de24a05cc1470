use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};

use crate::address;
use crate::error::{Result, WireError};

/// Maximum number of data items decoded from one message.
pub const MAX_DATA_ITEMS: usize = 20;

/// First byte of every type tag string.
pub const TYPE_TAG_PREFIX: u8 = b',';

/// One typed argument of an OSC message.
#[derive(Debug, Clone, PartialEq)]
pub enum DataItem {
    Int32(i32),
    Float32(f32),
    String(String),
    Blob(Bytes),
}

impl DataItem {
    /// Type tag character for this item.
    pub fn type_tag(&self) -> u8 {
        match self {
            DataItem::Int32(_) => b'i',
            DataItem::Float32(_) => b'f',
            DataItem::String(_) => b's',
            DataItem::Blob(_) => b'b',
        }
    }

    /// Bytes this item occupies on the wire, padding included.
    pub fn encoded_len(&self) -> usize {
        match self {
            DataItem::Int32(_) | DataItem::Float32(_) => 4,
            DataItem::String(s) => padded_str_len(s.len()),
            DataItem::Blob(b) => 4 + padded_blob_len(b.len()),
        }
    }
}

impl From<i32> for DataItem {
    fn from(value: i32) -> Self {
        DataItem::Int32(value)
    }
}

impl From<f32> for DataItem {
    fn from(value: f32) -> Self {
        DataItem::Float32(value)
    }
}

impl From<&str> for DataItem {
    fn from(value: &str) -> Self {
        DataItem::String(value.to_string())
    }
}

impl From<String> for DataItem {
    fn from(value: String) -> Self {
        DataItem::String(value)
    }
}

impl From<Bytes> for DataItem {
    fn from(value: Bytes) -> Self {
        DataItem::Blob(value)
    }
}

impl From<Vec<u8>> for DataItem {
    fn from(value: Vec<u8>) -> Self {
        DataItem::Blob(Bytes::from(value))
    }
}

/// A decoded (or to-be-encoded) OSC message.
///
/// The router keeps one per channel as a scratch object and resets it
/// between packets, so decoding reuses the item vector's allocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    address: String,
    items: Vec<DataItem>,
}

impl Message {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            items: Vec::new(),
        }
    }

    /// Builder-style append of one data item.
    pub fn with_item(mut self, item: impl Into<DataItem>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn push(&mut self, item: impl Into<DataItem>) {
        self.items.push(item.into());
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn items(&self) -> &[DataItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&DataItem> {
        self.items.get(index)
    }

    /// Clear address and items, keeping allocations.
    pub fn reset(&mut self) {
        self.address.clear();
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.items.is_empty()
    }

    /// The `,`-prefixed type tag string describing the items.
    pub fn type_tags(&self) -> String {
        let mut tags = String::with_capacity(self.items.len() + 1);
        tags.push(TYPE_TAG_PREFIX as char);
        tags.extend(self.items.iter().map(|item| item.type_tag() as char));
        tags
    }

    /// Address element `index`, counting from the first element after the leading `/`.
    pub fn address_element(&self, index: usize) -> Option<&str> {
        address::element(&self.address, index)
    }

    pub fn address_element_as_int(&self, index: usize) -> Option<i32> {
        self.address_element(index)?.parse().ok()
    }

    pub fn address_element_as_float(&self, index: usize) -> Option<f32> {
        self.address_element(index)?.parse().ok()
    }

    pub fn element_count(&self) -> usize {
        address::element_count(&self.address)
    }

    /// Item `index` as an integer. Floats are truncated toward zero.
    pub fn item_as_int(&self, index: usize) -> Option<i32> {
        match self.items.get(index)? {
            DataItem::Int32(v) => Some(*v),
            DataItem::Float32(f) => Some(*f as i32),
            _ => None,
        }
    }

    /// Item `index` as a float. Integers are converted.
    pub fn item_as_float(&self, index: usize) -> Option<f32> {
        match self.items.get(index)? {
            DataItem::Float32(f) => Some(*f),
            DataItem::Int32(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn item_as_str(&self, index: usize) -> Option<&str> {
        match self.items.get(index)? {
            DataItem::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn item_as_blob(&self, index: usize) -> Option<&[u8]> {
        match self.items.get(index)? {
            DataItem::Blob(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    /// Wire size of this message.
    pub fn encoded_len(&self) -> usize {
        encoded_len(&self.address, &self.items)
    }

    /// Append the wire form of this message to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<usize> {
        encode_message(&self.address, &self.items, dst)
    }

    /// Decode a message with the default item cap.
    pub fn decode(packet: &[u8]) -> Result<Self> {
        let mut msg = Message::default();
        decode_message_into(packet, &mut msg, MAX_DATA_ITEMS)?;
        Ok(msg)
    }
}

/// Length of a NUL-terminated string of `len` bytes once padded to 4.
pub fn padded_str_len(len: usize) -> usize {
    (len + 4) & !3
}

/// Length of `len` raw blob bytes once padded to 4.
pub fn padded_blob_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Wire size of a message with this address and these items.
pub fn encoded_len(address: &str, items: &[DataItem]) -> usize {
    padded_str_len(address.len())
        + padded_str_len(1 + items.len())
        + items.iter().map(DataItem::encoded_len).sum::<usize>()
}

/// Append an encoded message to `dst`, returning the number of bytes written.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬─────────────────────┬──────────────────────────┐
/// │ Address          │ Type tag            │ Data items               │
/// │ "/…" NUL, pad 4  │ ",…" NUL, pad 4     │ i/f: 4B BE               │
/// │                  │                     │ s: NUL, pad 4            │
/// │                  │                     │ b: 4B BE len, pad 4      │
/// └──────────────────┴─────────────────────┴──────────────────────────┘
/// ```
/// Nothing is written when validation fails.
pub fn encode_message(address: &str, items: &[DataItem], dst: &mut BytesMut) -> Result<usize> {
    validate(address, items)?;

    let len = encoded_len(address, items);
    dst.reserve(len);

    put_padded_str(dst, address.as_bytes());

    dst.put_u8(TYPE_TAG_PREFIX);
    for item in items {
        dst.put_u8(item.type_tag());
    }
    put_zeros(dst, padded_str_len(1 + items.len()) - (1 + items.len()));

    for item in items {
        match item {
            DataItem::Int32(v) => dst.put_i32(*v),
            DataItem::Float32(f) => dst.put_u32(f.to_bits()),
            DataItem::String(s) => put_padded_str(dst, s.as_bytes()),
            DataItem::Blob(b) => {
                dst.put_u32(b.len() as u32);
                dst.put_slice(b);
                put_zeros(dst, padded_blob_len(b.len()) - b.len());
            }
        }
    }

    Ok(len)
}

/// Like [`encode_message`], but fails with [`WireError::Overflow`] instead of
/// growing `dst` past `limit` bytes. `dst` is untouched on failure.
pub fn encode_message_bounded(
    address: &str,
    items: &[DataItem],
    dst: &mut BytesMut,
    limit: usize,
) -> Result<usize> {
    let needed = encoded_len(address, items);
    let remaining = limit.saturating_sub(dst.len());
    if needed > remaining {
        return Err(WireError::Overflow { needed, remaining });
    }
    encode_message(address, items, dst)
}

/// Decode one message with the default item cap.
pub fn decode_message(packet: &[u8]) -> Result<Message> {
    Message::decode(packet)
}

/// Decode `packet` into a reusable message.
///
/// Decoding stops quietly at the first unrecognised type tag or once
/// `max_items` items are held; items decoded so far are kept. A missing
/// `/` or `,`, an unterminated string, or a field running past the end of
/// the packet fails the whole decode and leaves `msg` empty.
pub fn decode_message_into(packet: &[u8], msg: &mut Message, max_items: usize) -> Result<()> {
    msg.reset();
    let result = decode_fields(packet, msg, max_items);
    if result.is_err() {
        msg.reset();
    }
    result
}

/// Read just the address of a message packet.
///
/// Queries are often sent without a type tag, so the router looks at the
/// address before committing to a full decode.
pub fn packet_address(packet: &[u8]) -> Result<Cow<'_, str>> {
    if packet.first() != Some(&b'/') {
        return Err(WireError::MissingAddressSlash);
    }
    let end = packet
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::UnterminatedString { offset: 0 })?;
    Ok(String::from_utf8_lossy(&packet[..end]))
}

fn decode_fields(packet: &[u8], msg: &mut Message, max_items: usize) -> Result<()> {
    if packet.first() != Some(&b'/') {
        return Err(WireError::MissingAddressSlash);
    }

    let mut cursor = WireCursor::new(packet);
    let address = cursor.read_padded_str("address")?;
    cursor.seek_type_tag()?;
    let tags = cursor.read_padded_str("type tag")?;

    msg.address.push_str(&String::from_utf8_lossy(address));

    for &tag in tags.iter().skip(1) {
        if msg.items.len() >= max_items {
            break;
        }
        let item = match tag {
            b'i' => DataItem::Int32(cursor.read_u32("int32")? as i32),
            b'f' => DataItem::Float32(f32::from_bits(cursor.read_u32("float32")?)),
            b's' => DataItem::String(
                String::from_utf8_lossy(cursor.read_padded_str("string")?).into_owned(),
            ),
            b'b' => DataItem::Blob(Bytes::copy_from_slice(cursor.read_blob()?)),
            _ => break,
        };
        msg.items.push(item);
    }

    Ok(())
}

fn validate(address: &str, items: &[DataItem]) -> Result<()> {
    if !address.starts_with('/') {
        return Err(WireError::MissingAddressSlash);
    }
    if address.as_bytes().contains(&0) {
        return Err(WireError::InteriorNul);
    }
    for item in items {
        match item {
            DataItem::String(s) if s.as_bytes().contains(&0) => return Err(WireError::InteriorNul),
            DataItem::Blob(b) if b.len() > i32::MAX as usize => {
                return Err(WireError::BlobTooLarge(b.len()))
            }
            _ => {}
        }
    }
    Ok(())
}

fn put_padded_str(dst: &mut BytesMut, s: &[u8]) {
    dst.put_slice(s);
    put_zeros(dst, padded_str_len(s.len()) - s.len());
}

fn put_zeros(dst: &mut BytesMut, count: usize) {
    dst.put_bytes(0, count);
}

/// Bounds-checked read position over one packet.
struct WireCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, needed: usize, field: &'static str) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(WireError::Truncated {
                field,
                needed,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a NUL-terminated, 4-byte padded string; returns it without the NUL.
    fn read_padded_str(&mut self, field: &'static str) -> Result<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::UnterminatedString { offset: self.pos })?;
        let bytes = self.take(padded_str_len(nul), field)?;
        Ok(&bytes[..nul])
    }

    fn read_blob(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32("blob length")? as usize;
        let padded = len
            .checked_add(3)
            .map(|n| n & !3)
            .ok_or(WireError::BlobTooLarge(len))?;
        let bytes = self.take(padded, "blob")?;
        Ok(&bytes[..len])
    }

    /// Advance over padding to the `,` opening the type tag.
    fn seek_type_tag(&mut self) -> Result<()> {
        while let Some(&byte) = self.buf.get(self.pos) {
            match byte {
                TYPE_TAG_PREFIX => return Ok(()),
                0 => self.pos += 1,
                _ => return Err(WireError::MissingTypeTag),
            }
        }
        Err(WireError::MissingTypeTag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a_wire() -> Vec<u8> {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"/foo/bar\0\0\0\0");
        wire.extend_from_slice(b",ifs\0\0\0\0");
        wire.extend_from_slice(&[0, 0, 0, 1]);
        wire.extend_from_slice(&[0x40, 0x20, 0x00, 0x00]);
        wire.extend_from_slice(b"hi\0\0");
        wire
    }

    #[test]
    fn encodes_exact_wire_bytes() {
        let msg = Message::new("/foo/bar")
            .with_item(1)
            .with_item(2.5f32)
            .with_item("hi");

        let mut buf = BytesMut::new();
        let written = msg.encode(&mut buf).unwrap();

        assert_eq!(written, 32);
        assert_eq!(buf.as_ref(), scenario_a_wire().as_slice());
        assert_eq!(msg.encoded_len(), 32);
    }

    #[test]
    fn decodes_typed_items() {
        let msg = decode_message(&scenario_a_wire()).unwrap();

        assert_eq!(msg.address(), "/foo/bar");
        assert_eq!(
            msg.items(),
            &[
                DataItem::Int32(1),
                DataItem::Float32(2.5),
                DataItem::String("hi".to_string())
            ]
        );
        assert_eq!(msg.type_tags(), ",ifs");
    }

    #[test]
    fn string_padding_is_zeroed_and_aligned() {
        for (text, expected) in [("", 4), ("abc", 4), ("abcd", 8), ("abcdefg", 8)] {
            assert_eq!(padded_str_len(text.len()), expected, "{text:?}");
        }

        let mut buf = BytesMut::new();
        encode_message("/ab", &[DataItem::from("xyzw")], &mut buf).unwrap();
        assert_eq!(buf.len() % 4, 0);
        assert_eq!(&buf[..4], b"/ab\0");
        assert_eq!(&buf[8..16], b"xyzw\0\0\0\0");
    }

    #[test]
    fn blob_has_length_prefix_and_padding() {
        let mut buf = BytesMut::new();
        encode_message("/b", &[DataItem::from(vec![1u8, 2, 3, 4, 5])], &mut buf).unwrap();

        assert_eq!(&buf[..4], b"/b\0\0");
        assert_eq!(&buf[4..8], b",b\0\0");
        assert_eq!(&buf[8..12], &[0, 0, 0, 5]);
        assert_eq!(&buf[12..20], &[1, 2, 3, 4, 5, 0, 0, 0]);

        let msg = decode_message(&buf).unwrap();
        assert_eq!(msg.item_as_blob(0), Some(&[1u8, 2, 3, 4, 5][..]));
    }

    #[test]
    fn mixed_message_roundtrip() {
        let original = Message::new("/servo/3/position")
            .with_item(-42)
            .with_item(f32::MIN_POSITIVE)
            .with_item("needs padding")
            .with_item(Bytes::from_static(b"\x00\xff\x10"))
            .with_item("");

        let mut buf = BytesMut::new();
        original.encode(&mut buf).unwrap();
        let decoded = decode_message(&buf).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn no_items_still_carries_type_tag() {
        let mut buf = BytesMut::new();
        encode_message("/appled/0/state", &[], &mut buf).unwrap();
        assert_eq!(&buf[16..20], b",\0\0\0");

        let msg = decode_message(&buf).unwrap();
        assert!(msg.items().is_empty());
    }

    #[test]
    fn unknown_type_tag_truncates_without_error() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"/x\0\0");
        wire.extend_from_slice(b",ixi\0\0\0\0");
        wire.extend_from_slice(&[0, 0, 0, 7]);
        wire.extend_from_slice(&[0, 0, 0, 9]);

        let msg = decode_message(&wire).unwrap();
        assert_eq!(msg.items(), &[DataItem::Int32(7)]);
    }

    #[test]
    fn items_are_capped() {
        let items: Vec<DataItem> = (0..25).map(DataItem::Int32).collect();
        let mut buf = BytesMut::new();
        encode_message("/many", &items, &mut buf).unwrap();

        let msg = decode_message(&buf).unwrap();
        assert_eq!(msg.items().len(), MAX_DATA_ITEMS);
        assert_eq!(msg.item_as_int(19), Some(19));

        let mut small = Message::default();
        decode_message_into(&buf, &mut small, 3).unwrap();
        assert_eq!(small.items().len(), 3);
    }

    #[test]
    fn missing_type_tag_fails() {
        let err = decode_message(b"/foo\0\0\0\0").unwrap_err();
        assert_eq!(err, WireError::MissingTypeTag);

        let err = decode_message(b"/foo\0\0\0\0ifs\0").unwrap_err();
        assert_eq!(err, WireError::MissingTypeTag);
    }

    #[test]
    fn missing_leading_slash_fails() {
        let err = decode_message(b"foo\0,\0\0\0").unwrap_err();
        assert_eq!(err, WireError::MissingAddressSlash);
    }

    #[test]
    fn short_fields_fail_whole_decode() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"/x\0\0");
        wire.extend_from_slice(b",ii\0");
        wire.extend_from_slice(&[0, 0, 0, 1]);
        wire.extend_from_slice(&[0, 0]);

        let mut msg = Message::new("/stale").with_item(5);
        let err = decode_message_into(&wire, &mut msg, MAX_DATA_ITEMS).unwrap_err();
        assert!(matches!(err, WireError::Truncated { field: "int32", .. }));
        assert!(msg.is_empty());
    }

    #[test]
    fn unterminated_string_fails() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"/x\0\0");
        wire.extend_from_slice(b",s\0\0");
        wire.extend_from_slice(b"abcd");

        let err = decode_message(&wire).unwrap_err();
        assert!(matches!(err, WireError::UnterminatedString { offset: 8 }));
    }

    #[test]
    fn oversized_blob_length_is_truncation() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"/x\0\0");
        wire.extend_from_slice(b",b\0\0");
        wire.extend_from_slice(&[0xff, 0xff, 0xff, 0xf0]);

        let err = decode_message(&wire).unwrap_err();
        assert!(matches!(err, WireError::Truncated { field: "blob", .. }));
    }

    #[test]
    fn bounded_encode_leaves_buffer_untouched_on_overflow() {
        let mut buf = BytesMut::from(&b"keep"[..]);
        let err = encode_message_bounded("/long/address", &[DataItem::Int32(1)], &mut buf, 16)
            .unwrap_err();

        assert_eq!(
            err,
            WireError::Overflow {
                needed: 24,
                remaining: 12
            }
        );
        assert_eq!(buf.as_ref(), b"keep");
    }

    #[test]
    fn rejects_unencodable_input() {
        let mut buf = BytesMut::new();
        assert_eq!(
            encode_message("no-slash", &[], &mut buf),
            Err(WireError::MissingAddressSlash)
        );
        assert_eq!(
            encode_message("/a", &[DataItem::from("nul\0inside")], &mut buf),
            Err(WireError::InteriorNul)
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn peeks_address_without_type_tag() {
        assert_eq!(packet_address(b"/\0\0\0").unwrap(), "/");
        assert_eq!(packet_address(b"/appled/\0\0\0\0").unwrap(), "/appled/");
        assert_eq!(
            packet_address(b"#bundle\0"),
            Err(WireError::MissingAddressSlash)
        );
        assert!(matches!(
            packet_address(b"/open"),
            Err(WireError::UnterminatedString { offset: 0 })
        ));
    }

    #[test]
    fn numeric_item_coercion() {
        let msg = Message::new("/m").with_item(3.9f32).with_item(7).with_item("s");
        assert_eq!(msg.item_as_int(0), Some(3));
        assert_eq!(msg.item_as_float(1), Some(7.0));
        assert_eq!(msg.item_as_int(2), None);
        assert_eq!(msg.item_as_str(2), Some("s"));
        assert_eq!(msg.item_as_int(9), None);
    }

    #[test]
    fn address_element_accessors() {
        let msg = Message::new("/appled/2/state");
        assert_eq!(msg.address_element(0), Some("appled"));
        assert_eq!(msg.address_element_as_int(1), Some(2));
        assert_eq!(msg.address_element_as_float(1), Some(2.0));
        assert_eq!(msg.address_element(2), Some("state"));
        assert_eq!(msg.address_element(3), None);
        assert_eq!(msg.element_count(), 3);
    }
}
