//! OSC wire format and addressing.
//!
//! Everything here is pure and allocation-light:
//! - [`codec`] encodes and decodes messages (address, type tag, typed items)
//! - [`bundle`] writes and walks `#bundle` containers
//! - [`pattern`] matches OSC address patterns against handler names
//! - [`range`] expands an address element into subsystem indices
//!
//! All multi-byte values are big-endian and every string or blob is
//! zero-padded to a 4-byte boundary.

pub mod address;
pub mod bundle;
pub mod codec;
pub mod error;
pub mod pattern;
pub mod range;

pub use bundle::{
    classify, write_bundle_element, write_bundle_header, BundleElements, PacketKind, Timetag,
    BUNDLE_HEADER_LEN, BUNDLE_TAG, SINGLE_MESSAGE_PREAMBLE,
};
pub use codec::{
    decode_message, decode_message_into, encode_message, encode_message_bounded, encoded_len,
    packet_address, DataItem, Message, MAX_DATA_ITEMS,
};
pub use error::{Result, WireError};
pub use pattern::pattern_match;
pub use range::RangeHelper;
