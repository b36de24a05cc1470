/// Errors that can occur while encoding or decoding OSC packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The packet carries no bytes at all.
    #[error("empty packet")]
    EmptyPacket,

    /// The first byte is neither `/` (message) nor `#` (bundle).
    #[error("not an OSC packet (first byte 0x{0:02x})")]
    UnknownPacket(u8),

    /// A `#bundle` packet shorter than its 16-byte header.
    #[error("bundle header truncated ({0} bytes, need 16)")]
    ShortBundle(usize),

    /// An address that does not begin with `/`.
    #[error("address must start with '/'")]
    MissingAddressSlash,

    /// No `,`-prefixed type tag follows the address.
    #[error("type tag must start with ','")]
    MissingTypeTag,

    /// A string with no NUL terminator before the end of the packet.
    #[error("unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },

    /// Not enough bytes remain for the next field.
    #[error("truncated {field}: need {needed} bytes, have {remaining}")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// A string to encode contains a NUL byte.
    #[error("string contains an interior NUL byte")]
    InteriorNul,

    /// A blob longer than the 32-bit length prefix can express.
    #[error("blob too large ({0} bytes)")]
    BlobTooLarge(usize),

    /// The encoded form does not fit in the remaining output capacity.
    #[error("output buffer overflow: need {needed} bytes, have {remaining}")]
    Overflow { needed: usize, remaining: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
