use std::net::SocketAddr;

/// Errors that can occur in packet transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the local endpoint.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to open a serial device or stream.
    #[error("failed to open {device}: {source}")]
    Open {
        device: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No packet arrived within the configured read timeout.
    #[error("read timed out")]
    TimedOut,

    /// The peer closed the link (EOF or zero-length write).
    #[error("connection closed")]
    ConnectionClosed,

    /// A packet was sent without an explicit or default destination.
    #[error("no destination for outgoing packet")]
    NoDestination,

    /// A received frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

impl TransportError {
    /// Maps an I/O error from a read, folding timeouts into [`TransportError::TimedOut`].
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
