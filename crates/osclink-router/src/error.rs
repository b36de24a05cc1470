use osclink_transport::{TransportError, TransportKind};
use osclink_wire::WireError;

/// Errors that can occur while routing OSC packets.
#[derive(Debug, thiserror::Error)]
pub enum OscError {
    /// Malformed framing: a truncated or over-nested bundle.
    #[error("bad format: {0}")]
    BadFormat(String),

    /// A message that could not be decoded.
    #[error("bad data: {0}")]
    BadData(WireError),

    /// No handler or property answered the address.
    #[error("unknown property")]
    UnknownProperty,

    /// An index element that selects no subsystem instance.
    #[error("illegal index")]
    IllegalIndex,

    /// A data item of the wrong type for the addressed property.
    #[error("incorrect data type")]
    IncorrectDataType,

    /// The channel's outgoing buffer could not be locked in time.
    #[error("could not lock channel buffer")]
    CantLock,

    /// The encoded message does not fit in the channel's outgoing buffer.
    #[error("insufficient resources: need {needed} bytes, have {remaining}")]
    InsufficientResources { needed: usize, remaining: usize },

    /// A handler-reported failure with free-text detail.
    #[error("{subsystem}: {message}")]
    Subsystem { subsystem: String, message: String },

    /// The handler registry is at capacity.
    #[error("handler registry full ({0} handlers)")]
    RegistryFull(usize),

    /// A handler name that cannot be addressed.
    #[error("invalid handler name '{0}'")]
    InvalidHandlerName(String),

    /// A feature was configured for a transport that is not enabled.
    #[error("{0} transport is not enabled")]
    TransportDisabled(TransportKind),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// Reading a configuration file failed.
    #[error("failed to read config {path}: {source}")]
    Config {
        path: String,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<WireError> for OscError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Overflow { needed, remaining } => {
                OscError::InsufficientResources { needed, remaining }
            }
            other => OscError::BadData(other),
        }
    }
}

impl OscError {
    /// Build a handler-reported error.
    pub fn subsystem(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        OscError::Subsystem {
            subsystem: subsystem.into(),
            message: message.into(),
        }
    }

    /// Text sent back to the client for protocol mistakes.
    ///
    /// Resource, transport and setup errors have none; they are only logged.
    pub fn reply_text(&self) -> Option<String> {
        let text = match self {
            OscError::UnknownProperty => "Unknown Property",
            OscError::IllegalIndex => "Bad Index",
            OscError::IncorrectDataType => "Incorrect Data Type",
            OscError::BadFormat(_) => "Bad Format",
            OscError::BadData(_) => "Bad Data",
            OscError::Subsystem { message, .. } => return Some(message.clone()),
            _ => return None,
        };
        Some(text.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OscError>;
