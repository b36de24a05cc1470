//! OSC protocol engine for embedded-style devices.
//!
//! osclink speaks Open Sound Control over UDP and over SLIP-framed serial
//! links: it decodes packets, unwraps bundles, matches address patterns
//! against registered handlers, and batches replies into bundles.
//!
//! # Crate Structure
//!
//! - [`transport`]: packet sources and sinks (UDP, SLIP serial)
//! - [`wire`]: message codec, bundles, pattern matching, range expansion
//! - [`router`]: channels, handlers, dispatcher, and the engine (behind `router` feature)

/// Re-export transport types.
pub mod transport {
    pub use osclink_transport::*;
}

/// Re-export wire format types.
pub mod wire {
    pub use osclink_wire::*;
}

/// Re-export router types (requires `router` feature).
#[cfg(feature = "router")]
pub mod router {
    pub use osclink_router::*;
}
