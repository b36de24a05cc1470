//! OSC packet routing.
//!
//! This is the engine layer. Packets from a transport go through the
//! [`Dispatcher`], which unwraps bundles, answers queries, and hands each
//! message to every [`Handler`] whose name matches its first address
//! element. Replies accumulate in the transport's [`Channel`] and are
//! flushed as one packet per received packet.
//!
//! [`OscEngine`] wires handlers, transports, receive threads, and autosend
//! together from an [`EngineConfig`].

pub mod autosend;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handler;
pub mod listener;
pub mod property;

#[cfg(test)]
mod test_support;

pub use autosend::{poll_handlers, AutoSender};
pub use channel::Channel;
pub use config::{AutosendTransport, EngineConfig};
pub use dispatcher::Dispatcher;
pub use engine::{EngineHandle, OscEngine, OscEngineBuilder};
pub use error::{OscError, Result};
pub use handler::{property_lookup, Handler, HandlerRegistry};
pub use listener::{run_receive_loop, spawn_receive_loop};
pub use property::{
    BlobProperties, BlobPropertyHandler, IndexedIntHandler, IndexedIntProperties,
    IntPropertyHandler, IntProperties,
};

#[cfg(feature = "async")]
pub use listener::run_udp_async;
