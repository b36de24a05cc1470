use std::net::SocketAddr;
use std::sync::Arc;

use osclink_transport::{PacketSink, TransportError};
use osclink_wire::{DataItem, Message};
use parking_lot::Mutex;

use crate::channel::Channel;
use crate::error::{OscError, Result};
use crate::handler::Handler;

type Sent = Vec<(Vec<u8>, Option<SocketAddr>)>;

/// Records every flushed packet, or fails every write.
#[derive(Clone, Default)]
pub(crate) struct MemorySink {
    sent: Arc<Mutex<Sent>>,
    fail: bool,
}

impl MemorySink {
    pub(crate) fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub(crate) fn packets(&self) -> Sent {
        self.sent.lock().clone()
    }
}

impl PacketSink for MemorySink {
    fn send_packet(
        &self,
        packet: &[u8],
        dest: Option<SocketAddr>,
    ) -> osclink_transport::Result<()> {
        if self.fail {
            return Err(TransportError::ConnectionClosed);
        }
        self.sent.lock().push((packet.to_vec(), dest));
        Ok(())
    }
}

/// Handler that records what it was given.
pub(crate) struct RecordingHandler {
    name: &'static str,
    messages: Mutex<Vec<Message>>,
    queries: Mutex<Vec<(String, usize)>>,
    query_replies: usize,
    error: Mutex<Option<OscError>>,
}

impl RecordingHandler {
    pub(crate) fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self::build(name, 0, None))
    }

    /// Queues `replies` messages at the query address for every query.
    pub(crate) fn answering(name: &'static str, replies: usize) -> Arc<Self> {
        Arc::new(Self::build(name, replies, None))
    }

    /// Fails the first message it sees with `err`.
    pub(crate) fn failing(name: &'static str, err: OscError) -> Arc<Self> {
        Arc::new(Self::build(name, 0, Some(err)))
    }

    /// Queues `replies` messages for a query, then fails it with `err`.
    pub(crate) fn answering_then_failing(
        name: &'static str,
        replies: usize,
        err: OscError,
    ) -> Arc<Self> {
        Arc::new(Self::build(name, replies, Some(err)))
    }

    fn build(name: &'static str, query_replies: usize, error: Option<OscError>) -> Self {
        Self {
            name,
            messages: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            query_replies,
            error: Mutex::new(error),
        }
    }

    pub(crate) fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub(crate) fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().clone()
    }
}

impl Handler for RecordingHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn on_message(
        &self,
        _channel: &Channel,
        msg: &Message,
        _source: Option<SocketAddr>,
    ) -> Result<usize> {
        self.messages.lock().push(msg.clone());
        match self.error.lock().take() {
            Some(err) => Err(err),
            None => Ok(0),
        }
    }

    fn on_query(&self, channel: &Channel, address: &str, element: usize) -> Result<usize> {
        self.queries.lock().push((address.to_string(), element));
        for i in 0..self.query_replies {
            channel.create_message(address, &[DataItem::Int32(i as i32)])?;
        }
        if let Some(err) = self.error.lock().take() {
            return Err(err);
        }
        Ok(self.query_replies)
    }
}
