#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use osclink_router::{Channel, Handler, Result};
use osclink_transport::{PacketSink, TransportKind};
use osclink_wire::{decode_message, encode_message, BundleElements, DataItem, Message};
use parking_lot::Mutex;

/// Sink that keeps every packet a channel flushes.
#[derive(Clone, Default)]
pub struct CaptureSink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CaptureSink {
    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Every message flushed so far, bundles flattened.
    pub fn messages(&self) -> Vec<Message> {
        let mut out = Vec::new();
        for packet in self.packets() {
            match BundleElements::new(&packet) {
                Ok(elements) => out.extend(
                    elements.map(|element| decode_message(element).expect("element should decode")),
                ),
                Err(_) => out.push(decode_message(&packet).expect("packet should decode")),
            }
        }
        out
    }
}

impl PacketSink for CaptureSink {
    fn send_packet(
        &self,
        packet: &[u8],
        _dest: Option<SocketAddr>,
    ) -> osclink_transport::Result<()> {
        self.sent.lock().push(packet.to_vec());
        Ok(())
    }
}

pub fn udp_channel() -> (Channel, CaptureSink) {
    let sink = CaptureSink::default();
    (Channel::new(TransportKind::Udp, sink.clone()), sink)
}

pub fn encoded(address: &str, items: &[DataItem]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_message(address, items, &mut buf).expect("encode should succeed");
    buf.to_vec()
}

/// Handler that keeps every message it receives.
pub struct Recorder {
    name: &'static str,
    seen: Mutex<Vec<Message>>,
}

impl Recorder {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Message> {
        self.seen.lock().clone()
    }
}

impl Handler for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn on_message(
        &self,
        _channel: &Channel,
        msg: &Message,
        _source: Option<SocketAddr>,
    ) -> Result<usize> {
        self.seen.lock().push(msg.clone());
        Ok(0)
    }

    fn on_query(&self, _channel: &Channel, _address: &str, _element: usize) -> Result<usize> {
        Ok(0)
    }
}
