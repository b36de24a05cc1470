use std::net::SocketAddr;
use std::sync::Arc;

use osclink_wire::{
    address, classify, decode_message_into, packet_address, BundleElements, DataItem, Message,
    PacketKind,
};
use tracing::{debug, trace, warn};

use crate::channel::Channel;
use crate::config::EngineConfig;
use crate::error::{OscError, Result};
use crate::handler::HandlerRegistry;

/// Routes incoming packets to registered handlers.
///
/// One dispatcher serves every channel. The registry is frozen once the
/// dispatcher is built, so lookups take no lock.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    max_data_items: usize,
    max_bundle_depth: usize,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self::with_config(registry, &EngineConfig::default())
    }

    pub fn with_config(registry: HandlerRegistry, config: &EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            max_data_items: config.max_data_items,
            max_bundle_depth: config.max_bundle_depth,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Process one transport packet and flush whatever replies it produced.
    ///
    /// The channel is flushed even when processing fails part-way. The
    /// processing error, if any, is returned after the flush.
    pub fn receive_packet(
        &self,
        channel: &Channel,
        packet: &[u8],
        source: Option<SocketAddr>,
    ) -> Result<()> {
        channel.set_reply_to(source);

        let outcome = self.process(channel, packet, source, 0);
        if let Err(err) = &outcome {
            debug!(transport = %channel.kind(), len = packet.len(), error = %err, "packet not fully handled");
        }

        let flushed = channel.send();
        outcome?;
        flushed.map(|_| ())
    }

    fn process(
        &self,
        channel: &Channel,
        packet: &[u8],
        source: Option<SocketAddr>,
        depth: usize,
    ) -> Result<()> {
        match classify(packet)? {
            PacketKind::Message => self.receive_message(channel, packet, source),
            PacketKind::Bundle => self.receive_bundle(channel, packet, source, depth),
        }
    }

    fn receive_bundle(
        &self,
        channel: &Channel,
        packet: &[u8],
        source: Option<SocketAddr>,
        depth: usize,
    ) -> Result<()> {
        if depth >= self.max_bundle_depth {
            return Err(OscError::BadFormat(format!(
                "bundle nested deeper than {}",
                self.max_bundle_depth
            )));
        }

        let mut elements = BundleElements::new(packet)?;
        for element in elements.by_ref() {
            if let Err(err) = self.process(channel, element, source, depth + 1) {
                debug!(transport = %channel.kind(), len = element.len(), error = %err, "bundle element dropped");
            }
        }

        if elements.is_truncated() {
            return Err(OscError::BadFormat(
                "bundle element overruns packet".to_string(),
            ));
        }
        Ok(())
    }

    /// Route one message packet.
    ///
    /// `/` lists every handler; an address ending in `/` is a query; anything
    /// else is decoded into the channel's scratch message and handed to every
    /// handler whose name matches the first address element.
    pub fn receive_message(
        &self,
        channel: &Channel,
        packet: &[u8],
        source: Option<SocketAddr>,
    ) -> Result<()> {
        let address = packet_address(packet)?;

        if address::is_root_query(&address) {
            self.root_query(channel)?;
            return Ok(());
        }
        if address::is_query(&address) {
            self.handle_query(channel, &address)?;
            return Ok(());
        }

        let mut msg = channel.incoming();
        let outcome = match decode_message_into(packet, &mut msg, self.max_data_items) {
            Ok(()) => self.dispatch(channel, &msg, source).map(|_| ()),
            Err(err) => Err(err.into()),
        };
        msg.reset();
        outcome
    }

    /// Hand a decoded message to every matching handler.
    pub fn dispatch(
        &self,
        channel: &Channel,
        msg: &Message,
        source: Option<SocketAddr>,
    ) -> Result<usize> {
        let pattern = msg.address_element(0).unwrap_or_default();
        trace!(transport = %channel.kind(), address = %msg.address(), items = msg.items().len(), "dispatching");

        let mut matched = 0;
        let mut replies = 0;
        for handler in self.registry.matching(pattern) {
            matched += 1;
            let before = channel.queued_total();
            match handler.on_message(channel, msg, source) {
                Ok(count) => replies += count,
                Err(err) => {
                    replies += channel.queued_total().saturating_sub(before);
                    self.surface(channel, handler.name(), &err);
                }
            }
        }

        if matched == 0 {
            debug!(address = %msg.address(), "no handler matched");
            channel.error(&format!("No Subsystem Match - {pattern}"))?;
            return Err(OscError::UnknownProperty);
        }
        Ok(replies)
    }

    /// Ask every handler matching the first element of `address` to enumerate.
    pub fn handle_query(&self, channel: &Channel, address: &str) -> Result<usize> {
        let element = address::element_count(address);
        let pattern = address::element(address, 0).unwrap_or_default();

        let mut replies = 0;
        for handler in self.registry.matching(pattern) {
            let before = channel.queued_total();
            match handler.on_query(channel, address, element) {
                Ok(count) => replies += count,
                Err(err) => {
                    // Replies queued before the failure still go out.
                    replies += channel.queued_total().saturating_sub(before);
                    self.surface(channel, handler.name(), &err);
                }
            }
        }

        if replies == 0 {
            debug!(address, "query not answered");
            channel.error(&format!("Unknown Property - {address}"))?;
            return Err(OscError::UnknownProperty);
        }

        channel.send()?;
        Ok(replies)
    }

    /// Reply at `/` with the name of every handler, in registration order.
    ///
    /// Long listings are split across as many packets as the buffer needs.
    pub fn root_query(&self, channel: &Channel) -> Result<usize> {
        let mut replies = 0;
        for name in self.registry.names() {
            channel
                .create_message_or_flush(address::ROOT, &[DataItem::String(name.to_string())])?;
            replies += 1;
        }
        channel.send()?;
        Ok(replies)
    }

    /// Turn a handler failure into an error reply, or log it when it has no
    /// client-facing text.
    fn surface(&self, channel: &Channel, handler: &str, err: &OscError) {
        match err.reply_text() {
            Some(text) => {
                debug!(handler, error = %err, "handler reported error");
                if let Err(queue_err) = channel.subsystem_error(handler, &text) {
                    warn!(handler, error = %queue_err, "could not queue error reply");
                }
            }
            None => warn!(handler, error = %err, "handler failed"),
        }
    }
}
