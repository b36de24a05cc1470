use std::net::SocketAddr;
use std::sync::Arc;

use osclink_wire::{pattern_match, Message};

use crate::channel::Channel;
use crate::error::{OscError, Result};

/// A named recipient of dispatched messages and enumeration queries.
///
/// Handlers queue replies with [`Channel::create_message`]; the dispatcher
/// flushes the channel once the packet has been processed. Every callback
/// returns the number of replies it queued.
pub trait Handler: Send + Sync {
    /// Name matched against the first address element.
    fn name(&self) -> &str;

    /// Handle a message whose first address element matched [`Handler::name`].
    fn on_message(
        &self,
        channel: &Channel,
        msg: &Message,
        source: Option<SocketAddr>,
    ) -> Result<usize>;

    /// Enumerate what lives below `address`; `element` is the number of
    /// address elements in the query.
    fn on_query(&self, channel: &Channel, address: &str, element: usize) -> Result<usize>;

    /// Push unsolicited data; called on every autosend tick.
    fn auto_send(&self, _channel: &Channel) -> Result<usize> {
        Ok(0)
    }
}

/// Ordered set of handlers, filled once before dispatch starts.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn Handler>>,
    max: usize,
}

impl HandlerRegistry {
    pub fn new(max: usize) -> Self {
        Self {
            handlers: Vec::new(),
            max,
        }
    }

    /// Append a handler; registration order is dispatch order.
    pub fn register(&mut self, handler: Arc<dyn Handler>) -> Result<()> {
        validate_name(handler.name())?;
        if self.handlers.len() >= self.max {
            return Err(OscError::RegistryFull(self.max));
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Handler>> {
        self.handlers.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|handler| handler.name())
    }

    /// Handlers whose name is matched by `pattern`, in registration order.
    pub fn matching<'a>(
        &'a self,
        pattern: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn Handler>> {
        self.handlers
            .iter()
            .filter(move |handler| pattern_match(pattern, handler.name()))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::default().max_handlers)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .field("max", &self.max)
            .finish()
    }
}

/// Position of `name` in a property list.
pub fn property_lookup(properties: &[&str], name: &str) -> Option<usize> {
    properties.iter().position(|property| *property == name)
}

fn validate_name(name: &str) -> Result<()> {
    let addressable = !name.is_empty()
        && !name
            .chars()
            .any(|c| c == '/' || c.is_whitespace() || "*?[]{},\\".contains(c));
    if addressable {
        Ok(())
    } else {
        Err(OscError::InvalidHandlerName(name.to_string()))
    }
}
