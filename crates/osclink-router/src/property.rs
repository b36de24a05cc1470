//! Generic handlers for subsystems made of named properties.
//!
//! Most subsystems expose a handful of named integers, either once
//! (`/name/property`) or per instance (`/name/<index>/property`). Implement
//! [`IntProperties`] or [`IndexedIntProperties`] and wrap it in the matching
//! handler to get reads, writes, and queries with the standard addressing.
//! [`BlobProperties`] does the same for opaque byte values.

use std::net::SocketAddr;

use bytes::Bytes;
use osclink_wire::{DataItem, Message, RangeHelper};

use crate::channel::Channel;
use crate::error::{OscError, Result};
use crate::handler::{property_lookup, Handler};

/// A subsystem with a single set of integer properties.
pub trait IntProperties: Send + Sync {
    /// Property names, in the order queries list them.
    fn properties(&self) -> &[&str];

    fn get(&self, property: usize) -> Result<i32>;

    fn set(&self, property: usize, value: i32) -> Result<()>;
}

/// A subsystem with `index_count()` instances sharing one property set.
pub trait IndexedIntProperties: Send + Sync {
    fn properties(&self) -> &[&str];

    /// Instances are numbered `0..index_count()`.
    fn index_count(&self) -> i32;

    fn get(&self, index: i32, property: usize) -> Result<i32>;

    fn set(&self, index: i32, property: usize, value: i32) -> Result<()>;
}

/// A subsystem whose properties are opaque byte strings, such as names or
/// calibration tables.
pub trait BlobProperties: Send + Sync {
    fn properties(&self) -> &[&str];

    fn get(&self, property: usize) -> Result<Bytes>;

    fn set(&self, property: usize, value: &[u8]) -> Result<()>;
}

/// What a message asks of a property.
enum Access {
    Read,
    Write(i32),
}

fn access(msg: &Message) -> Result<Access> {
    match msg.item(0) {
        None => Ok(Access::Read),
        Some(DataItem::Int32(_) | DataItem::Float32(_)) => msg
            .item_as_int(0)
            .map(Access::Write)
            .ok_or(OscError::IncorrectDataType),
        Some(_) => Err(OscError::IncorrectDataType),
    }
}

fn list(
    channel: &Channel,
    address: &str,
    entries: impl IntoIterator<Item = String>,
) -> Result<usize> {
    let mut replies = 0;
    for entry in entries {
        channel.create_message_or_flush(address, &[DataItem::String(entry)])?;
        replies += 1;
    }
    Ok(replies)
}

/// Handler for `/name/property [value]`.
pub struct IntPropertyHandler<P> {
    name: String,
    props: P,
}

impl<P: IntProperties> IntPropertyHandler<P> {
    pub fn new(name: impl Into<String>, props: P) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }

    pub fn properties(&self) -> &P {
        &self.props
    }
}

impl<P: IntProperties> Handler for IntPropertyHandler<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(&self, channel: &Channel, msg: &Message, _: Option<SocketAddr>) -> Result<usize> {
        let property = msg.address_element(1).ok_or(OscError::UnknownProperty)?;
        let slot =
            property_lookup(self.props.properties(), property).ok_or(OscError::UnknownProperty)?;

        match access(msg)? {
            Access::Write(value) => {
                self.props.set(slot, value)?;
                Ok(0)
            }
            Access::Read => {
                let value = self.props.get(slot)?;
                channel.create_message_or_flush(
                    &format!("/{}/{}", self.name, property),
                    &[DataItem::Int32(value)],
                )?;
                Ok(1)
            }
        }
    }

    fn on_query(&self, channel: &Channel, address: &str, element: usize) -> Result<usize> {
        match element {
            1 => list(
                channel,
                address,
                self.props.properties().iter().map(|p| p.to_string()),
            ),
            _ => Ok(0),
        }
    }
}

/// Handler for `/name/<index>/property [value]`, where `<index>` may be a
/// range expression such as `*`, `[0-3]` or `{1,5}`.
pub struct IndexedIntHandler<P> {
    name: String,
    props: P,
}

impl<P: IndexedIntProperties> IndexedIntHandler<P> {
    pub fn new(name: impl Into<String>, props: P) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }

    pub fn properties(&self) -> &P {
        &self.props
    }
}

impl<P: IndexedIntProperties> Handler for IndexedIntHandler<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(&self, channel: &Channel, msg: &Message, _: Option<SocketAddr>) -> Result<usize> {
        let range = RangeHelper::new(msg.address(), 1, 0, self.props.index_count());
        if !range.has_next() {
            return Err(OscError::IllegalIndex);
        }

        let property = msg.address_element(2).ok_or(OscError::UnknownProperty)?;
        let slot =
            property_lookup(self.props.properties(), property).ok_or(OscError::UnknownProperty)?;

        let mut replies = 0;
        match access(msg)? {
            Access::Write(value) => {
                for index in range {
                    self.props.set(index, slot, value)?;
                }
            }
            Access::Read => {
                for index in range {
                    let value = self.props.get(index, slot)?;
                    channel.create_message_or_flush(
                        &format!("/{}/{}/{}", self.name, index, property),
                        &[DataItem::Int32(value)],
                    )?;
                    replies += 1;
                }
            }
        }
        Ok(replies)
    }

    fn on_query(&self, channel: &Channel, address: &str, element: usize) -> Result<usize> {
        match element {
            1 => list(
                channel,
                address,
                (0..self.props.index_count()).map(|index| index.to_string()),
            ),
            2 => list(
                channel,
                address,
                self.props.properties().iter().map(|p| p.to_string()),
            ),
            _ => Ok(0),
        }
    }
}

/// Handler for `/name/property [blob]`.
///
/// A blob or string argument writes the property; no argument reads it back
/// as a blob.
pub struct BlobPropertyHandler<P> {
    name: String,
    props: P,
}

impl<P: BlobProperties> BlobPropertyHandler<P> {
    pub fn new(name: impl Into<String>, props: P) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }

    pub fn properties(&self) -> &P {
        &self.props
    }
}

impl<P: BlobProperties> Handler for BlobPropertyHandler<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(&self, channel: &Channel, msg: &Message, _: Option<SocketAddr>) -> Result<usize> {
        let property = msg.address_element(1).ok_or(OscError::UnknownProperty)?;
        let slot =
            property_lookup(self.props.properties(), property).ok_or(OscError::UnknownProperty)?;

        match msg.item(0) {
            None => {
                let value = self.props.get(slot)?;
                channel.create_message_or_flush(
                    &format!("/{}/{}", self.name, property),
                    &[DataItem::Blob(value)],
                )?;
                Ok(1)
            }
            Some(DataItem::Blob(value)) => {
                self.props.set(slot, value)?;
                Ok(0)
            }
            Some(DataItem::String(value)) => {
                self.props.set(slot, value.as_bytes())?;
                Ok(0)
            }
            Some(_) => Err(OscError::IncorrectDataType),
        }
    }

    fn on_query(&self, channel: &Channel, address: &str, element: usize) -> Result<usize> {
        match element {
            1 => list(
                channel,
                address,
                self.props.properties().iter().map(|p| p.to_string()),
            ),
            _ => Ok(0),
        }
    }
}
