use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use osclink_transport::{PacketSink, TransportKind};
use osclink_wire::{
    encode_message_bounded, write_bundle_header, DataItem, Message, Timetag,
    SINGLE_MESSAGE_PREAMBLE,
};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{OscError, Result};

/// Outgoing accumulation state, guarded by the channel lock.
#[derive(Debug)]
struct OutBuffer {
    buf: BytesMut,
    pending: usize,
    capacity: usize,
}

impl OutBuffer {
    fn reset(&mut self) {
        self.buf.clear();
        self.pending = 0;
    }
}

/// One transport endpoint and its outgoing buffer.
///
/// Replies queued with [`Channel::create_message`] accumulate behind a single
/// bundle header until [`Channel::send`] flushes them as one packet. Every
/// producer (dispatcher, handlers, autosend) goes through the same lock, so
/// concurrent calls never interleave bytes.
pub struct Channel {
    kind: TransportKind,
    sink: Box<dyn PacketSink>,
    out: Mutex<OutBuffer>,
    lock_timeout: Option<Duration>,
    reply_to: Mutex<Option<SocketAddr>>,
    reply_port: Option<u16>,
    incoming: Mutex<Message>,
    queued: AtomicUsize,
}

impl Channel {
    /// A channel with a 512-byte outgoing buffer and a blocking lock.
    pub fn new(kind: TransportKind, sink: impl PacketSink + 'static) -> Self {
        Self {
            kind,
            sink: Box::new(sink),
            out: Mutex::new(OutBuffer {
                buf: BytesMut::with_capacity(512),
                pending: 0,
                capacity: 512,
            }),
            lock_timeout: None,
            reply_to: Mutex::new(None),
            reply_port: None,
            incoming: Mutex::new(Message::default()),
            queued: AtomicUsize::new(0),
        }
    }

    /// A channel sized and timed from the engine config.
    pub fn from_config(
        kind: TransportKind,
        sink: impl PacketSink + 'static,
        config: &EngineConfig,
    ) -> Self {
        let mut channel = Self::new(kind, sink).with_capacity(config.max_message_out);
        channel.lock_timeout = config.lock_timeout();
        if kind == TransportKind::Udp {
            channel.reply_port = config.udp_reply_port;
        }
        channel
    }

    /// Override the outgoing buffer capacity in bytes.
    pub fn with_capacity(self, capacity: usize) -> Self {
        {
            let mut out = self.out.lock();
            out.capacity = capacity;
            out.buf = BytesMut::with_capacity(capacity);
        }
        self
    }

    /// Fail with [`OscError::CantLock`] instead of blocking past `timeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Send replies to this port instead of the requester's.
    pub fn with_reply_port(mut self, port: u16) -> Self {
        self.reply_port = Some(port);
        self
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.out.lock().capacity
    }

    /// Route subsequent flushes to the sender of the packet being handled.
    ///
    /// A `None` source (point-to-point links) keeps the previous route.
    pub fn set_reply_to(&self, source: Option<SocketAddr>) {
        if let Some(mut addr) = source {
            if let Some(port) = self.reply_port {
                addr.set_port(port);
            }
            *self.reply_to.lock() = Some(addr);
        }
    }

    pub fn reply_to(&self) -> Option<SocketAddr> {
        *self.reply_to.lock()
    }

    /// Queue one message in the outgoing buffer.
    ///
    /// The first message after a reset is preceded by the bundle header.
    /// Each message gets a 4-byte length prefix that is back-filled once the
    /// encoded size is known. On failure the buffer is left exactly as it was.
    pub fn create_message(&self, address: &str, items: &[DataItem]) -> Result<()> {
        let mut out = self.lock_out()?;
        let out = &mut *out;
        let mark = out.buf.len();

        if out.pending == 0 {
            out.buf.clear();
            write_bundle_header(&mut out.buf, Timetag::default());
        }

        let prefix_at = out.buf.len();
        out.buf.put_u32(0);

        match encode_message_bounded(address, items, &mut out.buf, out.capacity) {
            Ok(len) => {
                out.buf[prefix_at..prefix_at + 4].copy_from_slice(&(len as u32).to_be_bytes());
                out.pending += 1;
                self.queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                out.buf.truncate(mark);
                let err = OscError::from(err);
                debug!(transport = %self.kind, address, error = %err, "message not queued");
                Err(err)
            }
        }
    }

    /// Queue one reply, flushing the buffer first if it is full.
    ///
    /// Handlers that fan out (listings, range reads) queue through here so a
    /// long reply spans several packets. Fails with
    /// [`OscError::InsufficientResources`] only when the message does not fit
    /// even in an empty buffer.
    pub fn create_message_or_flush(&self, address: &str, items: &[DataItem]) -> Result<()> {
        match self.create_message(address, items) {
            Err(OscError::InsufficientResources { .. }) if self.pending_messages() > 0 => {
                debug!(transport = %self.kind, address, "buffer full; flushing before retry");
                self.send()?;
                self.create_message(address, items)
            }
            other => other,
        }
    }

    /// Queue a decoded or hand-built message.
    pub fn create(&self, msg: &Message) -> Result<()> {
        self.create_message(msg.address(), msg.items())
    }

    /// Flush queued messages to the transport.
    ///
    /// A lone message is sent bare, without its bundle wrapper. The buffer is
    /// emptied whether or not the write succeeds. Returns the number of
    /// messages flushed.
    pub fn send(&self) -> Result<usize> {
        let mut out = self.lock_out()?;
        let pending = out.pending;
        if pending == 0 {
            return Ok(0);
        }

        let packet = if pending == 1 {
            &out.buf[SINGLE_MESSAGE_PREAMBLE..]
        } else {
            &out.buf[..]
        };
        let dest = self.reply_to();
        let result = self.sink.send_packet(packet, dest);
        let len = packet.len();
        out.reset();
        drop(out);

        match result {
            Ok(()) => {
                debug!(transport = %self.kind, messages = pending, len, "channel flushed");
                Ok(pending)
            }
            Err(err) => {
                warn!(transport = %self.kind, messages = pending, error = %err, "channel flush failed");
                Err(err.into())
            }
        }
    }

    /// Drop everything queued.
    pub fn reset(&self) -> Result<()> {
        self.lock_out()?.reset();
        Ok(())
    }

    pub fn pending_messages(&self) -> usize {
        self.out.lock().pending
    }

    /// Messages queued since the channel was built, flushed or not.
    pub fn queued_total(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Bytes currently queued, bundle header included.
    pub fn buffered_len(&self) -> usize {
        self.out.lock().buf.len()
    }

    /// Queue `/<subsystem>/error` carrying `text`.
    pub fn subsystem_error(&self, subsystem: &str, text: &str) -> Result<()> {
        self.create_message_or_flush(
            &format!("/{subsystem}/error"),
            &[DataItem::String(text.to_string())],
        )
    }

    /// Queue `/error` carrying `text`.
    pub fn error(&self, text: &str) -> Result<()> {
        self.create_message_or_flush("/error", &[DataItem::String(text.to_string())])
    }

    /// Queue a `/debug` message with a preamble and a text.
    pub fn debug(&self, preamble: &str, text: &str) -> Result<()> {
        self.create_message_or_flush(
            "/debug",
            &[
                DataItem::String(preamble.to_string()),
                DataItem::String(text.to_string()),
            ],
        )
    }

    /// The reusable incoming message, held while handlers run.
    pub(crate) fn incoming(&self) -> MutexGuard<'_, Message> {
        self.incoming.lock()
    }

    fn lock_out(&self) -> Result<MutexGuard<'_, OutBuffer>> {
        match self.lock_timeout {
            Some(timeout) => self.out.try_lock_for(timeout).ok_or_else(|| {
                warn!(transport = %self.kind, ?timeout, "channel lock timed out");
                OscError::CantLock
            }),
            None => Ok(self.out.lock()),
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let out = self.out.lock();
        f.debug_struct("Channel")
            .field("kind", &self.kind)
            .field("pending", &out.pending)
            .field("buffered", &out.buf.len())
            .field("capacity", &out.capacity)
            .field("lock_timeout", &self.lock_timeout)
            .field("reply_to", &self.reply_to())
            .finish()
    }
}
