use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use osclink_transport::{PacketSource, TransportError};
use tracing::{debug, info, trace, warn};

use crate::channel::Channel;
use crate::dispatcher::Dispatcher;
use crate::error::{OscError, Result};

/// Feed every packet from `source` to the dispatcher until `stop` is set or
/// the link closes.
///
/// The source should have a read timeout so the stop flag is observed
/// between packets. Oversized frames are dropped; other transport errors
/// end the loop.
pub fn run_receive_loop<S: PacketSource>(
    source: &mut S,
    dispatcher: &Dispatcher,
    channel: &Channel,
    max_packet: usize,
    stop: &AtomicBool,
) -> Result<()> {
    let mut buf = vec![0u8; max_packet];
    info!(transport = %channel.kind(), max_packet, "receive loop started");

    while !stop.load(Ordering::Acquire) {
        match source.recv_packet(&mut buf) {
            Ok(received) if received.len == 0 => continue,
            Ok(received) => {
                let packet = &buf[..received.len];
                if let Err(err) = dispatcher.receive_packet(channel, packet, received.source) {
                    trace!(transport = %channel.kind(), error = %err, "packet handled with error");
                }
            }
            Err(TransportError::TimedOut) => continue,
            Err(TransportError::FrameTooLarge { size, max }) => {
                debug!(transport = %channel.kind(), size, max, "oversized frame dropped");
            }
            Err(TransportError::ConnectionClosed) => {
                info!(transport = %channel.kind(), "link closed");
                return Ok(());
            }
            Err(err) => {
                warn!(transport = %channel.kind(), error = %err, "receive loop failed");
                return Err(err.into());
            }
        }
    }

    info!(transport = %channel.kind(), "receive loop stopped");
    Ok(())
}

/// Run [`run_receive_loop`] on a named thread that owns `source`.
pub fn spawn_receive_loop<S>(
    name: &'static str,
    mut source: S,
    dispatcher: Arc<Dispatcher>,
    channel: Arc<Channel>,
    max_packet: usize,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<()>>>
where
    S: PacketSource + Send + 'static,
{
    thread::Builder::new()
        .name(format!("osclink-{name}"))
        .spawn(move || run_receive_loop(&mut source, &dispatcher, &channel, max_packet, &stop))
        .map_err(|source| OscError::Spawn { name, source })
}

/// Async UDP receive loop for channels whose sink is an
/// [`AsyncUdpSink`](osclink_transport::AsyncUdpSink) on the same socket.
///
/// Runs until `shutdown` resolves. Dispatch itself is synchronous; handlers
/// are expected to return quickly.
#[cfg(feature = "async")]
pub async fn run_udp_async<F>(
    socket: Arc<tokio::net::UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    channel: Arc<Channel>,
    max_packet: usize,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    let mut buf = vec![0u8; max_packet];
    tokio::pin!(shutdown);
    info!(transport = %channel.kind(), max_packet, "async receive loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(transport = %channel.kind(), "async receive loop stopped");
                return Ok(());
            }
            received = socket.recv_from(&mut buf) => {
                let (len, source) = received.map_err(TransportError::from)?;
                if let Err(err) = dispatcher.receive_packet(&channel, &buf[..len], Some(source)) {
                    trace!(transport = %channel.kind(), error = %err, "packet handled with error");
                }
            }
        }
    }
}
