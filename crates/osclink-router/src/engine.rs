use std::fs::{File, OpenOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use osclink_transport::{SerialSink, SlipReader, TransportError, TransportKind, UdpTransport};
use tracing::{debug, info, warn};

use crate::autosend::AutoSender;
use crate::channel::Channel;
use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{OscError, Result};
use crate::handler::{Handler, HandlerRegistry};
use crate::listener::spawn_receive_loop;

/// Entry point for assembling an engine.
///
/// ```no_run
/// use osclink_router::{EngineConfig, OscEngine};
///
/// let engine = OscEngine::builder()
///     .config(EngineConfig::default())
///     .start()?;
/// engine.stop()?;
/// # Ok::<(), osclink_router::OscError>(())
/// ```
pub struct OscEngine;

impl OscEngine {
    pub fn builder() -> OscEngineBuilder {
        OscEngineBuilder::default()
    }
}

/// Collects handlers and transport choices before anything is spawned.
pub struct OscEngineBuilder {
    config: EngineConfig,
    handlers: Vec<Arc<dyn Handler>>,
    udp: bool,
    udp_transport: Option<UdpTransport>,
}

impl Default for OscEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            handlers: Vec::new(),
            udp: true,
            udp_transport: None,
        }
    }
}

impl OscEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a handler. Registration order is dispatch order.
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Register a handler that the caller keeps a reference to.
    pub fn shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Use an already bound UDP socket instead of binding `udp_listen_port`.
    pub fn udp_transport(mut self, transport: UdpTransport) -> Self {
        self.udp = true;
        self.udp_transport = Some(transport);
        self
    }

    /// Run without the UDP transport.
    pub fn without_udp(mut self) -> Self {
        self.udp = false;
        self.udp_transport = None;
        self
    }

    /// Enable the SLIP serial transport on `device`.
    pub fn serial_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.config.serial_device = Some(device.into());
        self
    }

    /// Register handlers, open transports, and spawn the worker threads.
    ///
    /// Every transport is opened before any thread starts. If a later thread
    /// fails to spawn, the ones already running are stopped and joined before
    /// the error is returned.
    pub fn start(self) -> Result<EngineHandle> {
        let config = self.config;

        let mut registry = HandlerRegistry::new(config.max_handlers);
        for handler in self.handlers {
            registry.register(handler)?;
        }

        let udp = match (self.udp, self.udp_transport) {
            (false, _) => None,
            (true, Some(transport)) => Some(transport),
            (true, None) => Some(UdpTransport::bind_port(config.udp_listen_port)?),
        };
        let serial = match &config.serial_device {
            Some(device) => Some(open_serial(device)?),
            None => None,
        };

        let autosend = config
            .autosend_interval()
            .map(|interval| (TransportKind::from(config.autosend_transport), interval));
        if let Some((kind, _)) = autosend {
            let enabled = match kind {
                TransportKind::Udp => udp.is_some(),
                TransportKind::Usb => serial.is_some(),
            };
            if !enabled {
                return Err(OscError::TransportDisabled(kind));
            }
        }

        let dispatcher = Arc::new(Dispatcher::with_config(registry, &config));
        let stop = Arc::new(AtomicBool::new(false));
        let mut handle = EngineHandle {
            stop: Arc::clone(&stop),
            dispatcher: Arc::clone(&dispatcher),
            udp_channel: None,
            usb_channel: None,
            udp_local_addr: None,
            receivers: Vec::new(),
            autosend: None,
        };

        if let Err(err) = handle.spawn_workers(udp, serial, autosend, &config) {
            warn!(error = %err, "engine start failed; stopping started workers");
            handle.abort();
            return Err(err);
        }

        info!(
            handlers = dispatcher.registry().len(),
            udp = ?handle.udp_local_addr,
            serial = ?config.serial_device,
            "engine started"
        );
        Ok(handle)
    }
}

fn open_serial(device: &Path) -> Result<(File, File)> {
    let open_err = |source| TransportError::Open {
        device: device.display().to_string(),
        source,
    };
    let writer = OpenOptions::new()
        .read(true)
        .write(true)
        .open(device)
        .map_err(open_err)?;
    let reader = writer.try_clone().map_err(open_err)?;
    info!(device = %device.display(), "serial transport opened");
    Ok((reader, writer))
}

/// A running engine. Dropping it without [`EngineHandle::stop`] leaves the
/// worker threads running.
pub struct EngineHandle {
    stop: Arc<AtomicBool>,
    dispatcher: Arc<Dispatcher>,
    udp_channel: Option<Arc<Channel>>,
    usb_channel: Option<Arc<Channel>>,
    udp_local_addr: Option<SocketAddr>,
    receivers: Vec<(&'static str, JoinHandle<Result<()>>)>,
    autosend: Option<AutoSender>,
}

impl EngineHandle {
    /// Local address of the UDP transport, when enabled.
    pub fn udp_local_addr(&self) -> Option<SocketAddr> {
        self.udp_local_addr
    }

    pub fn channel(&self, kind: TransportKind) -> Option<&Arc<Channel>> {
        match kind {
            TransportKind::Udp => self.udp_channel.as_ref(),
            TransportKind::Usb => self.usb_channel.as_ref(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Whether every receive thread is still running.
    pub fn is_running(&self) -> bool {
        self.receivers.iter().all(|(_, thread)| !thread.is_finished())
    }

    /// Spawn the receive loops and autosend. Stops at the first failure and
    /// leaves the already started workers in `self` for the caller to stop.
    fn spawn_workers(
        &mut self,
        udp: Option<UdpTransport>,
        serial: Option<(File, File)>,
        autosend: Option<(TransportKind, Duration)>,
        config: &EngineConfig,
    ) -> Result<()> {
        if let Some(transport) = udp {
            transport.set_read_timeout(Some(config.read_timeout()))?;
            self.udp_local_addr = Some(transport.local_addr());

            let channel = Arc::new(Channel::from_config(
                TransportKind::Udp,
                transport.try_clone()?,
                config,
            ));
            let thread = spawn_receive_loop(
                "udp",
                transport,
                Arc::clone(&self.dispatcher),
                Arc::clone(&channel),
                config.max_message_in,
                Arc::clone(&self.stop),
            )?;
            self.udp_channel = Some(channel);
            self.receivers.push(("udp", thread));
        }

        if let Some((reader, writer)) = serial {
            let channel = Arc::new(Channel::from_config(
                TransportKind::Usb,
                SerialSink::new(writer),
                config,
            ));
            let source = SlipReader::with_max_frame(reader, config.max_message_in);
            let thread = spawn_receive_loop(
                "usb",
                source,
                Arc::clone(&self.dispatcher),
                Arc::clone(&channel),
                config.max_message_in,
                Arc::clone(&self.stop),
            )?;
            self.usb_channel = Some(channel);
            self.receivers.push(("usb", thread));
        }

        if let Some((kind, interval)) = autosend {
            if let Some(channel) = self.channel(kind).cloned() {
                self.autosend = Some(AutoSender::spawn(
                    Arc::clone(self.dispatcher.registry()),
                    channel,
                    interval,
                )?);
            }
        }
        Ok(())
    }

    /// Stop autosend and every receive loop, returning the first loop error.
    ///
    /// A serial read blocks until the next byte arrives, so a serial thread
    /// that has not finished is detached rather than joined.
    pub fn stop(mut self) -> Result<()> {
        let result = self.shutdown();
        info!("engine stopped");
        result
    }

    /// Tear down a partially started engine.
    pub(crate) fn abort(mut self) {
        if let Err(err) = self.shutdown() {
            debug!(error = %err, "receive loop failed during rollback");
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        if let Some(autosend) = self.autosend.take() {
            autosend.stop();
        }

        let mut first_err = None;
        for (name, thread) in self.receivers.drain(..) {
            if name == "usb" && !thread.is_finished() {
                debug!(transport = name, "receive thread blocked in read; detaching");
                continue;
            }
            match thread.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(transport = name, error = %err, "receive loop ended with error");
                    first_err.get_or_insert(err);
                }
                Err(_) => warn!(transport = name, "receive thread panicked"),
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}
