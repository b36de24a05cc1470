use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::{OscError, Result};
use crate::handler::HandlerRegistry;

/// Give every handler one chance to push data, then flush if anything was queued.
///
/// Returns the number of messages flushed.
pub fn poll_handlers(registry: &HandlerRegistry, channel: &Channel) -> usize {
    let mut queued = 0;
    for handler in registry.iter() {
        match handler.auto_send(channel) {
            Ok(count) => queued += count,
            Err(err) => warn!(handler = handler.name(), error = %err, "autosend failed"),
        }
    }
    if queued == 0 {
        return 0;
    }
    match channel.send() {
        Ok(flushed) => flushed,
        Err(err) => {
            debug!(transport = %channel.kind(), error = %err, "autosend flush failed");
            0
        }
    }
}

/// Background thread polling handlers for unsolicited data.
pub struct AutoSender {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AutoSender {
    pub fn spawn(
        registry: Arc<HandlerRegistry>,
        channel: Arc<Channel>,
        interval: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("osclink-autosend".to_string())
            .spawn(move || {
                info!(transport = %channel.kind(), ?interval, "autosend started");
                let mut next = Instant::now() + interval;
                while !flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < next {
                        thread::park_timeout(next - now);
                        continue;
                    }
                    poll_handlers(&registry, &channel);
                    next += interval;
                    if next < now {
                        next = now + interval;
                    }
                }
                info!(transport = %channel.kind(), "autosend stopped");
            })
            .map_err(|source| OscError::Spawn {
                name: "autosend",
                source,
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                warn!("autosend thread panicked");
            }
        }
    }
}

impl Drop for AutoSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}
