use std::path::{Path, PathBuf};
use std::time::Duration;

use osclink_transport::TransportKind;
use serde::{Deserialize, Serialize};

use crate::error::{OscError, Result};

/// Transport the autosend loop pushes unsolicited data to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutosendTransport {
    #[default]
    Udp,
    Usb,
}

impl From<AutosendTransport> for TransportKind {
    fn from(value: AutosendTransport) -> Self {
        match value {
            AutosendTransport::Udp => TransportKind::Udp,
            AutosendTransport::Usb => TransportKind::Usb,
        }
    }
}

/// Engine limits, ports, and timing.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes:
///
/// ```json
/// { "udp_listen_port": 10001, "autosend_interval_ms": 100 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest packet accepted from a transport.
    pub max_message_in: usize,
    /// Capacity of each channel's outgoing buffer.
    pub max_message_out: usize,
    /// Data items decoded per message; the rest are ignored.
    pub max_data_items: usize,
    pub max_handlers: usize,
    /// Bundles nested deeper than this are dropped.
    pub max_bundle_depth: usize,
    pub udp_listen_port: u16,
    /// Replies go to this port on the sender's host instead of the sender's port.
    pub udp_reply_port: Option<u16>,
    /// Serial device carrying SLIP frames (USB virtual serial port).
    pub serial_device: Option<PathBuf>,
    /// Wait at most this long for a channel buffer; block forever when absent.
    pub lock_timeout_ms: Option<u64>,
    /// Autosend poll interval; autosend is off when absent.
    pub autosend_interval_ms: Option<u64>,
    pub autosend_transport: AutosendTransport,
    /// Receive-loop poll interval, so loops notice shutdown.
    pub read_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_message_in: 512,
            max_message_out: 512,
            max_data_items: osclink_wire::MAX_DATA_ITEMS,
            max_handlers: 56,
            max_bundle_depth: 8,
            udp_listen_port: 10000,
            udp_reply_port: None,
            serial_device: None,
            lock_timeout_ms: None,
            autosend_interval_ms: None,
            autosend_transport: AutosendTransport::Udp,
            read_timeout_ms: 250,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| OscError::Config {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    pub fn autosend_interval(&self) -> Option<Duration> {
        self.autosend_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}
