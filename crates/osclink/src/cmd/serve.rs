use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use osclink_router::{
    Channel, EngineConfig, Handler, IndexedIntHandler, IndexedIntProperties, OscEngine, OscError,
    Result,
};
use osclink_wire::{DataItem, Message};
use parking_lot::Mutex;

use crate::cmd::listen::install_ctrlc_handler;
use crate::cmd::ServeArgs;
use crate::exit::{osc_error, CliError, CliResult, SUCCESS, USAGE};

const REGISTER_PROPERTIES: &[&str] = &["value", "min", "max"];
const VALUE: usize = 0;
const MIN: usize = 1;
const MAX: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Register {
    value: i32,
    min: i32,
    max: i32,
}

impl Default for Register {
    fn default() -> Self {
        Self {
            value: 0,
            min: i32::MIN,
            max: i32::MAX,
        }
    }
}

/// In-memory registers addressed as `/register/<n>/{value,min,max}`.
///
/// Writes to `value` are clamped into `min..=max`; narrowing the bounds
/// re-clamps the current value.
struct RegisterBank {
    registers: Mutex<Vec<Register>>,
}

impl RegisterBank {
    fn new(count: u16) -> Self {
        Self {
            registers: Mutex::new(vec![Register::default(); usize::from(count)]),
        }
    }
}

impl IndexedIntProperties for RegisterBank {
    fn properties(&self) -> &[&str] {
        REGISTER_PROPERTIES
    }

    fn index_count(&self) -> i32 {
        self.registers.lock().len() as i32
    }

    fn get(&self, index: i32, property: usize) -> Result<i32> {
        let registers = self.registers.lock();
        let reg = usize::try_from(index)
            .ok()
            .and_then(|i| registers.get(i))
            .ok_or(OscError::IllegalIndex)?;
        match property {
            VALUE => Ok(reg.value),
            MIN => Ok(reg.min),
            MAX => Ok(reg.max),
            _ => Err(OscError::UnknownProperty),
        }
    }

    fn set(&self, index: i32, property: usize, value: i32) -> Result<()> {
        let mut registers = self.registers.lock();
        let reg = usize::try_from(index)
            .ok()
            .and_then(|i| registers.get_mut(i))
            .ok_or(OscError::IllegalIndex)?;
        let mut next = *reg;
        match property {
            VALUE => next.value = value,
            MIN => next.min = value,
            MAX => next.max = value,
            _ => return Err(OscError::UnknownProperty),
        }
        if next.min > next.max {
            return Err(OscError::subsystem("register", "min above max"));
        }
        next.value = next.value.clamp(next.min, next.max);
        *reg = next;
        Ok(())
    }
}

/// Echoes every message it receives back at `/debug`.
struct DebugEcho;

impl Handler for DebugEcho {
    fn name(&self) -> &str {
        "debug"
    }

    fn on_message(
        &self,
        channel: &Channel,
        msg: &Message,
        _source: Option<SocketAddr>,
    ) -> Result<usize> {
        channel.create_message("/debug", msg.items())?;
        Ok(1)
    }

    fn on_query(&self, _channel: &Channel, _address: &str, _element: usize) -> Result<usize> {
        Ok(0)
    }
}

/// Seconds since the server started; pushed on every autosend tick.
struct Uptime {
    started: Instant,
}

impl Uptime {
    fn queue(&self, channel: &Channel) -> Result<usize> {
        let secs = i32::try_from(self.started.elapsed().as_secs()).unwrap_or(i32::MAX);
        channel.create_message("/uptime", &[DataItem::Int32(secs)])?;
        Ok(1)
    }
}

impl Handler for Uptime {
    fn name(&self) -> &str {
        "uptime"
    }

    fn on_message(
        &self,
        channel: &Channel,
        _msg: &Message,
        _source: Option<SocketAddr>,
    ) -> Result<usize> {
        self.queue(channel)
    }

    fn on_query(&self, _channel: &Channel, _address: &str, _element: usize) -> Result<usize> {
        Ok(0)
    }

    fn auto_send(&self, channel: &Channel) -> Result<usize> {
        self.queue(channel)
    }
}

fn load_config(args: &ServeArgs) -> CliResult<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            EngineConfig::from_json_file(path).map_err(|err| osc_error("config load failed", err))?
        }
        None => EngineConfig::default(),
    };
    if let Some(port) = args.udp_port {
        config.udp_listen_port = port;
    }
    if let Some(device) = &args.serial {
        config.serial_device = Some(device.clone());
    }
    if let Some(ms) = args.autosend_ms {
        config.autosend_interval_ms = Some(ms);
    }
    Ok(config)
}

pub fn run(args: ServeArgs) -> CliResult<i32> {
    if args.registers == 0 {
        return Err(CliError::new(USAGE, "--registers must be at least 1"));
    }
    let config = load_config(&args)?;

    let engine = OscEngine::builder()
        .config(config)
        .handler(IndexedIntHandler::new(
            "register",
            RegisterBank::new(args.registers),
        ))
        .handler(DebugEcho)
        .handler(Uptime {
            started: Instant::now(),
        })
        .start()
        .map_err(|err| osc_error("engine start failed", err))?;

    if let Some(addr) = engine.udp_local_addr() {
        println!("listening udp={addr}");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) && engine.is_running() {
        thread::sleep(Duration::from_millis(100));
    }

    tracing::info!("shutting down");
    engine
        .stop()
        .map_err(|err| osc_error("engine stopped with error", err))?;
    Ok(SUCCESS)
}
