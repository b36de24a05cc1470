use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the OSC engine with a demo register bank.
    Serve(ServeArgs),
    /// Send a single OSC message over UDP.
    Send(SendArgs),
    /// Listen on a UDP port and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// UDP port to listen on. 0 picks a free port.
    #[arg(long, env = "OSCLINK_UDP_PORT")]
    pub udp_port: Option<u16>,
    /// Serial device carrying SLIP-framed OSC.
    #[arg(long, value_name = "PATH", env = "OSCLINK_SERIAL")]
    pub serial: Option<PathBuf>,
    /// JSON engine configuration file.
    #[arg(long, value_name = "FILE", env = "OSCLINK_CONFIG")]
    pub config: Option<PathBuf>,
    /// Autosend interval in milliseconds.
    #[arg(long, value_name = "MS", env = "OSCLINK_AUTOSEND_MS")]
    pub autosend_ms: Option<u64>,
    /// Number of registers in the demo register bank.
    #[arg(long, default_value = "8")]
    pub registers: u16,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination as HOST:PORT.
    pub target: String,
    /// OSC address, e.g. /register/0/value.
    pub address: String,
    /// Arguments: i:1, f:2.5, s:text, b:hex, or untyped numbers and strings.
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    /// Wait for replies and print them.
    #[arg(long)]
    pub wait: bool,
    /// How long to keep collecting replies when --wait is set (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// UDP port to bind.
    #[arg(long, default_value = "10000", env = "OSCLINK_UDP_PORT")]
    pub port: u16,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
