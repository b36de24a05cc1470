use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use osclink_transport::{PacketSink, PacketSource, TransportError, UdpTransport};
use osclink_wire::{encode_message, DataItem};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{transport_error, wire_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{messages_in, print_messages, OutputFormat};

const MAX_REPLY: usize = 64 * 1024;

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let target = resolve_target(&args.target)?;
    let items = args
        .args
        .iter()
        .map(|arg| parse_item(arg))
        .collect::<CliResult<Vec<_>>>()?;

    let mut packet = BytesMut::new();
    encode_message(&args.address, &items, &mut packet)
        .map_err(|err| wire_error("encode failed", err))?;

    let local = match target {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let mut transport = UdpTransport::bind(local)
        .map_err(|err| transport_error("bind failed", err))?
        .with_default_destination(target);
    transport
        .send_packet(&packet, None)
        .map_err(|err| transport_error("send failed", err))?;
    tracing::debug!(%target, address = %args.address, len = packet.len(), "message sent");

    if !args.wait {
        return Ok(SUCCESS);
    }

    let received = collect_replies(&mut transport, wait_timeout, format)?;
    if received == 0 {
        return Err(CliError::new(
            TIMEOUT,
            format!("no reply from {target} within {wait_timeout:?}"),
        ));
    }
    Ok(SUCCESS)
}

/// Print every reply until the window closes. Returns the number of messages printed.
fn collect_replies(
    transport: &mut UdpTransport,
    window: Duration,
    format: OutputFormat,
) -> CliResult<usize> {
    let deadline = Instant::now() + window;
    let mut buf = vec![0u8; MAX_REPLY];
    let mut printed = 0;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(printed);
        }
        transport
            .set_read_timeout(Some(deadline - now))
            .map_err(|err| transport_error("socket setup failed", err))?;

        match transport.recv_packet(&mut buf) {
            Ok(received) => {
                let messages = messages_in(&buf[..received.len]);
                print_messages(&messages, received.source, format);
                printed += messages.len();
            }
            Err(TransportError::TimedOut) => return Ok(printed),
            Err(err) => return Err(transport_error("receive failed", err)),
        }
    }
}

fn resolve_target(target: &str) -> CliResult<SocketAddr> {
    target
        .to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("invalid target '{target}': {err}")))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("target '{target}' resolved to nothing")))
}

/// Parse one command-line argument into a data item.
///
/// `i:`, `f:`, `s:` and `b:` prefixes force the type; anything else is an
/// int if it parses as one, then a float, then a string.
fn parse_item(arg: &str) -> CliResult<DataItem> {
    if let Some((prefix, value)) = arg.split_once(':') {
        match prefix {
            "i" => {
                return value
                    .parse::<i32>()
                    .map(DataItem::Int32)
                    .map_err(|_| CliError::new(USAGE, format!("invalid int argument: {arg}")))
            }
            "f" => {
                return value
                    .parse::<f32>()
                    .map(DataItem::Float32)
                    .map_err(|_| CliError::new(USAGE, format!("invalid float argument: {arg}")))
            }
            "s" => return Ok(DataItem::String(value.to_string())),
            "b" => return parse_hex(value).map(DataItem::from),
            _ => {}
        }
    }

    if let Ok(v) = arg.parse::<i32>() {
        return Ok(DataItem::Int32(v));
    }
    if let Ok(v) = arg.parse::<f32>() {
        return Ok(DataItem::Float32(v));
    }
    Ok(DataItem::String(arg.to_string()))
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    if input.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("blob hex must have an even number of digits: {input}"),
        ));
    }
    (0..input.len())
        .step_by(2)
        .map(|i| {
            input
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid blob hex: {input}")))
        })
        .collect()
}
