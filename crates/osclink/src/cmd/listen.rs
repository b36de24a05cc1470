use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use osclink_transport::{PacketSource, TransportError, UdpTransport};

use crate::cmd::ListenArgs;
use crate::exit::{transport_error, CliError, CliResult, SUCCESS};
use crate::output::{messages_in, print_messages, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_PACKET: usize = 64 * 1024;

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut transport =
        UdpTransport::bind_port(args.port).map_err(|err| transport_error("bind failed", err))?;
    transport
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| transport_error("socket setup failed", err))?;
    tracing::info!(local_addr = %transport.local_addr(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut buf = vec![0u8; MAX_PACKET];
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let received = match transport.recv_packet(&mut buf) {
            Ok(received) => received,
            Err(TransportError::TimedOut) => continue,
            Err(err) => return Err(transport_error("receive failed", err)),
        };

        let mut messages = messages_in(&buf[..received.len]);
        if let Some(count) = args.count {
            messages.truncate(count.saturating_sub(printed));
        }
        print_messages(&messages, received.source, format);
        printed = printed.saturating_add(messages.len());

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
