//! Drive the dispatcher from a tokio task instead of a receive thread.
//!
//! Run with:
//!   cargo run --example async-udp --features async
//!
//! Then query it:
//!   cargo run --features cli -- send 127.0.0.1:10001 / --wait

use std::net::SocketAddr;
use std::sync::Arc;

use osclink::router::{run_udp_async, Channel, Dispatcher, Handler, HandlerRegistry, Result};
use osclink::transport::{AsyncUdpSink, TransportKind};
use osclink::wire::Message;

struct Echo;

impl Handler for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn on_message(
        &self,
        channel: &Channel,
        msg: &Message,
        _source: Option<SocketAddr>,
    ) -> Result<usize> {
        channel.create(msg)?;
        Ok(1)
    }

    fn on_query(&self, _channel: &Channel, _address: &str, _element: usize) -> Result<usize> {
        Ok(0)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let socket = Arc::new(tokio::net::UdpSocket::bind("127.0.0.1:10001").await?);
    eprintln!("Listening on {}", socket.local_addr()?);

    let mut registry = HandlerRegistry::default();
    registry.register(Arc::new(Echo))?;
    let dispatcher = Arc::new(Dispatcher::new(registry));
    let channel = Arc::new(Channel::new(
        TransportKind::Udp,
        AsyncUdpSink::new(Arc::clone(&socket)),
    ));

    run_udp_async(socket, dispatcher, channel, 512, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}
