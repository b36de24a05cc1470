use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use osclink_wire::{classify, decode_message, BundleElements, DataItem, Message, PacketKind};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    address: &'a str,
    type_tags: String,
    items: Vec<Value>,
    source: Option<String>,
    timestamp: String,
}

/// Every message carried by `packet`, nested bundles flattened in order.
///
/// Elements that fail to decode are logged and skipped.
pub fn messages_in(packet: &[u8]) -> Vec<Message> {
    let mut out = Vec::new();
    collect_messages(packet, &mut out);
    out
}

fn collect_messages(packet: &[u8], out: &mut Vec<Message>) {
    match classify(packet) {
        Ok(PacketKind::Message) => match decode_message(packet) {
            Ok(msg) => out.push(msg),
            Err(err) => tracing::debug!(error = %err, "undecodable message skipped"),
        },
        Ok(PacketKind::Bundle) => match BundleElements::new(packet) {
            Ok(elements) => elements.for_each(|element| collect_messages(element, out)),
            Err(err) => tracing::debug!(error = %err, "undecodable bundle skipped"),
        },
        Err(err) => tracing::debug!(error = %err, len = packet.len(), "packet skipped"),
    }
}

pub fn print_messages(messages: &[Message], source: Option<SocketAddr>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for msg in messages {
                let out = MessageOutput {
                    address: msg.address(),
                    type_tags: msg.type_tags(),
                    items: msg.items().iter().map(item_json).collect(),
                    source: source.map(|addr| addr.to_string()),
                    timestamp: now_unix_seconds(),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            if messages.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "TYPES", "ARGS", "SOURCE"]);
            for msg in messages {
                table.add_row(vec![
                    msg.address().to_string(),
                    msg.type_tags(),
                    items_text(msg.items()),
                    source.map_or_else(|| "-".to_string(), |addr| addr.to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for msg in messages {
                match source {
                    Some(addr) => println!(
                        "{} {} {}  <- {addr}",
                        msg.address(),
                        msg.type_tags(),
                        items_text(msg.items())
                    ),
                    None => println!(
                        "{} {} {}",
                        msg.address(),
                        msg.type_tags(),
                        items_text(msg.items())
                    ),
                }
            }
        }
    }
}

fn item_json(item: &DataItem) -> Value {
    match item {
        DataItem::Int32(v) => json!(v),
        DataItem::Float32(v) => json!(v),
        DataItem::String(s) => json!(s),
        DataItem::Blob(b) => json!({ "blob": hex(b) }),
    }
}

fn items_text(items: &[DataItem]) -> String {
    items
        .iter()
        .map(|item| match item {
            DataItem::Int32(v) => v.to_string(),
            DataItem::Float32(v) => v.to_string(),
            DataItem::String(s) => format!("{s:?}"),
            DataItem::Blob(b) => format!("<{}>", hex(b)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
