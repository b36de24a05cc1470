mod common;

use std::sync::Arc;
use std::thread;

use bytes::BytesMut;
use common::{encoded, udp_channel, Recorder};
use osclink_router::{
    Channel, Dispatcher, HandlerRegistry, IndexedIntHandler, IndexedIntProperties, OscError,
    Result,
};
use osclink_transport::TransportKind;
use osclink_wire::{
    decode_message, write_bundle_element, write_bundle_header, BundleElements, DataItem, Timetag,
};
use parking_lot::Mutex;

fn dispatcher(handlers: Vec<Arc<dyn osclink_router::Handler>>) -> Dispatcher {
    let mut registry = HandlerRegistry::default();
    for handler in handlers {
        registry.register(handler).expect("handler should register");
    }
    Dispatcher::new(registry)
}

fn bundle(elements: &[&[u8]]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    write_bundle_header(&mut buf, Timetag::IMMEDIATE);
    for element in elements {
        write_bundle_element(&mut buf, element);
    }
    buf.to_vec()
}

#[test]
fn typed_message_reaches_named_handler() {
    let foo = Recorder::new("foo");
    let dispatcher = dispatcher(vec![foo.clone()]);
    let (channel, _sink) = udp_channel();

    let packet = encoded(
        "/foo/bar",
        &[
            DataItem::Int32(1),
            DataItem::Float32(2.5),
            DataItem::String("hi".to_string()),
        ],
    );
    dispatcher
        .receive_packet(&channel, &packet, None)
        .expect("packet should be handled");

    let seen = foo.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].address(), "/foo/bar");
    assert_eq!(
        seen[0].items(),
        &[
            DataItem::Int32(1),
            DataItem::Float32(2.5),
            DataItem::String("hi".to_string())
        ]
    );
}

struct AppLeds {
    state: Mutex<[i32; 4]>,
}

impl IndexedIntProperties for AppLeds {
    fn properties(&self) -> &[&str] {
        &["state"]
    }

    fn index_count(&self) -> i32 {
        4
    }

    fn get(&self, index: i32, _property: usize) -> Result<i32> {
        Ok(self.state.lock()[index as usize])
    }

    fn set(&self, index: i32, _property: usize, value: i32) -> Result<()> {
        self.state.lock()[index as usize] = value;
        Ok(())
    }
}

#[test]
fn wildcard_index_walks_every_instance_descending() {
    let leds = Arc::new(IndexedIntHandler::new(
        "appled",
        AppLeds {
            state: Mutex::new([10, 11, 12, 13]),
        },
    ));
    let dispatcher = dispatcher(vec![leds]);
    let (channel, sink) = udp_channel();

    dispatcher
        .receive_packet(&channel, &encoded("/appled/*/state", &[]), None)
        .expect("read should be handled");

    let replies = sink.messages();
    let got: Vec<(String, Option<i32>)> = replies
        .iter()
        .map(|m| (m.address().to_string(), m.item_as_int(0)))
        .collect();
    assert_eq!(
        got,
        vec![
            ("/appled/3/state".to_string(), Some(13)),
            ("/appled/2/state".to_string(), Some(12)),
            ("/appled/1/state".to_string(), Some(11)),
            ("/appled/0/state".to_string(), Some(10)),
        ]
    );
    assert_eq!(sink.packets().len(), 1, "replies share one bundle");
}

#[test]
fn root_query_lists_handlers_in_registration_order() {
    let dispatcher = dispatcher(vec![Recorder::new("led"), Recorder::new("debug")]);
    let (channel, sink) = udp_channel();

    dispatcher
        .receive_packet(&channel, &encoded("/", &[]), None)
        .expect("root query should be handled");

    let replies = sink.messages();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|m| m.address() == "/"));
    assert_eq!(replies[0].item_as_str(0), Some("led"));
    assert_eq!(replies[1].item_as_str(0), Some("debug"));
}

#[test]
fn bundle_of_three_dispatches_three_messages_in_order() {
    let led = Recorder::new("led");
    let dispatcher = dispatcher(vec![led.clone()]);
    let (channel, _sink) = udp_channel();

    let first = encoded("/led/0", &[DataItem::Int32(0)]);
    let second = encoded("/led/1", &[DataItem::Int32(1)]);
    let third = encoded("/led/2", &[DataItem::Int32(2)]);
    let packet = bundle(&[&first[..], &second[..], &third[..]]);

    dispatcher
        .receive_packet(&channel, &packet, None)
        .expect("bundle should be handled");

    let values: Vec<Option<i32>> = led.seen().iter().map(|m| m.item_as_int(0)).collect();
    assert_eq!(values, vec![Some(0), Some(1), Some(2)]);
}

#[test]
fn nested_bundles_are_unwrapped() {
    let led = Recorder::new("led");
    let dispatcher = dispatcher(vec![led.clone()]);
    let (channel, _sink) = udp_channel();

    let inner = bundle(&[&encoded("/led/inner", &[])[..]]);
    let outer = encoded("/led/outer", &[]);
    let packet = bundle(&[&outer[..], &inner[..]]);

    dispatcher
        .receive_packet(&channel, &packet, None)
        .expect("bundle should be handled");

    let addresses: Vec<String> = led.seen().iter().map(|m| m.address().to_string()).collect();
    assert_eq!(addresses, vec!["/led/outer", "/led/inner"]);
}

#[test]
fn overlong_bundle_length_stops_without_reading_past_the_end() {
    let led = Recorder::new("led");
    let dispatcher = dispatcher(vec![led.clone()]);
    let (channel, _sink) = udp_channel();

    let first = encoded("/led/ok", &[]);
    let mut packet = bundle(&[&first[..]]);
    packet.extend_from_slice(&u32::MAX.to_be_bytes());
    packet.extend_from_slice(&encoded("/led/skipped", &[]));

    let err = dispatcher
        .receive_packet(&channel, &packet, None)
        .unwrap_err();

    assert!(matches!(err, OscError::BadFormat(_)));
    let addresses: Vec<String> = led.seen().iter().map(|m| m.address().to_string()).collect();
    assert_eq!(addresses, vec!["/led/ok"]);
}

#[test]
fn bad_bundle_element_does_not_stop_the_rest() {
    let led = Recorder::new("led");
    let dispatcher = dispatcher(vec![led.clone()]);
    let (channel, _sink) = udp_channel();

    let after = encoded("/led/after", &[]);
    let packet = bundle(&[&b"junk"[..], &after[..]]);
    dispatcher
        .receive_packet(&channel, &packet, None)
        .expect("bad elements are dropped, not fatal");

    assert_eq!(led.seen().len(), 1);
}

#[test]
fn concurrent_producers_never_interleave() {
    const PER_PRODUCER: i32 = 50;

    let (channel, sink) = udp_channel();
    let channel = channel.with_capacity(16 * 1024);

    thread::scope(|scope| {
        for producer in 0..2 {
            let channel = &channel;
            scope.spawn(move || {
                for i in 0..PER_PRODUCER {
                    channel
                        .create_message(
                            &format!("/producer/{producer}"),
                            &[DataItem::Int32(i), DataItem::String("payload".to_string())],
                        )
                        .expect("message should queue");
                }
            });
        }
    });

    assert_eq!(channel.pending_messages(), 2 * PER_PRODUCER as usize);
    channel.send().expect("send should succeed");

    let packets = sink.packets();
    assert_eq!(packets.len(), 1);
    let mut elements = BundleElements::new(&packets[0]).expect("bundle should parse");
    let mut per_producer = [Vec::new(), Vec::new()];
    for element in elements.by_ref() {
        let msg = decode_message(element).expect("every element should be well formed");
        let producer = msg
            .address_element_as_int(1)
            .expect("address should carry the producer") as usize;
        per_producer[producer].push(msg.item_as_int(0).expect("sequence number"));
    }
    assert!(!elements.is_truncated());

    let expected: Vec<i32> = (0..PER_PRODUCER).collect();
    assert_eq!(per_producer[0], expected);
    assert_eq!(per_producer[1], expected);
}

#[test]
fn serial_channel_ignores_reply_routing() {
    let led = Recorder::new("led");
    let dispatcher = dispatcher(vec![led]);
    let sink = common::CaptureSink::default();
    let channel = Channel::new(TransportKind::Usb, sink.clone());

    dispatcher
        .receive_packet(&channel, &encoded("/", &[]), None)
        .expect("root query should be handled");

    assert_eq!(channel.reply_to(), None);
    assert_eq!(sink.messages().len(), 1);
}
