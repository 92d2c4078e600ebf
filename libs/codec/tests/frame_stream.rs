//! Frame reassembly over a byte stream delivered in arbitrary read sizes,
//! mirroring what a receiver sees from a TLS socket.

use bytes::{Bytes, BytesMut};
use codec::{
    AmqpMessage, Attach, Begin, Flow, Frame, FrameBody, FrameDecoder, Open, Performative, ReceiverSettleMode,
    Role, Source, Target, Transfer,
};

fn receiver_session_frames() -> Vec<Frame> {
    let mut open = Open::new("probe-container");
    open.hostname = Some("hub.servicebus.windows.net".into());
    open.idle_time_out = Some(60_000);

    let mut attach = Attach::new("receiver-link", 0, Role::Receiver);
    attach.rcv_settle_mode = Some(ReceiverSettleMode::First);
    attach.source = Some(Source::with_selector(
        "amqps://hub.servicebus.windows.net/hub/ConsumerGroups/$Default/Partitions/1",
        "amqp.annotation.x-opt-enqueuedtimeutc > 1699999970000",
    ));
    attach.target = Some(Target::new("messages/events"));

    let flow = Flow {
        next_incoming_id: Some(0),
        incoming_window: 1000,
        next_outgoing_id: 0,
        outgoing_window: 1000,
        handle: Some(0),
        delivery_count: Some(0),
        link_credit: Some(1000),
        ..Flow::default()
    };

    let payload = AmqpMessage::with_data(Bytes::from_static(b"echo request sent successfully")).to_bytes();
    let transfer = Transfer {
        handle: 0,
        delivery_id: Some(0),
        delivery_tag: Some(Bytes::from_static(&[0, 0, 0, 1])),
        message_format: Some(0),
        ..Transfer::default()
    };

    vec![
        Frame::amqp(0, Performative::Open(open)),
        Frame::amqp(0, Performative::Begin(Begin::new(1000, 1000))),
        Frame::amqp(0, Performative::Attach(attach)),
        Frame::amqp(0, Performative::Flow(flow)),
        Frame::heartbeat(),
        Frame::amqp_with_payload(0, Performative::Transfer(transfer), payload),
    ]
}

fn decode_in_chunks(stream: &[u8], chunk: usize) -> Vec<Frame> {
    let decoder = FrameDecoder::default();
    let mut buf = BytesMut::new();
    let mut frames = Vec::new();
    for piece in stream.chunks(chunk) {
        buf.extend_from_slice(piece);
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
    }
    assert!(buf.is_empty(), "no bytes left over");
    frames
}

#[test]
fn test_stream_decodes_identically_for_any_read_size() {
    let frames = receiver_session_frames();
    let mut stream = BytesMut::new();
    for frame in &frames {
        frame.encode(&mut stream);
    }

    for chunk in [1, 3, 7, 64, stream.len()] {
        assert_eq!(decode_in_chunks(&stream, chunk), frames, "chunk size {chunk}");
    }
}

#[test]
fn test_transfer_payload_carries_message() {
    let frames = receiver_session_frames();
    let transfer = frames.last().unwrap().to_bytes();

    let decoded = Frame::decode(&transfer).unwrap();
    let FrameBody::Amqp { payload, .. } = decoded.body else {
        panic!("expected an AMQP frame");
    };
    let message = AmqpMessage::decode(&payload).unwrap();
    assert_eq!(
        message.first_data().unwrap(),
        &Bytes::from_static(b"echo request sent successfully")
    );
}
