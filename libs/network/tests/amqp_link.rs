//! Receiver and sender links against a scripted in-memory AMQP peer

use bytes::Bytes;
use codec::{
    AmqpError, AmqpMessage, Attach, Begin, Close, DeliveryState, Detach, Disposition, Flow, Frame, FrameBody,
    Open, Performative, ReceiverSettleMode, Role, SaslCode, SaslFrame, Transfer, AMQP_HEADER, SASL_HEADER,
};
use network::io::FramedIo;
use network::{
    Acknowledgement, AmqpReceiver, AmqpSender, ConnectionParams, Delivery, LinkSettings, PlainCredentials,
    ReceiverLink, ReceiverOptions, TransportError,
};
use std::time::Duration;
use tokio::io::DuplexStream;

const WAIT: Duration = Duration::from_secs(2);

type Peer = FramedIo<DuplexStream>;

fn settings() -> LinkSettings {
    LinkSettings {
        io_timeout: WAIT,
        io_wait: Duration::from_millis(10),
        close_timeout: Duration::from_millis(500),
        ..LinkSettings::default()
    }
}

fn params() -> ConnectionParams {
    ConnectionParams {
        hostname: "hub.example.net".into(),
        credentials: PlainCredentials::new("listen", "secret"),
        container_id: "probe-test".into(),
    }
}

fn options() -> ReceiverOptions {
    ReceiverOptions::new("amqps://hub.example.net/hub/ConsumerGroups/$Default/Partitions/2")
        .with_filter("amqp.annotation.x-opt-enqueuedtimeutc > 1699999970000")
}

async fn performative(peer: &mut Peer, operation: &str) -> (Performative, Bytes) {
    loop {
        match peer.recv(WAIT, operation).await.unwrap().body {
            FrameBody::Amqp { performative, payload } => return (performative, payload),
            FrameBody::Heartbeat => continue,
            other => panic!("expected {operation}, got {other:?}"),
        }
    }
}

async fn send(peer: &mut Peer, performative: Performative) {
    peer.send(&Frame::amqp(0, performative)).await.unwrap();
}

/// Peer side of SASL, open and begin
async fn accept_session(peer: &mut Peer) {
    assert_eq!(peer.read_protocol_header(WAIT).await.unwrap(), SASL_HEADER);
    peer.write_protocol_header(SASL_HEADER).await.unwrap();
    peer.send(&Frame::sasl(SaslFrame::Mechanisms(vec!["ANONYMOUS".into(), "PLAIN".into()])))
        .await
        .unwrap();
    match peer.recv(WAIT, "sasl-init").await.unwrap().body {
        FrameBody::Sasl(SaslFrame::Init(init)) => {
            assert_eq!(init.initial_response.unwrap().as_ref(), b"\0listen\0secret")
        }
        other => panic!("unexpected {other:?}"),
    }
    peer.send(&Frame::sasl(SaslFrame::Outcome {
        code: SaslCode::Ok,
        additional_data: None,
    }))
    .await
    .unwrap();

    assert_eq!(peer.read_protocol_header(WAIT).await.unwrap(), AMQP_HEADER);
    peer.write_protocol_header(AMQP_HEADER).await.unwrap();

    match performative(peer, "open").await.0 {
        Performative::Open(open) => assert_eq!(open.hostname.as_deref(), Some("hub.example.net")),
        other => panic!("unexpected {other:?}"),
    }
    send(peer, Performative::Open(Open::new("peer"))).await;

    match performative(peer, "begin").await.0 {
        Performative::Begin(begin) => assert_eq!(begin.incoming_window, 1000),
        other => panic!("unexpected {other:?}"),
    }
    let mut begin = Begin::new(5000, 5000);
    begin.remote_channel = Some(0);
    send(peer, Performative::Begin(begin)).await;
}

/// Receive the client's attach and mirror it back
async fn accept_attach(peer: &mut Peer) -> Attach {
    let attach = match performative(peer, "attach").await.0 {
        Performative::Attach(attach) => attach,
        other => panic!("unexpected {other:?}"),
    };
    let mut reply = attach.clone();
    reply.role = match attach.role {
        Role::Receiver => Role::Sender,
        Role::Sender => Role::Receiver,
    };
    reply.initial_delivery_count = Some(0);
    send(peer, Performative::Attach(reply)).await;
    attach
}

async fn expect_flow(peer: &mut Peer) -> Flow {
    match performative(peer, "flow").await.0 {
        Performative::Flow(flow) => flow,
        other => panic!("unexpected {other:?}"),
    }
}

async fn accept_close(peer: &mut Peer) {
    let mut seen = Vec::new();
    while seen.len() < 3 {
        seen.push(performative(peer, "teardown").await.0.name());
    }
    assert_eq!(seen, vec!["detach", "end", "close"]);
    send(peer, Performative::Close(Close::default())).await;
}

async fn next_deliveries(receiver: &mut dyn ReceiverLink) -> Vec<Delivery> {
    for _ in 0..200 {
        let deliveries = receiver.do_work().await.unwrap();
        if !deliveries.is_empty() {
            return deliveries;
        }
    }
    panic!("no delivery arrived");
}

#[tokio::test]
async fn test_receiver_attach_reassembly_settle_and_close() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let peer_task = tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;

        let attach = accept_attach(&mut peer).await;
        assert_eq!(attach.name, "receiver-link");
        assert_eq!(attach.role, Role::Receiver);
        assert_eq!(attach.rcv_settle_mode, Some(ReceiverSettleMode::First));
        let source = attach.source.unwrap();
        assert_eq!(
            source.selector(),
            Some("amqp.annotation.x-opt-enqueuedtimeutc > 1699999970000")
        );
        assert_eq!(attach.target.unwrap().address.as_deref(), Some("messages/events"));

        let flow = expect_flow(&mut peer).await;
        assert_eq!(flow.link_credit, Some(1000));
        assert_eq!(flow.incoming_window, 1000);

        let message = AmqpMessage::with_data(Bytes::from_static(b"hello partition")).to_bytes();
        let (head, tail) = message.split_at(5);
        let first = Transfer {
            handle: 0,
            delivery_id: Some(0),
            delivery_tag: Some(Bytes::from_static(&[1])),
            message_format: Some(0),
            more: true,
            ..Transfer::default()
        };
        peer.send(&Frame::amqp_with_payload(
            0,
            Performative::Transfer(first),
            Bytes::copy_from_slice(head),
        ))
        .await
        .unwrap();
        peer.send(&Frame::amqp_with_payload(
            0,
            Performative::Transfer(Transfer::default()),
            Bytes::copy_from_slice(tail),
        ))
        .await
        .unwrap();

        let disposition = match performative(&mut peer, "disposition").await.0 {
            Performative::Disposition(disposition) => disposition,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(disposition.first, 0);
        assert!(disposition.settled);
        assert!(matches!(disposition.state, Some(DeliveryState::Rejected { .. })));

        accept_close(&mut peer).await;
    });

    let mut receiver = AmqpReceiver::establish(client, &params(), &options(), &settings())
        .await
        .unwrap();
    assert_eq!(receiver.address(), options().address);

    let deliveries = next_deliveries(&mut receiver).await;
    assert_eq!(deliveries.len(), 1);
    let message = AmqpMessage::decode(&deliveries[0].payload).unwrap();
    assert_eq!(message.first_data().unwrap().as_ref(), b"hello partition");

    receiver
        .settle(&deliveries[0], Acknowledgement::reject("condition", "description"))
        .await
        .unwrap();
    receiver.close().await.unwrap();
    // second close is a no-op
    receiver.close().await.unwrap();
    peer_task.await.unwrap();
}

/// Refuse the next attach the way the hub does: a null terminus, then detach
async fn refuse_attach(peer: &mut Peer) {
    let attach = match performative(peer, "attach").await.0 {
        Performative::Attach(attach) => attach,
        other => panic!("unexpected {other:?}"),
    };
    let role = match attach.role {
        Role::Receiver => Role::Sender,
        Role::Sender => Role::Receiver,
    };
    let mut reply = Attach::new(attach.name, 0, role);
    reply.source = None;
    reply.target = None;
    send(peer, Performative::Attach(reply)).await;
    send(
        peer,
        Performative::Detach(Detach {
            handle: 0,
            closed: true,
            error: Some(AmqpError::new("amqp:not-found", Some("no such partition".into()))),
        }),
    )
    .await;
}

/// Collect what the client sends until it closes the connection
async fn teardown_sequence(peer: &mut Peer) -> Vec<&'static str> {
    let mut seen = Vec::new();
    loop {
        match peer.recv(WAIT, "teardown").await {
            Ok(frame) => match frame.body {
                FrameBody::Amqp { performative, .. } => {
                    let name = performative.name();
                    seen.push(name);
                    if name == "close" {
                        send(peer, Performative::Close(Close::default())).await;
                        return seen;
                    }
                }
                FrameBody::Heartbeat => continue,
                other => panic!("unexpected {other:?}"),
            },
            Err(_) => return seen,
        }
    }
}

#[tokio::test]
async fn test_refused_attach_reports_detach_error() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let peer_task = tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;
        refuse_attach(&mut peer).await;
        teardown_sequence(&mut peer).await
    });

    let err = AmqpReceiver::establish(client, &params(), &options(), &settings())
        .await
        .err()
        .unwrap();
    match err {
        TransportError::Remote {
            performative: "detach",
            error: Some(error),
        } => assert_eq!(error.condition, "amqp:not-found"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(peer_task.await.unwrap(), vec!["end", "close"]);
}

#[tokio::test]
async fn test_refused_sender_attach_ends_session() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let peer_task = tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;
        refuse_attach(&mut peer).await;
        teardown_sequence(&mut peer).await
    });

    let err = AmqpSender::establish(client, &params(), "/devices/dev1/messages/events", &settings())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, TransportError::Remote { performative: "detach", .. }));
    assert_eq!(peer_task.await.unwrap(), vec!["end", "close"]);
}

#[tokio::test]
async fn test_silent_attach_times_out_and_ends_session() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let link_settings = LinkSettings {
        connect_timeout: Duration::from_millis(300),
        io_timeout: Duration::from_millis(250),
        ..settings()
    };
    let peer_task = tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;
        // swallow the attach and never answer it
        match performative(&mut peer, "attach").await.0 {
            Performative::Attach(_) => {}
            other => panic!("unexpected {other:?}"),
        }
        teardown_sequence(&mut peer).await
    });

    let err = AmqpReceiver::establish(client, &params(), &options(), &link_settings)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, TransportError::Timeout { .. }));
    assert_eq!(peer_task.await.unwrap(), vec!["end", "close"]);
}

#[tokio::test]
async fn test_oversized_reassembly_is_protocol_error() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let link_settings = LinkSettings {
        max_message_size: 16,
        ..settings()
    };
    tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;
        accept_attach(&mut peer).await;
        expect_flow(&mut peer).await;
        for id in 0..4u32 {
            let transfer = Transfer {
                handle: 0,
                delivery_id: (id == 0).then_some(0),
                delivery_tag: Some(Bytes::from_static(&[7])),
                more: true,
                ..Transfer::default()
            };
            peer.send(&Frame::amqp_with_payload(
                0,
                Performative::Transfer(transfer),
                Bytes::from_static(b"0123456789"),
            ))
            .await
            .unwrap();
        }
        let _ = peer.recv(WAIT, "drain").await;
    });

    let mut receiver = AmqpReceiver::establish(client, &params(), &options(), &link_settings)
        .await
        .unwrap();
    let mut result = Ok(Vec::new());
    for _ in 0..200 {
        result = receiver.do_work().await;
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(TransportError::Protocol { .. })));
}

#[tokio::test]
async fn test_remote_detach_during_polling_is_error() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;
        accept_attach(&mut peer).await;
        expect_flow(&mut peer).await;
        send(
            &mut peer,
            Performative::Detach(Detach {
                handle: 0,
                closed: true,
                error: Some(AmqpError::new("amqp:link:detach-forced", None)),
            }),
        )
        .await;
        let _ = peer.recv(WAIT, "drain").await;
    });

    let mut receiver = AmqpReceiver::establish(client, &params(), &options(), &settings())
        .await
        .unwrap();
    let mut result = Ok(Vec::new());
    for _ in 0..200 {
        result = receiver.do_work().await;
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(TransportError::Remote { performative: "detach", .. })));
}

#[tokio::test]
async fn test_credit_replenished_at_half() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let link_settings = LinkSettings {
        link_credit: 4,
        ..settings()
    };
    let peer_task = tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;
        accept_attach(&mut peer).await;
        assert_eq!(expect_flow(&mut peer).await.link_credit, Some(4));

        for id in 0..2u32 {
            let transfer = Transfer {
                handle: 0,
                delivery_id: Some(id),
                delivery_tag: Some(Bytes::copy_from_slice(&id.to_be_bytes())),
                settled: Some(true),
                ..Transfer::default()
            };
            let payload = AmqpMessage::with_data(Bytes::from_static(b"x")).to_bytes();
            peer.send(&Frame::amqp_with_payload(0, Performative::Transfer(transfer), payload))
                .await
                .unwrap();
        }

        let flow = expect_flow(&mut peer).await;
        assert_eq!(flow.link_credit, Some(4));
        assert_eq!(flow.delivery_count, Some(2));
        assert_eq!(flow.next_incoming_id, Some(2));
    });

    let mut receiver = AmqpReceiver::establish(client, &params(), &options(), &link_settings)
        .await
        .unwrap();
    let mut received = 0;
    while received < 2 {
        received += next_deliveries(&mut receiver).await.len();
    }
    peer_task.await.unwrap();
}

#[tokio::test]
async fn test_sender_waits_for_credit_and_acceptance() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let peer_task = tokio::spawn(async move {
        let mut peer = FramedIo::new(server);
        accept_session(&mut peer).await;
        let attach = accept_attach(&mut peer).await;
        assert_eq!(attach.role, Role::Sender);
        assert_eq!(
            attach.target.unwrap().address.as_deref(),
            Some("/devices/dev1/messages/events")
        );

        send(
            &mut peer,
            Performative::Flow(Flow {
                next_incoming_id: Some(0),
                incoming_window: 100,
                outgoing_window: 100,
                handle: Some(0),
                delivery_count: Some(0),
                link_credit: Some(10),
                ..Flow::default()
            }),
        )
        .await;

        let (transfer, payload) = match performative(&mut peer, "transfer").await {
            (Performative::Transfer(transfer), payload) => (transfer, payload),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(transfer.settled, Some(false));
        let message = AmqpMessage::decode(&payload).unwrap();
        assert_eq!(message.first_data().unwrap().as_ref(), b"echo");

        send(
            &mut peer,
            Performative::Disposition(Disposition {
                role: Role::Receiver,
                first: transfer.delivery_id.unwrap(),
                last: None,
                settled: true,
                state: Some(DeliveryState::Accepted),
            }),
        )
        .await;
        accept_close(&mut peer).await;
    });

    let mut sender = AmqpSender::establish(client, &params(), "/devices/dev1/messages/events", &settings())
        .await
        .unwrap();
    sender
        .send(&AmqpMessage::with_data(Bytes::from_static(b"echo")))
        .await
        .unwrap();
    sender.close().await.unwrap();
    peer_task.await.unwrap();
}
