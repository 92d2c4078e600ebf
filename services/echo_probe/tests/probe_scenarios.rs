//! End-to-end probe scenarios over scripted partitions

use echo_probe::test_utils::{data_delivery, raw_delivery, RecordingSender, ScriptedConnector, ScriptedPartition};
use echo_probe::{EchoCoordinator, EchoProbe, Outcome, PollerSettings, ProbeError};
use message_sink::test_utils::CollectorSink;
use network::Acknowledgement;
use probe_config::{ProbeConfig, TransportProtocol};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const MARKER: &str = "echo request sent successfully";

fn config(partitions: u32) -> ProbeConfig {
    ProbeConfig::from_json_str(&format!(
        r#"{{
            "DeviceConnectionString": "HostName=hub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5",
            "EH_HOST": "ns.servicebus.windows.net",
            "EH_KEY_NAME": "iothubowner",
            "EH_KEY": "secret",
            "EH_COMP_NAME": "hub-compat",
            "EH_PARTITION_NUM": "{partitions}",
            "DataProtocol": "AMQP",
            "StartupDelayMs": 2000
        }}"#
    ))
    .unwrap()
}

fn address(partition: u32) -> String {
    format!("amqps://ns.servicebus.windows.net/hub-compat/ConsumerGroups/$Default/Partitions/{partition}")
}

fn connector(partitions: Vec<ScriptedPartition>) -> Arc<ScriptedConnector> {
    let connector = partitions
        .into_iter()
        .enumerate()
        .fold(ScriptedConnector::new(), |c, (i, p)| c.with_partition(address(i as u32), p));
    Arc::new(connector)
}

#[tokio::test(start_paused = true)]
async fn test_reply_on_one_partition_stops_all() {
    let connector = connector(vec![
        ScriptedPartition::default().deliver_at(Duration::from_millis(300), vec![data_delivery(1, "telemetry")]),
        ScriptedPartition::default().deliver_at(Duration::from_secs(2), vec![data_delivery(7, MARKER)]),
        ScriptedPartition::default(),
    ]);
    let sink = Arc::new(CollectorSink::new());
    let started = Instant::now();

    let report = EchoCoordinator::new(Arc::new(config(3)), connector.clone(), sink.clone())
        .run()
        .await;

    assert_eq!(report.outcome, Outcome::EchoReplyReceived);
    assert_eq!(report.partitions.len(), 3);
    for partition in &report.partitions {
        assert_eq!(partition.outcome, Outcome::EchoReplyReceived);
        assert!(partition.elapsed >= Duration::from_secs(2));
        assert!(partition.elapsed < Duration::from_millis(2100));
    }
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.partition(0).unwrap().received, 1);
    assert_eq!(report.partition(1).unwrap().received, 0);

    let replies = sink.messages_with_payload("echo response received successfully");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].property("partition"), Some("1"));
    assert!(sink.messages_with_payload("poll event hub time out").is_empty());

    let summary = sink.messages_with_payload("EchoReplyReceived");
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].property("partitions"), Some("3"));

    assert_eq!(connector.settled(&address(1)), vec![(7, Acknowledgement::Accept)]);
    for i in 0..3 {
        assert_eq!(connector.closed(&address(i)), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_marker_times_out_everywhere() {
    let connector = connector(vec![
        ScriptedPartition::default().deliver_at(Duration::from_secs(1), vec![data_delivery(1, "a"), data_delivery(2, "b")]),
        ScriptedPartition::default(),
    ]);
    let sink = Arc::new(CollectorSink::new());

    let report = EchoCoordinator::new(Arc::new(config(2)), connector, sink.clone()).run().await;

    assert_eq!(report.outcome, Outcome::Timeout);
    for partition in &report.partitions {
        assert_eq!(partition.outcome, Outcome::Timeout);
        assert!(partition.elapsed >= Duration::from_secs(10));
    }
    assert_eq!(report.total_received(), 2);
    assert_eq!(sink.messages_with_payload("poll event hub time out").len(), 2);
    assert_eq!(sink.messages_with_payload("Timeout")[0].property("PROBE_RESULT"), Some("Timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_failure_is_local_to_partition() {
    let connector = connector(vec![
        ScriptedPartition::default(),
        ScriptedPartition::failing(),
        ScriptedPartition::default(),
    ]);
    let settings = PollerSettings {
        deadline: Duration::from_secs(3),
        ..PollerSettings::default()
    };

    let report = EchoCoordinator::new(Arc::new(config(3)), connector.clone(), Arc::new(CollectorSink::new()))
        .with_settings(settings)
        .run()
        .await;

    assert_eq!(report.partition(1).unwrap().outcome, Outcome::ProtocolError);
    assert_eq!(report.partition(0).unwrap().outcome, Outcome::Timeout);
    assert_eq!(report.partition(2).unwrap().outcome, Outcome::Timeout);
    assert_eq!(report.outcome, Outcome::ProtocolError);
    assert_eq!(connector.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_failure_does_not_hide_reply() {
    let connector = connector(vec![
        ScriptedPartition::failing(),
        ScriptedPartition::default().deliver_at(Duration::from_secs(1), vec![data_delivery(1, MARKER)]),
    ]);

    let report = EchoCoordinator::new(Arc::new(config(2)), connector, Arc::new(CollectorSink::new()))
        .run()
        .await;

    assert_eq!(report.outcome, Outcome::EchoReplyReceived);
    assert_eq!(report.partition(0).unwrap().outcome, Outcome::ProtocolError);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_messages_are_rejected_and_polling_continues() {
    let connector = connector(vec![ScriptedPartition::default()
        .deliver_at(Duration::from_millis(100), vec![raw_delivery(1, vec![0xffu8, 0x00])])
        .deliver_at(Duration::from_millis(200), vec![data_delivery(2, MARKER)])]);
    let sink = Arc::new(CollectorSink::new());

    let report = EchoCoordinator::new(Arc::new(config(1)), connector.clone(), sink.clone())
        .run()
        .await;

    assert_eq!(report.outcome, Outcome::EchoReplyReceived);
    let partition = report.partition(0).unwrap();
    assert_eq!(partition.rejected, 1);
    assert_eq!(partition.received, 0);

    let settled = connector.settled(&address(0));
    assert!(matches!(&settled[0], (1, Acknowledgement::Reject { condition, .. })
        if condition == "Rejected due to failure reading AMQP message"));
    assert_eq!(settled[1], (2, Acknowledgement::Accept));
    assert_eq!(sink.messages_with_payload("messaging_delivery_rejected").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_probe_sends_after_startup_delay_then_polls() {
    let connector = connector(vec![
        ScriptedPartition::default().deliver_at(Duration::from_millis(500), vec![data_delivery(1, MARKER)]),
    ]);
    let sink = Arc::new(CollectorSink::new());
    let sender = Arc::new(RecordingSender::new(TransportProtocol::Amqp));
    let started = Instant::now();

    let mut source = config(1);
    let probe = EchoProbe::new(&source, sink.clone(), sender.clone(), connector.clone());
    source.partition_count = 8;
    assert_eq!(probe.config().partition_count, 1);

    let report = probe.run().await.unwrap();

    assert_eq!(report.outcome, Outcome::EchoReplyReceived);
    let waited = sender.sent_at()[0] - started;
    assert!(waited >= Duration::from_secs(2) && waited < Duration::from_millis(2010));

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, MARKER);
    assert_eq!(sent[0].property("REQUEST_PROTOCOL"), Some("AMQP"));

    let received = sink.received_messages();
    assert_eq!(received[0].payload_str(), Some(MARKER));
    assert_eq!(received[0].property("ECHOREQUEST"), Some(MARKER));
    assert_eq!(connector.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_probe_send_failure_skips_polling() {
    let connector = connector(vec![ScriptedPartition::default()]);
    let sender = Arc::new(RecordingSender::failing(TransportProtocol::Mqtt, "CONNACK 5"));

    let err = EchoProbe::new(&config(1), Arc::new(CollectorSink::new()), sender, connector.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Send { protocol: TransportProtocol::Mqtt, .. }));
    assert_eq!(connector.opened(), 0);
}
