//! E2E tests for the settings → publisher → broker flow.

mod helpers;

use ae_export::{EventContext, StageOutcome};
use rumqttc::QoS;
use serde_json::json;

use helpers::TestHarness;

/// A reading exported with the sample settings lands on the derived topic
/// unchanged, and the event carries it forward.
#[tokio::test]
async fn e2e_reading_reaches_derived_topic() {
    let h = TestHarness::with_sample_settings();
    assert!(h.loaded.problems.is_empty());
    assert_eq!(h.publisher.topic(), "thing/sensor42/messages/");

    let reading = serde_json::to_vec(&json!({
        "device": "Random-Integer-Generator01",
        "origin": 1_700_000_000_000u64,
        "readings": [{ "name": "RandomValue_Int8", "value": "-42" }]
    }))
    .unwrap();

    let (outcome, mut event) = h.export(Some(reading.as_slice())).await;

    let StageOutcome::Forward(forwarded) = outcome else {
        panic!("expected forward, got {outcome:?}");
    };
    assert_eq!(forwarded, reading);
    assert_eq!(event.response(), reading.as_slice());
    event.complete(forwarded);
    assert_eq!(event.completed(), Some(reading.as_slice()));

    let sent = h.broker().published_to("thing/sensor42/messages/");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, reading);
    assert_eq!(sent[0].qos, QoS::AtLeastOnce);
}

/// An explicit topic setting overrides the derived one.
#[tokio::test]
async fn e2e_explicit_topic_wins() {
    let mut settings = helpers::sample_settings();
    settings.insert("topic".into(), "dt/plant-7/telemetry".into());
    let h = TestHarness::with_settings(&settings);

    let (outcome, _) = h.export(Some(b"{}")).await;
    assert!(outcome.consumed());

    assert_eq!(h.broker().published_to("dt/plant-7/telemetry").len(), 1);
    assert!(h.broker().published_to("thing/sensor42/messages/").is_empty());
}

/// An event with no payload is absorbed without ever connecting.
#[tokio::test]
async fn e2e_missing_payload_is_absorbed() {
    let h = TestHarness::with_sample_settings();

    let (outcome, event) = h.export(None).await;

    assert!(matches!(outcome, StageOutcome::Absorbed));
    assert!(event.response().is_empty());
    assert_eq!(h.connects(), 0);
    assert!(h.broker().published().is_empty());
}

/// An empty payload is still a payload: it is published.
#[tokio::test]
async fn e2e_empty_payload_is_published() {
    let h = TestHarness::with_sample_settings();

    let (outcome, _) = h.export(Some(b"")).await;

    assert_eq!(outcome.payload(), Some(&b""[..]));
    assert_eq!(h.broker().published().len(), 1);
}

/// A stream of events shares one session.
#[tokio::test]
async fn e2e_stream_uses_one_session() {
    let h = TestHarness::with_sample_settings();

    for i in 0..10 {
        let payload = format!(r#"{{"seq":{i}}}"#);
        let (outcome, _) = h.export(Some(payload.as_bytes())).await;
        assert!(outcome.consumed());
    }

    assert_eq!(h.connects(), 1);
    let sent = h.broker().published();
    assert_eq!(sent.len(), 10);
    assert_eq!(sent[9].payload, br#"{"seq":9}"#);
}

/// The publisher receives exactly the descriptor the loader produced.
#[tokio::test]
async fn e2e_loader_config_reaches_connector() {
    let mut settings = helpers::sample_settings();
    settings.insert("AwsIoTMQTTPort".into(), "443".into());
    let h = TestHarness::with_settings(&settings);

    h.publisher.connect().await.unwrap();

    let configs = h.publisher.connector().configs();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0], h.loaded.config);
    assert_eq!(configs[0].broker_port, 443);
    assert_eq!(configs[0].device_identity, "sensor42");
    assert_eq!(configs[0].certificate_file_path, helpers::FIXTURE_CERT);
}
