//! Shared test harness for E2E integration tests.
//!
//! Runs the settings loader and the publish stage against a `MockConnector`,
//! exercising real code paths across all crate boundaries.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use ae_export::{EventRecord, LoadedSettings, Publisher, SettingsLoader, StageOutcome};
use ae_mqtt_channel::{MockChannel, MockConnector};

/// Client certificate fixture shipped with the channel crate.
pub const FIXTURE_CERT: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../ae-mqtt-channel/tests/fixtures/client.pem"
);
/// Private key matching [`FIXTURE_CERT`].
pub const FIXTURE_KEY: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../ae-mqtt-channel/tests/fixtures/client.key"
);

/// Application settings as a hosting pipeline would supply them.
pub fn sample_settings() -> HashMap<String, String> {
    [
        ("AwsIoTMQTTHost", "abc123-ats.iot.us-east-1.amazonaws.com"),
        ("AwsIoTMQTTPort", "8883"),
        ("awsIoTThingName", "sensor42"),
        ("topic", ""),
        ("MQTTCert", FIXTURE_CERT),
        ("MQTTKey", FIXTURE_KEY),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Settings loader wired to a publisher over a shared mock broker.
pub struct TestHarness {
    pub loaded: LoadedSettings,
    pub publisher: Arc<Publisher<MockConnector>>,
}

impl TestHarness {
    /// Harness over [`sample_settings`].
    pub fn with_sample_settings() -> Self {
        Self::with_settings(&sample_settings())
    }

    /// Harness over arbitrary settings. Panics if the map is rejected.
    pub fn with_settings(settings: &HashMap<String, String>) -> Self {
        let loaded = SettingsLoader::new(tracing::Span::none())
            .load(Some(settings))
            .expect("settings map present");
        let publisher = Publisher::build(
            loaded.config.clone(),
            MockConnector::new(),
            tracing::Span::none(),
        );
        Self {
            loaded,
            publisher: Arc::new(publisher),
        }
    }

    /// The mock broker's recorded session.
    pub fn broker(&self) -> Arc<MockChannel> {
        self.publisher.connector().channel()
    }

    /// Number of connect attempts so far.
    pub fn connects(&self) -> usize {
        self.publisher.connector().connects()
    }

    /// Run one event through the stage, returning the outcome and the
    /// event context afterwards.
    pub async fn export(&self, payload: Option<&[u8]>) -> (StageOutcome, EventRecord) {
        let mut event = EventRecord::with_generated_id();
        let outcome = self.publisher.process(&mut event, payload).await;
        (outcome, event)
    }
}
