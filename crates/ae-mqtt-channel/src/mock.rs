//! Mock MQTT connector and channel for testing without a real broker.
//!
//! Records every connect and publish for assertion in tests. The channel
//! also behaves like a broker that rejects overlapping frames: a publish that
//! starts while another is still in flight fails and is counted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::QoS;

use crate::channel::{Channel, Connector};
use crate::config::ConnectionConfig;
use crate::error::{MqttError, MqttResult};

/// A recorded publish call.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock implementation of the `Channel` trait.
///
/// Thread-safe via `Mutex` (fine for test contexts).
pub struct MockChannel {
    published: Mutex<Vec<PublishedMessage>>,
    connected: AtomicBool,
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
    closes: AtomicUsize,
    publish_delay: Mutex<Option<Duration>>,
    publish_failure: Mutex<Option<MqttError>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            publish_delay: Mutex::new(None),
            publish_failure: Mutex::new(None),
        }
    }

    /// Get all published messages.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Get the last published message.
    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().unwrap().last().cloned()
    }

    /// Get published messages for a specific topic.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Number of publishes that started while another was in flight.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Hold every publish "on the wire" for `delay` before acknowledging.
    pub fn set_publish_delay(&self, delay: Duration) {
        *self.publish_delay.lock().unwrap() = Some(delay);
    }

    /// Fail the next publish with `error`.
    pub fn fail_next_publish(&self, error: MqttError) {
        *self.publish_failure.lock().unwrap() = Some(error);
    }

    /// Simulate the broker dropping the link.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Clear all recorded state.
    pub fn reset(&self) {
        self.published.lock().unwrap().clear();
        self.overlaps.store(0, Ordering::SeqCst);
        self.closes.store(0, Ordering::SeqCst);
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> MqttResult<()> {
        if !self.is_connected() {
            return Err(MqttError::Closed);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
            return Err(MqttError::Publish("overlapping publish rejected".into()));
        }

        let delay = *self.publish_delay.lock().unwrap();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let failure = self.publish_failure.lock().unwrap().take();
        let result = match failure {
            Some(error) => Err(error),
            None => {
                self.published.lock().unwrap().push(PublishedMessage {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                    qos,
                    retain,
                });
                Ok(())
            }
        };

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> MqttResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock implementation of the `Connector` trait.
///
/// Every successful connect hands out the same shared `MockChannel`, so
/// publishes can be asserted across reconnects.
pub struct MockConnector {
    channel: Arc<MockChannel>,
    connects: AtomicUsize,
    configs: Mutex<Vec<ConnectionConfig>>,
    connect_delay: Mutex<Option<Duration>>,
    connect_failures: Mutex<Vec<MqttError>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(MockChannel::new()),
            connects: AtomicUsize::new(0),
            configs: Mutex::new(Vec::new()),
            connect_delay: Mutex::new(None),
            connect_failures: Mutex::new(Vec::new()),
        }
    }

    /// The shared channel handed out by `connect`.
    pub fn channel(&self) -> Arc<MockChannel> {
        self.channel.clone()
    }

    /// Number of connect attempts, successful or not.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Configs passed to `connect`, in order.
    pub fn configs(&self) -> Vec<ConnectionConfig> {
        self.configs.lock().unwrap().clone()
    }

    /// Delay every connect attempt by `delay`.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    /// Fail the next connect attempt with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next_connect(&self, error: MqttError) {
        self.connect_failures.lock().unwrap().push(error);
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Channel = Arc<MockChannel>;

    async fn connect(&self, config: &ConnectionConfig) -> MqttResult<Arc<MockChannel>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().push(config.clone());

        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = {
            let mut failures = self.connect_failures.lock().unwrap();
            (!failures.is_empty()).then(|| failures.remove(0))
        };
        if let Some(error) = failure {
            return Err(error);
        }

        self.channel.reconnect();
        Ok(self.channel.clone())
    }
}
