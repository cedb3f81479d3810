//! MQTT channel: async client for AWS IoT Core publishing.
//!
//! Wraps `rumqttc::AsyncClient` behind the `Connector` / `Channel` traits.
//! `MqttConnector::connect` waits for the broker's CONNACK, then hands the
//! event loop to a background task that reports acknowledgements and link
//! failures back to the channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use ae_protocol::topics;

use crate::config::ConnectionConfig;
use crate::error::{MqttError, MqttResult};
use crate::tls;

/// Request channel capacity between `AsyncClient` and the event loop.
const REQUEST_CAPACITY: usize = 64;

// ── Traits ────────────────────────────────────────────────────

/// A live MQTT session.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a raw payload to a topic, returning once the broker has
    /// acknowledged it (QoS 1 and 2) or it has been queued (QoS 0).
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> MqttResult<()>;

    /// Whether the underlying link is still usable.
    fn is_connected(&self) -> bool;

    /// Disconnect from the broker.
    async fn close(&self) -> MqttResult<()>;
}

/// Opens MQTT sessions for a connection descriptor.
#[async_trait]
pub trait Connector: Send + Sync {
    type Channel: Channel;

    /// Establish a session. Returns once the broker accepted the connection.
    async fn connect(&self, config: &ConnectionConfig) -> MqttResult<Self::Channel>;
}

#[async_trait]
impl<T: Channel + ?Sized> Channel for Arc<T> {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> MqttResult<()> {
        (**self).publish(topic, payload, qos, retain).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn close(&self) -> MqttResult<()> {
        (**self).close().await
    }
}

// ── MqttConnector ─────────────────────────────────────────────

/// Connector for AWS IoT Core over mutual TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

#[async_trait]
impl Connector for MqttConnector {
    type Channel = MqttChannel;

    async fn connect(&self, config: &ConnectionConfig) -> MqttResult<MqttChannel> {
        MqttChannel::connect(config).await
    }
}

// ── MqttChannel ───────────────────────────────────────────────

/// Link notifications forwarded by the event loop task.
#[derive(Debug)]
enum LinkEvent {
    /// PUBACK (QoS 1) or PUBCOMP (QoS 2) for the given packet id.
    Acked(u16),
    /// The event loop failed; the session is dead.
    Failed(String),
    /// A clean disconnect was sent.
    Closed,
}

/// MQTT channel connected to AWS IoT Core.
///
/// Owns the `AsyncClient` and the task driving its `EventLoop`. One publish
/// is in flight at a time, so the next acknowledgement belongs to it.
pub struct MqttChannel {
    client: AsyncClient,
    events: Mutex<mpsc::UnboundedReceiver<LinkEvent>>,
    connected: Arc<AtomicBool>,
    publish_timeout: Duration,
    driver: JoinHandle<()>,
}

impl MqttChannel {
    /// Connect with mTLS and wait for the broker's CONNACK.
    pub async fn connect(config: &ConnectionConfig) -> MqttResult<Self> {
        let options = mqtt_options(config)?;
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        tokio::time::timeout(config.connect_timeout(), wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| {
                MqttError::Timeout(format!(
                    "no CONNACK from {} within {:?}",
                    config.endpoint(),
                    config.connect_timeout()
                ))
            })??;

        tracing::info!(
            endpoint = %config.endpoint(),
            client_id = %config.device_identity,
            "MQTT connected"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let driver = tokio::spawn(drive(eventloop, tx, connected.clone()));

        Ok(Self {
            client,
            events: Mutex::new(rx),
            connected,
            publish_timeout: config.publish_timeout(),
            driver,
        })
    }
}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> MqttResult<()> {
        if !topics::is_valid_publish_topic(topic) {
            return Err(MqttError::InvalidTopic(topic.to_string()));
        }

        let mut events = self.events.lock().await;

        // Anything still queued is stale: a late ack or a link failure.
        while let Ok(event) = events.try_recv() {
            match event {
                LinkEvent::Acked(pkid) => tracing::debug!(pkid, "discarding stale ack"),
                LinkEvent::Failed(reason) => return Err(MqttError::Connection(reason)),
                LinkEvent::Closed => return Err(MqttError::Closed),
            }
        }
        if !self.is_connected() {
            return Err(MqttError::Closed);
        }

        self.client
            .publish(topic, qos, retain, payload.to_vec())
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))?;

        if qos == QoS::AtMostOnce {
            return Ok(());
        }

        match tokio::time::timeout(self.publish_timeout, events.recv()).await {
            Ok(Some(LinkEvent::Acked(pkid))) => {
                tracing::trace!(pkid, topic, "publish acknowledged");
                Ok(())
            }
            Ok(Some(LinkEvent::Failed(reason))) => Err(MqttError::Connection(reason)),
            Ok(Some(LinkEvent::Closed)) | Ok(None) => Err(MqttError::Closed),
            Err(_) => Err(MqttError::Timeout(format!(
                "no acknowledgement for '{topic}' within {:?}",
                self.publish_timeout
            ))),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.driver.is_finished()
    }

    async fn close(&self) -> MqttResult<()> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::Connection(e.to_string()))
    }
}

impl Drop for MqttChannel {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

// ── Internal helpers ──────────────────────────────────────────

fn mqtt_options(config: &ConnectionConfig) -> MqttResult<MqttOptions> {
    if config.broker_host.is_empty() {
        return Err(MqttError::Connection("broker host is not configured".into()));
    }
    // rumqttc rejects empty or space-prefixed client ids by panicking.
    if config.device_identity.is_empty() || config.device_identity.starts_with(' ') {
        return Err(MqttError::Connection(format!(
            "invalid device identity '{}'",
            config.device_identity
        )));
    }

    let mut options = MqttOptions::new(
        &config.device_identity,
        &config.broker_host,
        config.broker_port,
    );
    options.set_keep_alive(config.keepalive());
    options.set_max_packet_size(config.max_packet_size, config.max_packet_size);
    options.set_transport(tls::load_tls_transport(config)?);
    Ok(options)
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> MqttResult<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(MqttError::Connection(format!(
                        "broker refused connection: {code:?}"
                    ))),
                };
            }
            Ok(_) => {}
            Err(e) => return Err(MqttError::Connection(e.to_string())),
        }
    }
}

/// Drive the event loop until the link fails or is closed.
///
/// rumqttc would reconnect on the next poll after an error; instead the task
/// ends and the owner builds a fresh session.
async fn drive(
    mut eventloop: EventLoop,
    events: mpsc::UnboundedSender<LinkEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                let _ = events.send(LinkEvent::Acked(ack.pkid));
            }
            Ok(Event::Incoming(Packet::PubComp(comp))) => {
                let _ = events.send(LinkEvent::Acked(comp.pkid));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Release);
                let _ = events.send(LinkEvent::Closed);
                tracing::debug!("MQTT disconnected");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Release);
                tracing::warn!(error = %e, "MQTT connection lost");
                let _ = events.send(LinkEvent::Failed(e.to_string()));
                break;
            }
        }
    }
}
