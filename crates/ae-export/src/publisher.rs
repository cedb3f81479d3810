//! MQTT publish stage.
//!
//! Owns at most one live MQTT session for a [`ConnectionConfig`] and
//! publishes one payload per pipeline event. The session slot sits behind a
//! single async mutex held for connect, write, and acknowledgement, so
//! publishes never interleave on the wire and only one connect attempt runs
//! at a time.

use ae_mqtt_channel::{Channel, ConnectionConfig, Connector, MqttError, QoS};
use ae_protocol::topics;
use tokio::sync::Mutex;
use tracing::Span;

use crate::error::PublishError;
use crate::pipeline::{EventContext, StageOutcome};

/// Publishes pipeline payloads to the configured thing topic.
pub struct Publisher<C: Connector> {
    config: ConnectionConfig,
    topic: String,
    connector: C,
    channel: Mutex<Option<C::Channel>>,
    span: Span,
}

impl<C: Connector> Publisher<C> {
    /// Assemble a publisher. No network I/O happens here.
    pub fn build(config: ConnectionConfig, connector: C, span: Span) -> Self {
        let topic = topics::resolve(config.topic.as_deref(), &config.device_identity);
        tracing::debug!(
            parent: &span,
            topic = %topic,
            endpoint = %config.endpoint(),
            client_id = %config.device_identity,
            "MQTT publisher built"
        );
        if !topics::is_valid_publish_topic(&topic) {
            tracing::warn!(
                parent: &span,
                topic = %topic,
                "topic is not a valid publish topic, every publish will fail"
            );
        }

        Self {
            config,
            topic,
            connector,
            channel: Mutex::new(None),
            span,
        }
    }

    /// The effective publish topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether a live session is currently held.
    pub async fn is_connected(&self) -> bool {
        self.channel
            .lock()
            .await
            .as_ref()
            .is_some_and(|channel| channel.is_connected())
    }

    /// Establish the session eagerly. A no-op when already connected.
    pub async fn connect(&self) -> Result<(), PublishError> {
        let mut slot = self.channel.lock().await;
        self.ensure_connected(&mut slot).await
    }

    /// Pipeline stage entry point.
    ///
    /// `None` means the upstream stage produced nothing; the event is
    /// absorbed without touching the network.
    pub async fn process(
        &self,
        ctx: &mut dyn EventContext,
        payload: Option<&[u8]>,
    ) -> StageOutcome {
        let Some(payload) = payload else {
            tracing::debug!(
                parent: &self.span,
                correlation_id = %ctx.correlation_id(),
                "no payload received, nothing to export"
            );
            return StageOutcome::Absorbed;
        };

        match self.publish(payload).await {
            Ok(()) => {
                ctx.append_response(payload);
                tracing::debug!(
                    parent: &self.span,
                    correlation_id = %ctx.correlation_id(),
                    topic = %self.topic,
                    bytes = payload.len(),
                    "sent data to MQTT broker"
                );
                StageOutcome::Forward(payload.to_vec())
            }
            Err(e) => {
                tracing::error!(
                    parent: &self.span,
                    correlation_id = %ctx.correlation_id(),
                    error = %e,
                    "MQTT export failed"
                );
                StageOutcome::Failed(e)
            }
        }
    }

    /// Publish one payload at QoS 1, connecting first if needed.
    ///
    /// A failure that reached the link drops the session so the next call
    /// starts fresh. An invalid topic fails without connecting.
    pub async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
        if !topics::is_valid_publish_topic(&self.topic) {
            return Err(self.publish_failed(MqttError::InvalidTopic(self.topic.clone())));
        }

        let mut slot = self.channel.lock().await;
        self.ensure_connected(&mut slot).await?;

        let Some(channel) = slot.as_ref() else {
            return Err(self.connection_failed(MqttError::Closed));
        };
        let result = channel
            .publish(&self.topic, payload, QoS::AtLeastOnce, self.config.retain)
            .await;

        let Err(e) = result else {
            return Ok(());
        };

        if !e.is_local_rejection() {
            tracing::debug!(parent: &self.span, error = %e, "dropping MQTT session");
            if let Some(channel) = slot.take() {
                let _ = channel.close().await;
            }
        }

        Err(if e.is_connection_error() {
            self.connection_failed(e)
        } else {
            self.publish_failed(e)
        })
    }

    /// Close the session, if any. Later publishes reconnect.
    pub async fn close(&self) {
        let Some(channel) = self.channel.lock().await.take() else {
            return;
        };
        match channel.close().await {
            Ok(()) => tracing::info!(parent: &self.span, "MQTT connection closed"),
            Err(e) => tracing::warn!(
                parent: &self.span,
                error = %e,
                "error while closing MQTT connection"
            ),
        }
    }

    async fn ensure_connected(&self, slot: &mut Option<C::Channel>) -> Result<(), PublishError> {
        if slot.as_ref().is_some_and(|channel| channel.is_connected()) {
            return Ok(());
        }
        if let Some(stale) = slot.take() {
            tracing::info!(parent: &self.span, "MQTT connection lost, reconnecting");
            let _ = stale.close().await;
        }

        tracing::info!(
            parent: &self.span,
            endpoint = %self.config.endpoint(),
            client_id = %self.config.device_identity,
            "connecting to MQTT broker"
        );

        let timeout = self.config.connect_timeout();
        let channel = match tokio::time::timeout(timeout, self.connector.connect(&self.config))
            .await
        {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => return Err(self.connection_failed(e)),
            Err(_) => {
                return Err(self.connection_failed(MqttError::Timeout(format!(
                    "connect did not complete within {timeout:?}"
                ))));
            }
        };

        tracing::info!(parent: &self.span, topic = %self.topic, "connected to MQTT broker");
        *slot = Some(channel);
        Ok(())
    }

    fn connection_failed(&self, source: MqttError) -> PublishError {
        PublishError::ConnectionFailed {
            host: self.config.broker_host.clone(),
            port: self.config.broker_port,
            device: self.config.device_identity.clone(),
            source,
        }
    }

    fn publish_failed(&self, source: MqttError) -> PublishError {
        PublishError::PublishFailed {
            topic: self.topic.clone(),
            device: self.config.device_identity.clone(),
            source,
        }
    }
}
