//! Configuration and publish-stage error types.

use ae_mqtt_channel::MqttError;
use ae_protocol::SettingKey;
use thiserror::Error;

/// Problems found while assembling the connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The host supplied no application settings at all. Fatal to startup.
    #[error("no application-specific settings found")]
    MissingSettings,

    /// A recognized setting is absent. Logged, not fatal.
    #[error("application setting '{key}' not found")]
    MissingField { key: SettingKey },

    /// An optional setting could not be parsed; its default was used.
    #[error("application setting '{key}' has invalid value '{value}'")]
    InvalidValue { key: SettingKey, value: String },
}

/// Failures of the MQTT publish stage. Each one terminates the current
/// event's pipeline and nothing else.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not connect to MQTT broker {host}:{port} as '{device}': {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        device: String,
        source: MqttError,
    },

    #[error("failed to publish to '{topic}' as '{device}': {source}")]
    PublishFailed {
        topic: String,
        device: String,
        source: MqttError,
    },
}

impl PublishError {
    /// The underlying transport error.
    pub fn transport(&self) -> &MqttError {
        match self {
            PublishError::ConnectionFailed { source, .. }
            | PublishError::PublishFailed { source, .. } => source,
        }
    }
}
