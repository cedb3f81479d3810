//! MQTT channel error types.

use thiserror::Error;

/// Errors that can occur during MQTT operations.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("publish error: {0}")]
    Publish(String),

    /// Rejected locally before anything was written to the link.
    #[error("invalid publish topic '{0}'")]
    InvalidTopic(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection closed")]
    Closed,
}

impl MqttError {
    /// Whether the error means the link itself is unusable, as opposed to a
    /// single rejected or unacknowledged publish.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            MqttError::Connection(_) | MqttError::Tls(_) | MqttError::Closed
        )
    }

    /// Whether the request was refused before touching the link, which is
    /// therefore still healthy.
    pub fn is_local_rejection(&self) -> bool {
        matches!(self, MqttError::InvalidTopic(_))
    }
}

/// Convenience alias for MQTT results.
pub type MqttResult<T> = Result<T, MqttError>;
