//! MQTT channel for AWS IoT Core publishing.
//!
//! Provides the transport half of AWS Export:
//! - `ConnectionConfig`, the immutable connection descriptor
//! - `Connector` / `Channel` traits (mockable in tests)
//! - `MqttConnector` / `MqttChannel` with mutual TLS for production
//! - `MockConnector` / `MockChannel` for testing without a broker

pub mod channel;
pub mod config;
pub mod error;
pub mod mock;
pub mod tls;

// Re-exports for convenience.
pub use channel::{Channel, Connector, MqttChannel, MqttConnector};
pub use config::{ConnectionConfig, DEFAULT_MAX_PACKET_SIZE, DEFAULT_PORT};
pub use error::{MqttError, MqttResult};
pub use mock::{MockChannel, MockConnector};
pub use rumqttc::QoS;
