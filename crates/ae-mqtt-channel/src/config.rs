use std::time::Duration;

use serde::Deserialize;

/// Default AWS IoT Core MQTT-over-TLS port.
pub const DEFAULT_PORT: u16 = 8883;

/// Largest MQTT packet sent or accepted: AWS IoT Core's 128 KiB payload
/// limit plus room for the fixed header and topic.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 132 * 1024;

/// MQTT connection descriptor for one thing, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// MQTT broker hostname (e.g., AWS IoT endpoint).
    pub broker_host: String,
    /// MQTT broker port (default 8883 for TLS).
    #[serde(default = "default_port")]
    pub broker_port: u16,
    /// Thing name, used as the MQTT client ID.
    pub device_identity: String,
    /// Explicit publish topic. Derived from the thing name when absent.
    #[serde(default)]
    pub topic: Option<String>,
    /// Path to device X.509 certificate (PEM).
    #[serde(default)]
    pub certificate_file_path: String,
    /// Path to device private key (PEM).
    #[serde(default)]
    pub private_key_file_path: String,
    /// Path to CA certificate (e.g., AmazonRootCA1.pem). Native roots when absent.
    #[serde(default)]
    pub ca_certificate_file_path: Option<String>,
    /// Skip server certificate chain validation. Test brokers only.
    #[serde(default)]
    pub skip_server_verification: bool,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Upper bound on TCP connect + TLS handshake + CONNACK.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Upper bound on waiting for a publish acknowledgement.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
    /// Retain flag for published messages.
    #[serde(default)]
    pub retain: bool,
    /// Upper bound on a single MQTT packet, in bytes, in either direction.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_keepalive() -> u16 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_publish_timeout() -> u64 {
    10
}

fn default_max_packet_size() -> usize {
    DEFAULT_MAX_PACKET_SIZE
}

impl ConnectionConfig {
    /// Config with every optional field at its default.
    pub fn new(broker_host: impl Into<String>, device_identity: impl Into<String>) -> Self {
        Self {
            broker_host: broker_host.into(),
            broker_port: DEFAULT_PORT,
            device_identity: device_identity.into(),
            topic: None,
            certificate_file_path: String::new(),
            private_key_file_path: String::new(),
            ca_certificate_file_path: None,
            skip_server_verification: false,
            keepalive_secs: default_keepalive(),
            connect_timeout_secs: default_connect_timeout(),
            publish_timeout_secs: default_publish_timeout(),
            retain: false,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    /// Attach the client certificate and key paths.
    pub fn with_client_auth(
        mut self,
        certificate_file_path: impl Into<String>,
        private_key_file_path: impl Into<String>,
    ) -> Self {
        self.certificate_file_path = certificate_file_path.into();
        self.private_key_file_path = private_key_file_path.into();
        self
    }

    /// Parse a port setting, falling back to [`DEFAULT_PORT`] for anything
    /// that is not an integer in 1..=65535.
    pub fn parse_port(raw: &str) -> u16 {
        match raw.trim().parse::<u16>() {
            Ok(0) | Err(_) => DEFAULT_PORT,
            Ok(port) => port,
        }
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.into())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// `host:port`, for logs and error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }
}
