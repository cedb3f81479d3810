//! Application setting names shared with the hosting pipeline.
//!
//! The names are an integration contract with the settings source and are
//! matched case-sensitively.

use std::fmt;

/// A recognized application setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// AWS IoT endpoint hostname.
    Host,
    /// Broker port, parsed as an integer.
    Port,
    /// IoT thing name (MQTT client id).
    ThingName,
    /// Explicit publish topic.
    Topic,
    /// Path to the client certificate (PEM).
    CertificatePath,
    /// Path to the client private key (PEM).
    PrivateKeyPath,
    /// Path to the root CA certificate (PEM).
    CaCertificatePath,
    /// Disable server certificate validation ("true"/"false").
    SkipCertVerify,
}

impl SettingKey {
    /// Keys the loader reports as missing when absent.
    pub const RECOGNIZED: [SettingKey; 6] = [
        SettingKey::Host,
        SettingKey::Port,
        SettingKey::ThingName,
        SettingKey::Topic,
        SettingKey::CertificatePath,
        SettingKey::PrivateKeyPath,
    ];

    /// Keys that silently fall back to a default when absent.
    pub const OPTIONAL: [SettingKey; 2] =
        [SettingKey::CaCertificatePath, SettingKey::SkipCertVerify];

    /// The exact setting name.
    pub const fn name(self) -> &'static str {
        match self {
            SettingKey::Host => "AwsIoTMQTTHost",
            SettingKey::Port => "AwsIoTMQTTPort",
            SettingKey::ThingName => "awsIoTThingName",
            SettingKey::Topic => "topic",
            SettingKey::CertificatePath => "MQTTCert",
            SettingKey::PrivateKeyPath => "MQTTKey",
            SettingKey::CaCertificatePath => "CaCertPath",
            SettingKey::SkipCertVerify => "SkipCertVerify",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
