//! Application-settings loader.
//!
//! Assembles a [`ConnectionConfig`] from the flat settings map supplied by
//! the hosting pipeline. Missing settings are collected and logged, never
//! fatal on their own; only a missing map aborts loading.

use std::collections::HashMap;

use ae_mqtt_channel::ConnectionConfig;
use ae_protocol::SettingKey;
use tracing::Span;

use crate::error::ConfigError;

/// The assembled descriptor plus every problem found on the way.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub config: ConnectionConfig,
    /// `MissingField` and `InvalidValue` entries, in key order.
    pub problems: Vec<ConfigError>,
}

impl LoadedSettings {
    /// Keys reported missing.
    pub fn missing_keys(&self) -> Vec<SettingKey> {
        self.problems
            .iter()
            .filter_map(|p| match p {
                ConfigError::MissingField { key } => Some(*key),
                _ => None,
            })
            .collect()
    }
}

/// Loads connection settings, logging under an injected span.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    span: Span,
}

impl SettingsLoader {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Assemble the connection descriptor.
    ///
    /// Fails only with [`ConfigError::MissingSettings`] when `settings` is
    /// `None`. Emits one debug event per resolved setting and one error
    /// event per missing recognized setting.
    pub fn load(
        &self,
        settings: Option<&HashMap<String, String>>,
    ) -> Result<LoadedSettings, ConfigError> {
        let Some(settings) = settings else {
            tracing::error!(parent: &self.span, "no application-specific settings found");
            return Err(ConfigError::MissingSettings);
        };

        let mut problems = Vec::new();
        let mut required = |key: SettingKey| self.required(settings, key, &mut problems);

        let broker_host = required(SettingKey::Host);
        let raw_port = required(SettingKey::Port);
        let device_identity = required(SettingKey::ThingName);
        let topic = required(SettingKey::Topic);
        let certificate_file_path = required(SettingKey::CertificatePath);
        let private_key_file_path = required(SettingKey::PrivateKeyPath);

        let broker_port = ConnectionConfig::parse_port(&raw_port);
        let port_valid = matches!(raw_port.trim().parse::<u16>(), Ok(port) if port != 0);
        if !raw_port.is_empty() && !port_valid {
            tracing::warn!(
                parent: &self.span,
                setting = %SettingKey::Port,
                value = %raw_port,
                fallback = broker_port,
                "invalid port, using default"
            );
            problems.push(ConfigError::InvalidValue {
                key: SettingKey::Port,
                value: raw_port.clone(),
            });
        }

        let ca_certificate_file_path = self
            .optional(settings, SettingKey::CaCertificatePath)
            .filter(|path| !path.is_empty())
            .map(str::to_string);

        let skip_server_verification = match self.optional(settings, SettingKey::SkipCertVerify) {
            None => false,
            Some(raw) => parse_flag(raw).unwrap_or_else(|| {
                tracing::warn!(
                    parent: &self.span,
                    setting = %SettingKey::SkipCertVerify,
                    value = %raw,
                    "invalid flag, keeping server verification on"
                );
                problems.push(ConfigError::InvalidValue {
                    key: SettingKey::SkipCertVerify,
                    value: raw.to_string(),
                });
                false
            }),
        };

        let mut config = ConnectionConfig::new(broker_host, device_identity)
            .with_client_auth(certificate_file_path, private_key_file_path);
        config.broker_port = broker_port;
        config.topic = (!topic.is_empty()).then_some(topic);
        config.ca_certificate_file_path = ca_certificate_file_path;
        config.skip_server_verification = skip_server_verification;

        Ok(LoadedSettings { config, problems })
    }

    fn required(
        &self,
        settings: &HashMap<String, String>,
        key: SettingKey,
        problems: &mut Vec<ConfigError>,
    ) -> String {
        match settings.get(key.name()) {
            Some(value) => {
                tracing::debug!(
                    parent: &self.span,
                    setting = %key,
                    value = %value,
                    "application setting resolved"
                );
                value.clone()
            }
            None => {
                tracing::error!(
                    parent: &self.span,
                    setting = %key,
                    "application setting not found"
                );
                problems.push(ConfigError::MissingField { key });
                String::new()
            }
        }
    }

    fn optional<'a>(
        &self,
        settings: &'a HashMap<String, String>,
        key: SettingKey,
    ) -> Option<&'a str> {
        let value = settings.get(key.name()).map(String::as_str);
        match value {
            Some(value) => tracing::debug!(
                parent: &self.span,
                setting = %key,
                value = %value,
                "application setting resolved"
            ),
            None => tracing::debug!(parent: &self.span, setting = %key, "optional setting not set"),
        }
        value
    }
}

/// Load settings with events attached to the current span.
pub fn load(settings: Option<&HashMap<String, String>>) -> Result<LoadedSettings, ConfigError> {
    SettingsLoader::new(Span::current()).load(settings)
}

fn parse_flag(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") || raw == "1" {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") || raw == "0" || raw.is_empty() {
        Some(false)
    } else {
        None
    }
}
