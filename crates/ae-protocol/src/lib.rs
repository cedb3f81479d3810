//! Shared vocabulary for AWS Export: application-setting keys and MQTT
//! topic naming.

pub mod settings;
pub mod topics;

pub use settings::SettingKey;
