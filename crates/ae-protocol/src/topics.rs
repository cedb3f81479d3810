//! MQTT topic builders for the thing topic hierarchy.
//!
//! Topic structure:
//! ```text
//! thing/{thing_name}/messages/
//! ```

const PREFIX: &str = "thing";

/// Default messages topic for a thing.
pub fn thing_messages(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/messages/")
}

/// Resolve the effective publish topic.
///
/// An explicit, non-empty topic wins; otherwise the topic is derived from
/// the thing name.
pub fn resolve(explicit: Option<&str>, thing_name: &str) -> String {
    match explicit {
        Some(topic) if !topic.is_empty() => topic.to_string(),
        _ => thing_messages(thing_name),
    }
}

/// Whether `topic` is usable as an MQTT publish topic name.
///
/// Publish topics must be non-empty, free of wildcards and NUL, and fit the
/// MQTT UTF-8 string length prefix.
pub fn is_valid_publish_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic.len() <= u16::MAX as usize
        && !topic.contains(['+', '#', '\0'])
}
