//! Typed pipeline stage interface.
//!
//! The hosting pipeline hands each stage an event context and at most one
//! payload. A stage answers with a [`StageOutcome`]; `Failed` stops the
//! remaining stages for that event only.

use uuid::Uuid;

use crate::error::PublishError;

/// Per-event services offered by the hosting pipeline.
pub trait EventContext: Send {
    /// Correlation id of the event being processed.
    fn correlation_id(&self) -> &str;

    /// Append bytes to the pipeline's response buffer.
    fn append_response(&mut self, payload: &[u8]);

    /// Mark the event complete with its final payload.
    fn complete(&mut self, payload: Vec<u8>);
}

/// Result of one stage invocation.
#[derive(Debug)]
pub enum StageOutcome {
    /// Payload consumed; forward it to the next stage.
    Forward(Vec<u8>),
    /// Nothing to do for this event. Not an error.
    Absorbed,
    /// Terminating error for this event.
    Failed(PublishError),
}

impl StageOutcome {
    /// Whether the stage consumed the payload.
    pub fn consumed(&self) -> bool {
        matches!(self, StageOutcome::Forward(_))
    }

    /// Whether the pipeline must skip the remaining stages.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }

    /// Forwarded payload, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            StageOutcome::Forward(payload) => Some(payload.as_slice()),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Option<Vec<u8>>, PublishError> {
        match self {
            StageOutcome::Forward(payload) => Ok(Some(payload)),
            StageOutcome::Absorbed => Ok(None),
            StageOutcome::Failed(e) => Err(e),
        }
    }
}

/// In-memory event context.
#[derive(Debug, Clone, Default)]
pub struct EventRecord {
    correlation_id: String,
    response: Vec<u8>,
    completed: Option<Vec<u8>>,
}

impl EventRecord {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..Self::default()
        }
    }

    /// Context with a fresh time-ordered correlation id.
    pub fn with_generated_id() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }

    /// Accumulated response buffer.
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Final payload, once completed.
    pub fn completed(&self) -> Option<&[u8]> {
        self.completed.as_deref()
    }
}

impl EventContext for EventRecord {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn append_response(&mut self, payload: &[u8]) {
        self.response.extend_from_slice(payload);
    }

    fn complete(&mut self, payload: Vec<u8>) {
        self.completed = Some(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_mqtt_channel::MqttError;

    #[test]
    fn outcome_classification() {
        let forward = StageOutcome::Forward(b"{}".to_vec());
        assert!(forward.consumed());
        assert!(!forward.is_terminal());
        assert_eq!(forward.payload(), Some(&b"{}"[..]));

        let absorbed = StageOutcome::Absorbed;
        assert!(!absorbed.consumed());
        assert!(!absorbed.is_terminal());
        assert!(absorbed.into_result().unwrap().is_none());

        let failed = StageOutcome::Failed(PublishError::PublishFailed {
            topic: "t".into(),
            device: "d".into(),
            source: MqttError::Closed,
        });
        assert!(!failed.consumed());
        assert!(failed.is_terminal());
        assert!(failed.into_result().is_err());
    }

    #[test]
    fn record_accumulates_responses() {
        let mut event = EventRecord::new("corr-1");
        event.append_response(b"abc");
        event.append_response(b"def");
        assert_eq!(event.correlation_id(), "corr-1");
        assert_eq!(event.response(), b"abcdef");
        assert!(event.completed().is_none());

        event.complete(b"abcdef".to_vec());
        assert_eq!(event.completed(), Some(&b"abcdef"[..]));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = EventRecord::with_generated_id();
        let b = EventRecord::with_generated_id();
        assert_ne!(a.correlation_id(), b.correlation_id());
        assert!(Uuid::parse_str(a.correlation_id()).is_ok());
    }
}
