//! Error taxonomy for the runtime.
//!
//! Fallible functions return `anyhow::Result`; categorised failures are
//! [`StreamsError`] values carried inside the `anyhow::Error`, so callers can
//! tell them apart with `downcast_ref::<StreamsError>()`.

use crate::types::{Offset, Timestamp};
use thiserror::Error;

/// Which half of a record failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageComponent {
    Key,
    Value,
}

impl std::fmt::Display for MessageComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageComponent::Key => f.write_str("key"),
            MessageComponent::Value => f.write_str("value"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StreamsError {
    /// Fatal misconfiguration: missing codec, duplicate store, unknown topic.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A thread state transition that the transition table forbids.
    #[error("unexpected state transition from {from} to {to}")]
    IllegalStateTransition { from: String, to: String },

    /// A record could not be decoded and the handler answered FAIL.
    #[error(
        "error during {component} deserialization [topic:{topic}|partition:{partition}|offset:{offset}|timestamp:{timestamp}]: {source}"
    )]
    Deserialization {
        component: MessageComponent,
        topic: String,
        partition: u32,
        offset: Offset,
        timestamp: Timestamp,
        #[source]
        source: anyhow::Error,
    },

    /// The requested store is not locally available right now. Retriable.
    #[error("invalid state store: {0}")]
    InvalidStateStore(String),

    /// A store operation failed (flush, close, write on a closed store).
    #[error("processor state error: {0}")]
    ProcessorState(String),

    /// Failure reported by the log transport client.
    #[error("transport error: {0}")]
    Transport(String),
}

impl StreamsError {
    /// Only store unavailability is expected to clear up on retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StreamsError::InvalidStateStore(_))
    }
}

/// Look through an `anyhow::Error` for a [`StreamsError`].
pub fn streams_error(err: &anyhow::Error) -> Option<&StreamsError> {
    err.downcast_ref::<StreamsError>()
}

/// Run `op` on every item, remember the first failure, and re-raise it only
/// after all items were attempted.
pub(crate) fn attempt_all<T, F>(items: impl IntoIterator<Item = T>, mut op: F) -> anyhow::Result<()>
where
    F: FnMut(T) -> anyhow::Result<()>,
{
    let mut first_error: Option<anyhow::Error> = None;
    for item in items {
        if let Err(err) = op(item) {
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_only_invalid_state_store_is_retriable() {
        assert!(StreamsError::InvalidStateStore("kv".into()).is_retriable());
        assert!(!StreamsError::Configuration("x".into()).is_retriable());
        assert!(!StreamsError::ProcessorState("x".into()).is_retriable());
    }

    #[test]
    fn test_deserialization_message_carries_coordinates() {
        let err = StreamsError::Deserialization {
            component: MessageComponent::Value,
            topic: "orders".into(),
            partition: 2,
            offset: 17,
            timestamp: 1234,
            source: anyhow!("bad utf-8"),
        };
        let msg = err.to_string();
        assert!(msg.contains("value deserialization"));
        assert!(msg.contains("topic:orders"));
        assert!(msg.contains("partition:2"));
        assert!(msg.contains("offset:17"));
        assert!(msg.contains("timestamp:1234"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = StreamsError::Transport("broker down".into()).into();
        assert!(matches!(
            streams_error(&err),
            Some(StreamsError::Transport(_))
        ));
    }

    #[test]
    fn test_attempt_all_runs_every_item_and_keeps_first_error() {
        let mut seen = Vec::new();
        let result = attempt_all(1..=4, |i| {
            seen.push(i);
            if i % 2 == 0 {
                Err(anyhow!("failed {i}"))
            } else {
                Ok(())
            }
        });
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(result.unwrap_err().to_string(), "failed 2");
    }
}
