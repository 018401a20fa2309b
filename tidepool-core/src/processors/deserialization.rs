use super::*;

/// Decision of a deserialization failure handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Stop processing with a deserialization error.
    Fail,
    /// Drop the record for this source and keep going.
    Continue,
}

/// Called when a source cannot decode a key or value.
pub type DeserializationHandler =
    Arc<dyn Fn(&ProcessorContext, &ConsumedRecord, &anyhow::Error) -> HandlerResponse + Send + Sync>;

pub fn fail_on_deserialization_error(
    _context: &ProcessorContext,
    _record: &ConsumedRecord,
    _error: &anyhow::Error,
) -> HandlerResponse {
    HandlerResponse::Fail
}

pub fn continue_on_deserialization_error(
    _context: &ProcessorContext,
    _record: &ConsumedRecord,
    _error: &anyhow::Error,
) -> HandlerResponse {
    HandlerResponse::Continue
}

/// Outcome of decoding one half of a record.
#[derive(Debug)]
pub enum ObjectDeserialized<T> {
    Value(T),
    /// The handler chose to drop the record.
    Skip,
    Fatal(anyhow::Error),
}

/// Decode `data` and consult `handler` on failure.
pub fn deserialize_component<T>(
    serdes: &dyn SerDes<T>,
    component: MessageComponent,
    data: &[u8],
    record: &ConsumedRecord,
    context: &ProcessorContext,
    handler: &DeserializationHandler,
    log_prefix: &str,
) -> ObjectDeserialized<T> {
    match serdes.deserialize(data) {
        Ok(value) => ObjectDeserialized::Value(value),
        Err(err) => match handler(context, record, &err) {
            HandlerResponse::Continue => {
                error!(
                    "{log_prefix}skipping record after {component} deserialization error [topic:{}|partition:{}|offset:{}|timestamp:{}]: {err}",
                    record.topic, record.partition, record.offset, record.timestamp
                );
                ObjectDeserialized::Skip
            }
            HandlerResponse::Fail => ObjectDeserialized::Fatal(
                StreamsError::Deserialization {
                    component,
                    topic: record.topic.clone(),
                    partition: record.partition,
                    offset: record.offset,
                    timestamp: record.timestamp,
                    source: err,
                }
                .into(),
            ),
        },
    }
}
