use super::node_tests::{Collect, string_config, task_context};
use super::*;
use crate::config::StreamSettings;
use crate::error::streams_error;
use crate::serdes::{BincodeSerDes, StringSerDes};
use crate::types::TopicPartition;

fn record(offset: Offset, key: &[u8], value: &[u8]) -> ConsumedRecord {
    ConsumedRecord::new(
        &TopicPartition::new("orders", 2),
        offset,
        1_700 + offset,
        key.to_vec(),
        value.to_vec(),
    )
}

fn source_with_sink(
    config: Arc<StreamConfig>,
    source: SourceProcessor<String, i64>,
) -> (SourceProcessor<String, i64>, Arc<Collect<String, i64>>) {
    let sink = Arc::new(Collect::<String, i64>::new("sink"));
    source.children().add(sink.clone()).unwrap();
    let (context, _) = task_context(config, BTreeMap::new());
    source.init(&context).unwrap();
    (source, sink)
}

fn i64_source() -> SourceProcessor<String, i64> {
    SourceProcessor::new("source", "orders")
        .with_key_serdes(Arc::new(StringSerDes))
        .with_value_serdes(Arc::new(BincodeSerDes::<i64>::new()))
}

#[test]
fn test_source_decodes_and_forwards() {
    let (source, sink) = source_with_sink(string_config(), i64_source());
    let value = bincode::serialize(&42i64).unwrap();

    source.process_record(&record(0, b"a", &value)).unwrap();

    assert_eq!(sink.seen(), vec![("a".to_string(), 42)]);
    assert_eq!(source.topic(), "orders");
}

#[test]
fn test_continue_handler_drops_bad_value() {
    let config = Arc::new(
        StreamConfig::new(StreamSettings::new("test-app"))
            .with_deserialization_handler(Arc::new(continue_on_deserialization_error)),
    );
    let (source, sink) = source_with_sink(config, i64_source());
    let good = bincode::serialize(&7i64).unwrap();

    source.process_record(&record(0, b"a", b"xx")).unwrap();
    source.process_record(&record(1, b"b", &good)).unwrap();

    assert_eq!(sink.seen(), vec![("b".to_string(), 7)]);
}

#[test]
fn test_fail_handler_raises_error_with_coordinates() {
    let (source, sink) = source_with_sink(string_config(), i64_source());

    let err = source.process_record(&record(9, b"a", b"xx")).unwrap_err();

    match streams_error(&err) {
        Some(StreamsError::Deserialization {
            component,
            topic,
            partition,
            offset,
            timestamp,
            ..
        }) => {
            assert_eq!(*component, MessageComponent::Value);
            assert_eq!(topic, "orders");
            assert_eq!(*partition, 2);
            assert_eq!(*offset, 9);
            assert_eq!(*timestamp, 1_709);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(sink.seen().is_empty());
}

#[test]
fn test_bad_key_is_reported_as_key_component() {
    let (source, _sink) = source_with_sink(string_config(), i64_source());
    let value = bincode::serialize(&1i64).unwrap();

    let err = source
        .process_record(&record(0, &[0xff, 0xfe], &value))
        .unwrap_err();

    assert!(matches!(
        streams_error(&err),
        Some(StreamsError::Deserialization {
            component: MessageComponent::Key,
            ..
        })
    ));
}

#[test]
fn test_missing_codec_is_configuration_error() {
    // Defaults are String codecs, the source wants an i64 value.
    let source = SourceProcessor::<String, i64>::new("source", "orders");
    let (source, _sink) = source_with_sink(string_config(), source);
    let value = bincode::serialize(&1i64).unwrap();

    let err = source.process_record(&record(0, b"a", &value)).unwrap_err();

    assert!(matches!(
        streams_error(&err),
        Some(StreamsError::Configuration(_))
    ));
}

#[test]
fn test_default_codecs_are_used_when_unset() {
    let source = SourceProcessor::<String, String>::new("source", "orders");
    let sink = Arc::new(Collect::<String, String>::new("sink"));
    source.children().add(sink.clone()).unwrap();
    let (context, _) = task_context(string_config(), BTreeMap::new());
    source.init(&context).unwrap();

    source.process_record(&record(0, b"k", b"v")).unwrap();

    assert_eq!(sink.seen(), vec![("k".to_string(), "v".to_string())]);
}

#[test]
fn test_process_before_init_fails() {
    let source = i64_source();
    assert!(source.process_record(&record(0, b"a", b"")).is_err());
}
