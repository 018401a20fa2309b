use super::*;
use crate::client::{ConsumerConfig, ProducerConfig};
use crate::config::StreamSettings;
use crate::error::streams_error;
use crate::mock::{MockClientSupplier, MockCluster, MockConsumer, MockProducer};
use crate::processors::{SinkProcessor, SourceProcessor, StatelessProcessor, TopologyBuilder};
use crate::serdes::StringSerDes;

pub(crate) fn config(guarantee: ProcessingGuarantee) -> Arc<StreamConfig> {
    let mut settings = StreamSettings::new("test-app");
    settings.guarantee = guarantee;
    Arc::new(
        StreamConfig::new(settings)
            .with_default_key_serdes::<String>(Arc::new(StringSerDes))
            .with_default_value_serdes::<String>(Arc::new(StringSerDes)),
    )
}

/// `left` and `right` merge into one upper-casing node that writes to `out`.
pub(crate) fn merge_topology() -> Arc<ProcessorTopology> {
    let topology = TopologyBuilder::new()
        .graph(|g| {
            let left = g.add_source(SourceProcessor::<String, String>::new("left", "left"))?;
            let right = g.add_source(SourceProcessor::<String, String>::new("right", "right"))?;
            let upper = g.add_processor(
                &left,
                StatelessProcessor::map("upper", |k: String, v: String| (k, v.to_uppercase())),
            )?;
            g.connect(&right, &upper)?;
            g.add_processor(&upper, SinkProcessor::<String, String>::new("sink", "out"))?;
            Ok(())
        })
        .build()
        .unwrap();
    Arc::new(topology)
}

pub(crate) fn cluster() -> Arc<MockCluster> {
    let cluster = MockCluster::new();
    for topic in ["left", "right", "out"] {
        cluster.create_topic(topic, 2).unwrap();
    }
    cluster
}

fn consumer(cluster: &Arc<MockCluster>) -> MockConsumer {
    MockConsumer::new(
        cluster.clone(),
        ConsumerConfig {
            client_id: "c".into(),
            group_id: "test-app".into(),
        },
        None,
    )
}

fn record(topic: &str, offset: Offset, timestamp: i64, value: &str) -> ConsumedRecord {
    ConsumedRecord::new(
        &TopicPartition::new(topic, 0),
        offset,
        timestamp,
        b"k".to_vec(),
        value.as_bytes().to_vec(),
    )
}

fn task_with(
    cluster: &Arc<MockCluster>,
    guarantee: ProcessingGuarantee,
) -> (StreamTask, Arc<MockProducer>) {
    let producer = Arc::new(MockProducer::new(
        cluster.clone(),
        ProducerConfig {
            client_id: "p".into(),
            transactional_id: match guarantee {
                ProcessingGuarantee::ExactlyOnce => Some("test-app-0_0".into()),
                ProcessingGuarantee::AtLeastOnce => None,
            },
        },
    ));
    let task = StreamTask::new(
        TaskId::new(0, 0),
        vec![TopicPartition::new("left", 0), TopicPartition::new("right", 0)],
        &merge_topology(),
        config(guarantee),
        producer.clone(),
        Arc::new(BTreeMap::new()),
    )
    .unwrap();
    (task, producer)
}

fn output(cluster: &MockCluster) -> Vec<String> {
    cluster
        .records("out")
        .unwrap()
        .into_iter()
        .map(|r| String::from_utf8(r.value).unwrap())
        .collect()
}

#[test]
fn test_process_picks_smallest_timestamp_across_partitions() {
    let cluster = cluster();
    let (task, _) = task_with(&cluster, ProcessingGuarantee::AtLeastOnce);
    task.initialize().unwrap();

    task.add_record(record("left", 0, 30, "c")).unwrap();
    task.add_record(record("left", 1, 40, "d")).unwrap();
    task.add_record(record("right", 0, 10, "a")).unwrap();
    task.add_record(record("right", 1, 30, "tie")).unwrap();
    assert_eq!(task.buffered().unwrap(), 4);

    while task.process().unwrap() {}

    // Equal timestamps go to the lower partition, `left-0` before `right-0`.
    assert_eq!(output(&cluster), vec!["A", "C", "TIE", "D"]);
    assert!(!task.can_process().unwrap());
}

#[test]
fn test_nothing_processes_before_initialize() {
    let cluster = cluster();
    let (task, _) = task_with(&cluster, ProcessingGuarantee::AtLeastOnce);
    task.add_record(record("left", 0, 1, "x")).unwrap();

    assert_eq!(task.state().unwrap(), TaskState::Created);
    assert!(!task.can_process().unwrap());
    assert!(!task.process().unwrap());
}

#[test]
fn test_unowned_partition_is_rejected() {
    let cluster = cluster();
    let (task, _) = task_with(&cluster, ProcessingGuarantee::AtLeastOnce);
    let foreign = ConsumedRecord::new(&TopicPartition::new("left", 1), 0, 0, vec![], vec![]);

    let err = task.add_record(foreign).unwrap_err();
    assert!(matches!(
        streams_error(&err),
        Some(StreamsError::ProcessorState(_))
    ));
}

#[test]
fn test_commit_writes_next_offsets_and_is_idempotent() {
    let cluster = cluster();
    let consumer = consumer(&cluster);
    let (task, _) = task_with(&cluster, ProcessingGuarantee::AtLeastOnce);
    task.initialize().unwrap();
    assert!(!task.commit(&consumer).unwrap());

    task.add_record(record("left", 0, 1, "a")).unwrap();
    task.add_record(record("left", 1, 2, "b")).unwrap();
    task.add_record(record("right", 5, 3, "c")).unwrap();
    while task.process().unwrap() {}
    assert!(task.has_uncommitted().unwrap());
    // No processor asked, so the task waits for the periodic commit.
    assert!(!task.commit_needed().unwrap());
    assert_eq!(
        task.committable_offsets().unwrap(),
        vec![
            TopicPartitionOffset::new(TopicPartition::new("left", 0), 2),
            TopicPartitionOffset::new(TopicPartition::new("right", 0), 6),
        ]
    );

    assert!(task.commit(&consumer).unwrap());
    assert!(!task.commit(&consumer).unwrap());

    assert_eq!(
        cluster
            .committed_offset("test-app", &TopicPartition::new("left", 0))
            .unwrap(),
        Some(2)
    );
    assert_eq!(
        cluster
            .committed_offset("test-app", &TopicPartition::new("right", 0))
            .unwrap(),
        Some(6)
    );
}

#[test]
fn test_exactly_once_commits_through_the_transaction() {
    let cluster = cluster();
    let consumer = consumer(&cluster);
    let (task, producer) = task_with(&cluster, ProcessingGuarantee::ExactlyOnce);
    task.initialize().unwrap();

    task.add_record(record("left", 0, 1, "a")).unwrap();
    task.process().unwrap();
    // Output stays invisible until the transaction commits.
    assert!(output(&cluster).is_empty());

    assert!(task.commit(&consumer).unwrap());

    assert_eq!(output(&cluster), vec!["A"]);
    assert_eq!(producer.committed_transactions().unwrap(), 1);
    assert_eq!(
        cluster
            .committed_offset("test-app", &TopicPartition::new("left", 0))
            .unwrap(),
        Some(1)
    );
}

#[test]
fn test_unclean_close_aborts_open_transaction() {
    let cluster = cluster();
    let (task, producer) = task_with(&cluster, ProcessingGuarantee::ExactlyOnce);
    task.initialize().unwrap();
    task.add_record(record("left", 0, 1, "a")).unwrap();
    task.process().unwrap();

    task.close(false).unwrap();

    assert_eq!(producer.aborted_transactions().unwrap(), 1);
    assert!(producer.is_closed().unwrap());
    assert!(output(&cluster).is_empty());
    assert_eq!(task.state().unwrap(), TaskState::Closed);
    // A second close is a no-op.
    task.close(false).unwrap();
    assert_eq!(producer.aborted_transactions().unwrap(), 1);
}

#[test]
fn test_at_least_once_close_keeps_shared_producer_open() {
    let cluster = cluster();
    let (task, producer) = task_with(&cluster, ProcessingGuarantee::AtLeastOnce);
    task.initialize().unwrap();

    task.close(true).unwrap();

    assert!(!producer.is_closed().unwrap());
}

#[test]
fn test_creator_shares_producer_under_at_least_once() {
    let supplier = Arc::new(MockClientSupplier::new(cluster()));
    let creator = TaskCreator::new(
        merge_topology(),
        config(ProcessingGuarantee::AtLeastOnce),
        supplier.clone(),
        "app-StreamThread-0",
        Arc::new(BTreeMap::new()),
    );

    creator.create(TaskId::new(0, 0), vec![TopicPartition::new("left", 0)]).unwrap();
    creator.create(TaskId::new(0, 1), vec![TopicPartition::new("left", 1)]).unwrap();

    let producers = supplier.producers().unwrap();
    assert_eq!(producers.len(), 1);
    assert_eq!(producers[0].client_id(), "app-StreamThread-0-producer");
    assert!(!producers[0].is_transactional());

    creator.close().unwrap();
    assert!(producers[0].is_closed().unwrap());
}

#[test]
fn test_creator_builds_one_transactional_producer_per_task() {
    let supplier = Arc::new(MockClientSupplier::new(cluster()));
    let creator = TaskCreator::new(
        merge_topology(),
        config(ProcessingGuarantee::ExactlyOnce),
        supplier.clone(),
        "app-StreamThread-0",
        Arc::new(BTreeMap::new()),
    );

    creator.create(TaskId::new(0, 0), vec![TopicPartition::new("left", 0)]).unwrap();
    creator.create(TaskId::new(0, 1), vec![TopicPartition::new("left", 1)]).unwrap();

    let ids: Vec<String> = supplier
        .producers()
        .unwrap()
        .iter()
        .map(|p| p.client_id().to_string())
        .collect();
    assert_eq!(
        ids,
        vec![
            "app-StreamThread-0-0_0-producer".to_string(),
            "app-StreamThread-0-0_1-producer".to_string()
        ]
    );
    assert!(supplier.producers().unwrap().iter().all(|p| p.is_transactional()));
}

#[test]
fn test_requested_commit_marks_task_commit_needed() {
    let cluster = cluster();
    let consumer = consumer(&cluster);
    let (task, _) = task_with(&cluster, ProcessingGuarantee::AtLeastOnce);
    task.initialize().unwrap();
    task.add_record(record("left", 0, 1, "a")).unwrap();
    task.process().unwrap();

    task.context().request_commit();
    assert!(task.commit_needed().unwrap());

    assert!(task.commit(&consumer).unwrap());
    assert!(!task.commit_needed().unwrap());
    assert!(!task.has_uncommitted().unwrap());
}
