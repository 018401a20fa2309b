use super::*;
use std::sync::Mutex as StdMutex;

#[derive(Default)]
struct RecordingListener {
    events: StdMutex<Vec<(String, Vec<TopicPartition>)>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<(String, Vec<TopicPartition>)> {
        self.events.lock().unwrap().clone()
    }
}

impl RebalanceListener for RecordingListener {
    fn on_partitions_assigned(&self, partitions: &[TopicPartition]) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(("assigned".into(), partitions.to_vec()));
        Ok(())
    }

    fn on_partitions_revoked(&self, partitions: &[TopicPartition]) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(("revoked".into(), partitions.to_vec()));
        Ok(())
    }
}

fn consumer_config(client: &str) -> ConsumerConfig {
    ConsumerConfig {
        client_id: client.into(),
        group_id: "group".into(),
    }
}

#[test]
fn test_produce_assigns_sequential_offsets() {
    let cluster = MockCluster::new();
    cluster.create_topic("input", 1).unwrap();
    let first = cluster
        .produce("input", Some(0), b"a".to_vec(), b"1".to_vec(), 10)
        .unwrap();
    let second = cluster
        .produce("input", Some(0), b"b".to_vec(), b"2".to_vec(), 11)
        .unwrap();
    assert_eq!(first.offset, 0);
    assert_eq!(second.offset, 1);
    assert_eq!(cluster.end_offset(&TopicPartition::new("input", 0)).unwrap(), 2);
}

#[test]
fn test_produce_unknown_topic_is_transport_error() {
    let cluster = MockCluster::new();
    let err = cluster
        .produce("missing", None, vec![], vec![], 0)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StreamsError>(),
        Some(StreamsError::Transport(_))
    ));
}

#[test]
fn test_same_key_same_partition() {
    let cluster = MockCluster::new();
    cluster.create_topic("input", 8).unwrap();
    let a = cluster
        .produce("input", None, b"user-1".to_vec(), b"x".to_vec(), 0)
        .unwrap();
    let b = cluster
        .produce("input", None, b"user-1".to_vec(), b"y".to_vec(), 0)
        .unwrap();
    assert_eq!(a.topic_partition, b.topic_partition);
}

#[test]
fn test_create_topic_conflicting_partitions() {
    let cluster = MockCluster::new();
    cluster.create_topic("t", 2).unwrap();
    cluster.create_topic("t", 2).unwrap();
    assert!(cluster.create_topic("t", 3).is_err());
}

#[test]
fn test_subscribe_then_poll_triggers_revoke_and_assign() {
    let cluster = MockCluster::new();
    cluster.create_topic("input", 2).unwrap();
    let listener = Arc::new(RecordingListener::default());
    let consumer = MockConsumer::new(cluster.clone(), consumer_config("c1"), Some(listener.clone()));

    consumer.subscribe(&["input".to_string()]).unwrap();
    assert!(consumer.poll(Duration::ZERO).unwrap().is_none());

    let events = listener.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], ("revoked".to_string(), vec![]));
    assert_eq!(
        events[1],
        (
            "assigned".to_string(),
            vec![TopicPartition::new("input", 0), TopicPartition::new("input", 1)]
        )
    );
}

#[test]
fn test_second_member_splits_partitions() {
    let cluster = MockCluster::new();
    cluster.create_topic("input", 4).unwrap();
    let c1 = MockConsumer::new(cluster.clone(), consumer_config("c1"), None);
    let c2 = MockConsumer::new(cluster.clone(), consumer_config("c2"), None);
    c1.subscribe(&["input".to_string()]).unwrap();
    c1.poll(Duration::ZERO).unwrap();
    assert_eq!(c1.assignment().unwrap().len(), 4);

    c2.subscribe(&["input".to_string()]).unwrap();
    c1.poll(Duration::ZERO).unwrap();
    c2.poll(Duration::ZERO).unwrap();
    let a1 = c1.assignment().unwrap();
    let a2 = c2.assignment().unwrap();
    assert_eq!(a1.len(), 2);
    assert_eq!(a2.len(), 2);
    assert!(a1.iter().all(|tp| !a2.contains(tp)));
}

#[test]
fn test_poll_resumes_from_committed_offset() {
    let cluster = MockCluster::new();
    cluster.create_topic("input", 1).unwrap();
    for i in 0..3u8 {
        cluster
            .produce("input", Some(0), vec![i], vec![i], i as i64)
            .unwrap();
    }
    let tp = TopicPartition::new("input", 0);
    cluster
        .commit("group", &[TopicPartitionOffset::new(tp.clone(), 2)])
        .unwrap();

    let consumer = MockConsumer::new(cluster.clone(), consumer_config("c1"), None);
    consumer.subscribe(&["input".to_string()]).unwrap();
    let record = consumer.poll(Duration::ZERO).unwrap().unwrap();
    assert_eq!(record.offset, 2);
    assert!(consumer.poll(Duration::ZERO).unwrap().is_none());
}

#[test]
fn test_manual_assign_and_seek() {
    let cluster = MockCluster::new();
    cluster.create_topic("log", 1).unwrap();
    for i in 0..5u8 {
        cluster.produce("log", Some(0), vec![i], vec![i], 0).unwrap();
    }
    let tp = TopicPartition::new("log", 0);
    let consumer = MockConsumer::new(cluster.clone(), consumer_config("restore"), None);
    consumer.assign(&[tp.clone()]).unwrap();
    consumer.seek(&TopicPartitionOffset::new(tp.clone(), 3)).unwrap();
    assert_eq!(consumer.poll(Duration::ZERO).unwrap().unwrap().offset, 3);
    assert_eq!(consumer.watermark_offsets(&tp).unwrap(), (0, 5));
}

#[test]
fn test_transactional_producer_buffers_until_commit() {
    let cluster = MockCluster::new();
    cluster.create_topic("out", 1).unwrap();
    let producer = MockProducer::new(
        cluster.clone(),
        ProducerConfig {
            client_id: "p".into(),
            transactional_id: Some("app-0_0".into()),
        },
    );
    producer.init_transactions(Duration::ZERO).unwrap();
    producer.begin_transaction().unwrap();
    producer
        .send(ProducerRecord {
            topic: "out".into(),
            partition: None,
            key: b"k".to_vec(),
            value: b"v".to_vec(),
            timestamp: 1,
        })
        .unwrap();
    let tp = TopicPartition::new("in", 0);
    producer
        .send_offsets_to_transaction(&[TopicPartitionOffset::new(tp.clone(), 5)], "group", Duration::ZERO)
        .unwrap();
    assert!(cluster.records("out").unwrap().is_empty());
    assert_eq!(cluster.committed_offset("group", &tp).unwrap(), None);

    producer.commit_transaction(Duration::ZERO).unwrap();
    assert_eq!(cluster.records("out").unwrap().len(), 1);
    assert_eq!(cluster.committed_offset("group", &tp).unwrap(), Some(5));
    assert_eq!(producer.committed_transactions().unwrap(), 1);
}

#[test]
fn test_transactional_abort_discards() {
    let cluster = MockCluster::new();
    cluster.create_topic("out", 1).unwrap();
    let producer = MockProducer::new(
        cluster.clone(),
        ProducerConfig {
            client_id: "p".into(),
            transactional_id: Some("t".into()),
        },
    );
    producer.init_transactions(Duration::ZERO).unwrap();
    producer.begin_transaction().unwrap();
    producer
        .send(ProducerRecord {
            topic: "out".into(),
            partition: Some(0),
            key: vec![],
            value: vec![1],
            timestamp: 0,
        })
        .unwrap();
    producer.abort_transaction(Duration::ZERO).unwrap();
    assert!(cluster.records("out").unwrap().is_empty());
    assert_eq!(producer.aborted_transactions().unwrap(), 1);
}

#[test]
fn test_admin_partitions_for() {
    let cluster = MockCluster::new();
    cluster.create_topic("known", 3).unwrap();
    let admin = MockAdmin::new(cluster);
    let parts = admin
        .partitions_for("known", Duration::from_secs(1))
        .unwrap()
        .unwrap();
    assert_eq!(parts.len(), 3);
    assert!(admin
        .partitions_for("unknown", Duration::from_secs(1))
        .unwrap()
        .is_none());
}
