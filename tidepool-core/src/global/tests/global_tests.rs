use super::*;
use crate::config::StreamSettings;
use crate::error::streams_error;
use crate::mock::{MockAdmin, MockClientSupplier, MockCluster};
use crate::client::{ClientSupplier, ConsumerConfig};
use crate::processors::TopologyBuilder;
use crate::serdes::{BincodeSerDes, SerDes, StringSerDes};
use crate::state::{FnStoreBuilder, StoreBuilder, Stores, TypedKeyValueStore, downcast_store};
use crate::time::MockClock;
use std::sync::atomic::{AtomicBool, AtomicUsize};

/// Store that counts lifecycle calls and can be told to fail on close.
struct ProbeStore {
    name: String,
    fail_close: bool,
    open: AtomicBool,
    flushes: AtomicUsize,
    closes: AtomicUsize,
}

impl ProbeStore {
    fn new(name: &str, fail_close: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_close,
            open: AtomicBool::new(false),
            flushes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }
}

impl StateStore for ProbeStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, _context: &ProcessorContext) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        if self.fail_close {
            return Err(StreamsError::ProcessorState(format!("{} failed to close", self.name)).into());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

fn probe_builder(store: &Arc<ProbeStore>) -> Arc<dyn StoreBuilder> {
    let store = store.clone();
    Arc::new(FnStoreBuilder::new(store.name.clone(), move || {
        let store: Arc<dyn StateStore> = store.clone();
        store
    }))
}

fn lookup_builder(name: &str) -> Arc<dyn StoreBuilder> {
    Stores::key_value_store_builder::<String, i64>(
        Stores::in_memory_key_value_store(name),
        None,
        Some(Arc::new(BincodeSerDes::<i64>::new())),
    )
}

fn config() -> Arc<StreamConfig> {
    let mut settings = StreamSettings::new("test-app");
    settings.poll_ms = 10;
    settings.metadata_request_timeout_ms = 500;
    settings.commit_interval_ms = Some(1_000);
    Arc::new(
        StreamConfig::new(settings).with_default_key_serdes::<String>(Arc::new(StringSerDes)),
    )
}

fn cluster() -> Arc<MockCluster> {
    let cluster = MockCluster::new();
    cluster.create_topic("kv-topic", 1).unwrap();
    cluster.create_topic("other-topic", 2).unwrap();
    cluster
}

fn manager(cluster: &Arc<MockCluster>, builder: TopologyBuilder) -> GlobalStateManager {
    GlobalStateManager::new(
        Arc::new(builder.build().unwrap()),
        Arc::new(MockAdmin::new(cluster.clone())),
        config(),
    )
}

fn produce(cluster: &MockCluster, topic: &str, key: &str, value: i64) {
    let value = BincodeSerDes::<i64>::new().serialize(&value).unwrap();
    cluster
        .produce(topic, Some(0), key.as_bytes().to_vec(), value, 0)
        .unwrap();
}

fn lookup(manager: &GlobalStateManager, name: &str) -> Arc<TypedKeyValueStore<String, i64>> {
    let store = manager.get_store(name).unwrap().unwrap();
    downcast_store::<TypedKeyValueStore<String, i64>>(&store).unwrap()
}

#[test]
fn test_initialize_returns_store_names() {
    let cluster = cluster();
    let manager = manager(
        &cluster,
        TopologyBuilder::new()
            .add_global_store(lookup_builder("kv-store"), "kv-topic")
            .add_global_store(lookup_builder("other-store"), "other-topic"),
    );

    let names = manager.initialize().unwrap();

    assert_eq!(
        names,
        BTreeSet::from(["kv-store".to_string(), "other-store".to_string()])
    );
    assert!(manager.get_store("kv-store").unwrap().unwrap().is_open());
    assert_eq!(manager.global_stores().unwrap().len(), 2);
}

#[test]
fn test_duplicate_global_store_name_fails() {
    let cluster = cluster();
    let manager = manager(
        &cluster,
        TopologyBuilder::new()
            .add_global_store(lookup_builder("kv-store"), "kv-topic")
            .add_global_store(lookup_builder("kv-store"), "other-topic"),
    );

    let err = manager.initialize().unwrap_err();

    assert!(matches!(streams_error(&err), Some(StreamsError::Configuration(_))));
    assert!(manager.get_store("kv-store").unwrap().is_none());
}

#[test]
fn test_missing_partitions_are_fatal() {
    let cluster = cluster();
    let manager = manager(
        &cluster,
        TopologyBuilder::new().add_global_store(lookup_builder("kv-store"), "no-such-topic"),
    );

    let err = manager.initialize().unwrap_err();

    match streams_error(&err) {
        Some(StreamsError::Configuration(msg)) => assert!(msg.contains("no-such-topic")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_first_registration_starts_at_offset_zero() {
    let cluster = cluster();
    let manager = manager(
        &cluster,
        TopologyBuilder::new()
            .add_global_store(lookup_builder("kv-store"), "kv-topic")
            .add_global_store(lookup_builder("other-store"), "other-topic"),
    );
    manager.initialize().unwrap();

    let offsets = manager.changelog_offsets().unwrap();

    assert_eq!(offsets.len(), 3);
    assert_eq!(offsets.get(&TopicPartition::new("kv-topic", 0)), Some(&0));
    assert!(offsets.values().all(|offset| *offset == 0));
}

#[test]
fn test_unknown_store_resolves_to_none() {
    let cluster = cluster();
    let manager = manager(
        &cluster,
        TopologyBuilder::new().add_global_store(lookup_builder("kv-store"), "kv-topic"),
    );
    manager.initialize().unwrap();

    assert!(manager.get_store("some-store-name").unwrap().is_none());
    assert!(manager.get_store("kv-store").unwrap().is_some());
}

#[test]
fn test_second_registration_is_rejected() {
    let cluster = cluster();
    let probe = ProbeStore::new("probe", false);
    let manager = manager(
        &cluster,
        TopologyBuilder::new().add_global_store(probe_builder(&probe), "kv-topic"),
    );
    manager.initialize().unwrap();

    let err = manager.register(probe.clone(), None).unwrap_err();

    assert!(matches!(streams_error(&err), Some(StreamsError::Configuration(_))));
}

#[test]
fn test_flush_reaches_every_store() {
    let cluster = cluster();
    let first = ProbeStore::new("first", false);
    let second = ProbeStore::new("second", false);
    let manager = manager(
        &cluster,
        TopologyBuilder::new()
            .add_global_store(probe_builder(&first), "kv-topic")
            .add_global_store(probe_builder(&second), "other-topic"),
    );
    manager.initialize().unwrap();

    manager.flush().unwrap();

    assert_eq!(first.flushes.load(Ordering::SeqCst), 1);
    assert_eq!(second.flushes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_continues_past_a_failing_store() {
    let cluster = cluster();
    let failing = ProbeStore::new("failing", true);
    let healthy = ProbeStore::new("healthy", false);
    let manager = manager(
        &cluster,
        TopologyBuilder::new()
            .add_global_store(probe_builder(&failing), "kv-topic")
            .add_global_store(probe_builder(&healthy), "other-topic"),
    );
    manager.initialize().unwrap();

    let err = manager.close().unwrap_err();

    assert!(matches!(streams_error(&err), Some(StreamsError::ProcessorState(_))));
    assert_eq!(failing.closes.load(Ordering::SeqCst), 1);
    assert_eq!(healthy.closes.load(Ordering::SeqCst), 1);
    assert!(!healthy.is_open());
}

#[test]
fn test_restore_replays_the_bootstrap_log() {
    let cluster = cluster();
    produce(&cluster, "kv-topic", "a", 1);
    produce(&cluster, "kv-topic", "b", 2);
    produce(&cluster, "kv-topic", "a", 3);
    let manager = manager(
        &cluster,
        TopologyBuilder::new().add_global_store(lookup_builder("kv-store"), "kv-topic"),
    );
    manager.initialize().unwrap();
    let consumer = MockClientSupplier::new(cluster.clone())
        .restore_consumer(ConsumerConfig {
            client_id: "restore".into(),
            group_id: "test-app".into(),
        })
        .unwrap();

    manager.restore(consumer.as_ref()).unwrap();

    let store = lookup(&manager, "kv-store");
    assert_eq!(store.get(&"a".to_string()).unwrap(), Some(3));
    assert_eq!(store.get(&"b".to_string()).unwrap(), Some(2));
    assert_eq!(
        manager.changelog_offsets().unwrap().get(&TopicPartition::new("kv-topic", 0)),
        Some(&3)
    );
    assert!(consumer.assignment().unwrap().is_empty());
}

#[test]
fn test_restore_needs_a_restore_callback() {
    let cluster = cluster();
    produce(&cluster, "kv-topic", "a", 1);
    let probe = ProbeStore::new("probe", false);
    let manager = manager(
        &cluster,
        TopologyBuilder::new().add_global_store(probe_builder(&probe), "kv-topic"),
    );
    manager.initialize().unwrap();
    let consumer = MockClientSupplier::new(cluster.clone())
        .restore_consumer(ConsumerConfig {
            client_id: "restore".into(),
            group_id: "test-app".into(),
        })
        .unwrap();

    let err = manager.restore(consumer.as_ref()).unwrap_err();

    assert!(matches!(streams_error(&err), Some(StreamsError::Configuration(_))));
}

#[test]
fn test_updater_applies_records_after_restore() {
    let cluster = cluster();
    produce(&cluster, "kv-topic", "a", 1);
    let manager = Arc::new(manager(
        &cluster,
        TopologyBuilder::new().add_global_store(lookup_builder("kv-store"), "kv-topic"),
    ));
    manager.initialize().unwrap();
    let consumer = MockClientSupplier::new(cluster.clone())
        .global_consumer(ConsumerConfig {
            client_id: "global".into(),
            group_id: "test-app".into(),
        })
        .unwrap();
    let clock = MockClock::new(0);
    let updater = GlobalStateUpdater::new(manager.clone(), consumer, &config(), Arc::new(clock.clone()));

    updater.initialize().unwrap();
    assert_eq!(lookup(&manager, "kv-store").get(&"a".to_string()).unwrap(), Some(1));

    produce(&cluster, "kv-topic", "a", 7);
    clock.set_ms(2_000);
    assert!(updater.update(Duration::from_millis(10)).unwrap());
    assert!(!updater.update(Duration::ZERO).unwrap());

    assert_eq!(lookup(&manager, "kv-store").get(&"a".to_string()).unwrap(), Some(7));
    assert_eq!(
        manager.changelog_offsets().unwrap().get(&TopicPartition::new("kv-topic", 0)),
        Some(&2)
    );

    updater.close().unwrap();
    assert!(!manager.get_store("kv-store").unwrap().unwrap().is_open());
}

#[test]
fn test_updater_run_stops_on_cancel() {
    let cluster = cluster();
    let manager = Arc::new(manager(
        &cluster,
        TopologyBuilder::new().add_global_store(lookup_builder("kv-store"), "kv-topic"),
    ));
    manager.initialize().unwrap();
    let consumer = MockClientSupplier::new(cluster.clone())
        .global_consumer(ConsumerConfig {
            client_id: "global".into(),
            group_id: "test-app".into(),
        })
        .unwrap();
    let updater = GlobalStateUpdater::new(manager, consumer, &config(), Arc::new(MockClock::new(0)));
    updater.initialize().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    updater.run(&cancel, Duration::ZERO).unwrap();
}
