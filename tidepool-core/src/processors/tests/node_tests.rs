use super::*;
use crate::client::ProducerConfig;
use crate::config::StreamSettings;
use crate::mock::{MockCluster, MockProducer};
use crate::serdes::StringSerDes;
use crate::state::{InMemoryKeyValueStore, TypedKeyValueStore};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Test node that records every pair it receives.
pub(crate) struct Collect<K, V> {
    name: String,
    pub(crate) seen: Mutex<Vec<(K, V)>>,
}

impl<K, V> Collect<K, V> {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Clone + Send + Sync, V: Clone + Send + Sync> Collect<K, V> {
    pub(crate) fn seen(&self) -> Vec<(K, V)> {
        self.seen.lock().unwrap().clone()
    }
}

impl<K: Send + Sync, V: Send + Sync> ProcessorNode for Collect<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, _context: &Arc<ProcessorContext>) -> Result<()> {
        Ok(())
    }
}

impl<K: Send + Sync, V: Send + Sync> Processor<K, V> for Collect<K, V> {
    fn process(&self, key: K, value: V) -> Result<()> {
        self.seen.lock().unwrap().push((key, value));
        Ok(())
    }
}

struct Failing;

impl ProcessorNode for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn init(&self, _context: &Arc<ProcessorContext>) -> Result<()> {
        Ok(())
    }
}

impl Processor<String, i64> for Failing {
    fn process(&self, _key: String, _value: i64) -> Result<()> {
        Err(anyhow!("boom"))
    }
}

pub(crate) fn string_config() -> Arc<StreamConfig> {
    Arc::new(
        StreamConfig::new(StreamSettings::new("test-app"))
            .with_default_key_serdes::<String>(Arc::new(StringSerDes))
            .with_default_value_serdes::<String>(Arc::new(StringSerDes)),
    )
}

pub(crate) fn task_context(
    config: Arc<StreamConfig>,
    stores: BTreeMap<String, Arc<dyn StateStore>>,
) -> (Arc<ProcessorContext>, Arc<MockCluster>) {
    let cluster = MockCluster::new();
    let producer = Arc::new(MockProducer::new(
        cluster.clone(),
        ProducerConfig {
            client_id: "test-producer".into(),
            transactional_id: None,
        },
    ));
    let collector = Arc::new(RecordCollector::new(producer, "stream-task[0_0] "));
    let context = Arc::new(ProcessorContext::for_task(
        TaskId::new(0, 0),
        config,
        stores,
        Arc::new(BTreeMap::new()),
        collector,
    ));
    (context, cluster)
}

#[test]
fn test_forward_reaches_every_child() {
    let children: Children<String, i64> = Children::default();
    let a = Arc::new(Collect::<String, i64>::new("a"));
    let b = Arc::new(Collect::<String, i64>::new("b"));
    children.add(a.clone()).unwrap();
    children.add(b.clone()).unwrap();

    children.forward("k".into(), 1).unwrap();

    assert_eq!(a.seen(), vec![("k".to_string(), 1)]);
    assert_eq!(b.seen(), vec![("k".to_string(), 1)]);
}

#[test]
fn test_forward_to_named_child_only() {
    let children: Children<String, i64> = Children::default();
    let a = Arc::new(Collect::<String, i64>::new("a"));
    let b = Arc::new(Collect::<String, i64>::new("b"));
    children.add(a.clone()).unwrap();
    children.add(b.clone()).unwrap();

    children.forward_to("b", "k".into(), 7).unwrap();

    assert!(a.seen().is_empty());
    assert_eq!(b.seen(), vec![("k".to_string(), 7)]);
}

#[test]
fn test_duplicate_child_name_is_ignored() {
    let children: Children<String, i64> = Children::default();
    assert!(children.add(Arc::new(Collect::<String, i64>::new("a"))).unwrap());
    assert!(!children.add(Arc::new(Collect::<String, i64>::new("a"))).unwrap());
    assert_eq!(children.len().unwrap(), 1);
    assert_eq!(children.names().unwrap(), vec!["a".to_string()]);
}

#[test]
fn test_forward_with_timestamp_updates_context() {
    let (context, _) = task_context(string_config(), BTreeMap::new());
    let children: Children<String, i64> = Children::default();
    children.add(Arc::new(Collect::<String, i64>::new("a"))).unwrap();

    children
        .forward_with_timestamp(&context, "k".into(), 1, 4_242)
        .unwrap();

    assert_eq!(context.timestamp(), 4_242);
}

#[test]
fn test_child_error_propagates_to_parent() {
    let children: Children<String, i64> = Children::default();
    let ok = Arc::new(Collect::<String, i64>::new("ok"));
    children.add(ok.clone()).unwrap();
    children.add(Arc::new(Failing)).unwrap();

    let err = children.forward("k".into(), 1).unwrap_err();
    assert_eq!(err.to_string(), "boom");
}

#[test]
fn test_many_siblings_all_receive() {
    let children: Children<String, i64> = Children::default();
    let nodes: Vec<_> = (0..8)
        .map(|i| Arc::new(Collect::<String, i64>::new(&format!("n{i}"))))
        .collect();
    for node in &nodes {
        children.add(node.clone()).unwrap();
    }

    for i in 0..10 {
        children.forward(format!("k{i}"), i).unwrap();
    }

    for node in &nodes {
        assert_eq!(node.seen().len(), 10);
    }
}

#[test]
fn test_stateless_map_filter_flat_map() {
    let map = StatelessProcessor::map("upper", |k: String, v: String| (k, v.to_uppercase()));
    let filter = Arc::new(StatelessProcessor::filter("non-empty", |_k: &String, v: &String| {
        !v.is_empty()
    }));
    let split = Arc::new(StatelessProcessor::flat_map("split", |k: String, v: String| {
        v.split(' ')
            .map(|w| (k.clone(), w.to_string()))
            .collect::<Vec<_>>()
    }));
    let sink = Arc::new(Collect::<String, String>::new("sink"));
    map.children().add(filter.clone()).unwrap();
    filter.children().add(split.clone()).unwrap();
    split.children().add(sink.clone()).unwrap();

    map.process("k".into(), "hello world".into()).unwrap();
    map.process("k".into(), String::new()).unwrap();

    assert_eq!(
        sink.seen(),
        vec![
            ("k".to_string(), "HELLO".to_string()),
            ("k".to_string(), "WORLD".to_string())
        ]
    );
}

#[test]
fn test_peek_sees_and_passes_through() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let peek = StatelessProcessor::peek("peek", move |_k: &String, _v: &i64| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let sink = Arc::new(Collect::<String, i64>::new("sink"));
    peek.children().add(sink.clone()).unwrap();

    peek.process("a".into(), 1).unwrap();
    peek.process("b".into(), 2).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(sink.seen().len(), 2);
}

#[test]
fn test_stateful_counts_through_store() {
    let store = Arc::new(TypedKeyValueStore::<String, i64>::new(
        Arc::new(InMemoryKeyValueStore::new("counts")),
        None,
        Some(Arc::new(crate::serdes::BincodeSerDes::<i64>::new())),
    ));
    let mut stores: BTreeMap<String, Arc<dyn StateStore>> = BTreeMap::new();
    stores.insert("counts".into(), store.clone());
    let (context, _) = task_context(string_config(), stores);
    store.init(&context).unwrap();

    let counter = StatefulProcessor::from_fn(
        "count",
        &["counts"],
        |ctx: &ProcessorContext, key: String, _value: String| {
            let counts = ctx.get_store::<TypedKeyValueStore<String, i64>>("counts")?;
            let next = counts.get(&key)?.unwrap_or(0) + 1;
            counts.put(&key, &next)?;
            Ok(vec![(key, next)])
        },
    );
    let sink = Arc::new(Collect::<String, i64>::new("sink"));
    counter.children().add(sink.clone()).unwrap();
    counter.init(&context).unwrap();

    for word in ["a", "b", "a"] {
        counter.process(word.into(), String::new()).unwrap();
    }

    assert_eq!(
        sink.seen(),
        vec![("a".to_string(), 1), ("b".to_string(), 1), ("a".to_string(), 2)]
    );
    assert_eq!(store.get(&"a".to_string()).unwrap(), Some(2));
    assert_eq!(counter.store_names(), vec!["counts".to_string()]);
}

#[test]
fn test_stateful_init_fails_without_declared_store() {
    let (context, _) = task_context(string_config(), BTreeMap::new());
    let node = StatefulProcessor::from_fn(
        "needs-store",
        &["missing"],
        |_ctx: &ProcessorContext, k: String, v: String| Ok(vec![(k, v)]),
    );

    let err = node.init(&context).unwrap_err();
    assert!(matches!(
        crate::error::streams_error(&err),
        Some(StreamsError::Configuration(_))
    ));
}

#[test]
fn test_sink_sends_with_record_timestamp() {
    let (context, cluster) = task_context(string_config(), BTreeMap::new());
    cluster.create_topic("out", 1).unwrap();
    context.set_record_context(RecordContext {
        topic: "in".into(),
        partition: 0,
        offset: 3,
        timestamp: 1_000,
        headers: Vec::new(),
    });
    let sink: SinkProcessor<String, String> = SinkProcessor::new("sink", "out");
    sink.init(&context).unwrap();

    sink.process("k".into(), "v".into()).unwrap();

    let records = cluster.records("out").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, b"k".to_vec());
    assert_eq!(records[0].value, b"v".to_vec());
    assert_eq!(records[0].timestamp, 1_000);
    assert_eq!(context.collector().unwrap().sent_count(), 1);
}

#[test]
fn test_sink_without_codec_is_configuration_error() {
    let (context, cluster) = task_context(string_config(), BTreeMap::new());
    cluster.create_topic("out", 1).unwrap();
    let sink: SinkProcessor<String, i64> = SinkProcessor::new("sink", "out");
    sink.init(&context).unwrap();

    let err = sink.process("k".into(), 1).unwrap_err();
    assert!(matches!(
        crate::error::streams_error(&err),
        Some(StreamsError::Configuration(_))
    ));
}
