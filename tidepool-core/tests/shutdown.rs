use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tidepool_core::mock::{MockClientSupplier, MockCluster};
use tidepool_core::processors::{ProcessorTopology, SinkProcessor, SourceProcessor, TopologyBuilder};
use tidepool_core::serdes::StringSerDes;
use tidepool_core::{RuntimeState, StreamConfig, StreamSettings, StreamsRuntime};

/// Every record of `in` goes to both `out-a` and `out-b`, so each one passes
/// through the parallel child dispatch.
fn fan_out() -> ProcessorTopology {
    TopologyBuilder::new()
        .graph(|g| {
            let source = g.add_source(SourceProcessor::<String, String>::new("source", "in"))?;
            g.add_processor(&source, SinkProcessor::<String, String>::new("sink-a", "out-a"))?;
            g.add_processor(&source, SinkProcessor::<String, String>::new("sink-b", "out-b"))?;
            Ok(())
        })
        .build()
        .unwrap()
}

#[test]
fn test_close_with_more_stream_threads_than_pool_workers() {
    rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build_global()
        .unwrap();

    let cluster = MockCluster::new();
    cluster.create_topic("in", 2).unwrap();
    cluster.create_topic("out-a", 1).unwrap();
    cluster.create_topic("out-b", 1).unwrap();

    let mut settings = StreamSettings::new("fan-out");
    settings.num_stream_threads = 2;
    settings.poll_ms = 5;
    settings.commit_interval_ms = Some(50);
    let config = StreamConfig::new(settings)
        .with_default_key_serdes::<String>(Arc::new(StringSerDes))
        .with_default_value_serdes::<String>(Arc::new(StringSerDes));
    let runtime = Arc::new(
        StreamsRuntime::new(fan_out(), config, Arc::new(MockClientSupplier::new(cluster.clone())))
            .unwrap(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let producer = {
        let cluster = cluster.clone();
        let stop = stop.clone();
        std::thread::spawn(move || {
            let mut i = 0u64;
            while !stop.load(Ordering::SeqCst) {
                cluster
                    .produce("in", None, format!("k{i}").into_bytes(), b"v".to_vec(), 0)
                    .unwrap();
                i += 1;
                std::thread::sleep(Duration::from_micros(200));
            }
        })
    };

    runtime.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(15);
    while runtime.state().unwrap() != RuntimeState::Running
        || cluster.records("out-a").unwrap().is_empty()
    {
        assert!(Instant::now() < deadline, "runtime never started processing");
        std::thread::sleep(Duration::from_millis(5));
    }

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let closing = runtime.clone();
    std::thread::spawn(move || {
        let _ = done_tx.send(closing.close());
    });
    let closed = done_rx.recv_timeout(Duration::from_secs(10));

    stop.store(true, Ordering::SeqCst);
    producer.join().unwrap();

    assert!(closed.expect("close did not return").is_ok());
    assert_eq!(runtime.state().unwrap(), RuntimeState::NotRunning);
}
