use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Parser;
use tidepool_core::mock::{MockClientSupplier, MockCluster};
use tidepool_core::processors::{
    ProcessorContext, ProcessorTopology, SinkProcessor, SourceProcessor, StatefulProcessor,
    StatelessProcessor, TopologyBuilder,
};
use tidepool_core::query::{QueryableStoreTypes, StoreQueryParameters};
use tidepool_core::serdes::{BincodeSerDes, StringSerDes};
use tidepool_core::state::{Stores, TypedKeyValueStore};
use tidepool_core::types::ProcessingGuarantee;
use tidepool_core::{RuntimeState, StreamConfig, StreamSettings, StreamsRuntime};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "wordcount")]
#[command(about = "Word count over an in-memory partitioned log", long_about = None)]
struct Cli {
    #[arg(long, default_value = "wordcount")]
    application_id: String,
    /// Stores are in memory, so counts restart when a task moves between
    /// threads during the initial rebalance.
    #[arg(long, default_value_t = 1)]
    threads: usize,
    #[arg(long, default_value_t = 4)]
    partitions: u32,
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
    #[arg(long)]
    commit_interval_ms: Option<u64>,
    #[arg(long)]
    exactly_once: bool,
    /// Give up if the counts are not complete after this long.
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

const LINES: &[&str] = &[
    "hello world",
    "hello tidepool",
    "world of streams",
    "streams of records",
];

/// `lines` are split into words and re-keyed through `words`, so every word is
/// counted by the task that owns its partition.
fn topology() -> Result<ProcessorTopology> {
    TopologyBuilder::new()
        .add_state_store(Stores::key_value_store_builder::<String, i64>(
            Stores::in_memory_key_value_store("counts"),
            None,
            Some(Arc::new(BincodeSerDes::<i64>::new())),
        ))
        .graph(|g| {
            let lines = g.add_source(SourceProcessor::<String, String>::new("lines-source", "lines"))?;
            let split = g.add_processor(
                &lines,
                StatelessProcessor::flat_map("split", |_: String, line: String| {
                    line.split_whitespace()
                        .map(|word| (word.to_lowercase(), word.to_string()))
                        .collect::<Vec<_>>()
                }),
            )?;
            g.add_processor(&split, SinkProcessor::<String, String>::new("words-sink", "words"))?;

            let words = g.add_source(SourceProcessor::<String, String>::new("words-source", "words"))?;
            let count = g.add_processor(
                &words,
                StatefulProcessor::from_fn(
                    "count",
                    &["counts"],
                    |ctx: &ProcessorContext, word: String, _: String| {
                        let counts = ctx.get_store::<TypedKeyValueStore<String, i64>>("counts")?;
                        let next = counts.get(&word)?.unwrap_or(0) + 1;
                        counts.put(&word, &next)?;
                        Ok(vec![(word, next.to_string())])
                    },
                ),
            )?;
            g.add_processor(&count, SinkProcessor::<String, String>::new("counts-sink", "word-counts"))?;
            Ok(())
        })
        .build()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let cluster = MockCluster::new();
    for topic in ["lines", "words"] {
        cluster.create_topic(topic, cli.partitions)?;
    }
    cluster.create_topic("word-counts", 1)?;
    for (i, line) in LINES.iter().enumerate() {
        cluster.produce("lines", None, format!("line-{i}").into_bytes(), line.as_bytes().to_vec(), 0)?;
    }
    let total_words: usize = LINES.iter().map(|l| l.split_whitespace().count()).sum();

    let mut settings = StreamSettings::new(cli.application_id);
    settings.num_stream_threads = cli.threads;
    settings.poll_ms = cli.poll_ms;
    settings.commit_interval_ms = cli.commit_interval_ms;
    if cli.exactly_once {
        settings.guarantee = ProcessingGuarantee::ExactlyOnce;
    }
    let config = StreamConfig::new(settings)
        .with_default_key_serdes::<String>(Arc::new(StringSerDes))
        .with_default_value_serdes::<String>(Arc::new(StringSerDes));

    let runtime = StreamsRuntime::new(topology()?, config, Arc::new(MockClientSupplier::new(cluster.clone())))?;
    runtime.set_state_listener(Arc::new(|old: RuntimeState, new: RuntimeState| {
        info!("runtime moved from {old} to {new}");
    }))?;
    runtime.start()?;

    let deadline = Instant::now() + Duration::from_millis(cli.timeout_ms);
    while cluster.records("word-counts")?.len() < total_words {
        if Instant::now() >= deadline {
            runtime.close()?;
            bail!("word counts incomplete after {}ms", cli.timeout_ms);
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let params = StoreQueryParameters::from_name_and_type(
        "counts",
        QueryableStoreTypes::key_value::<String, i64>(),
    );
    let mut counts = loop {
        match runtime.store(&params).and_then(|view| view.all()) {
            Ok(counts) => break counts,
            Err(err) if Instant::now() < deadline => {
                info!("store not queryable yet: {err:#}");
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                runtime.close()?;
                return Err(err);
            }
        }
    };

    counts.sort();
    for (word, count) in counts {
        println!("{word}: {count}");
    }

    runtime.close()
}
