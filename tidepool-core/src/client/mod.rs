//! Log transport seams.
//!
//! The runtime talks to the partitioned log only through these traits. The
//! in-memory [`crate::mock`] transport implements them for tests; a broker-backed
//! implementation plugs in through [`ClientSupplier`].

use crate::types::{ConsumedRecord, Offset, Timestamp, TopicPartition, TopicPartitionOffset};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

mod ids;

pub use ids::*;

/// Group consumer with manual offset commits.
pub trait Consumer: Send + Sync {
    /// Join the consumer group for `topics`. Assignment arrives through the
    /// rebalance listener during a later `poll`.
    fn subscribe(&self, topics: &[String]) -> Result<()>;
    fn unsubscribe(&self) -> Result<()>;
    /// Manual assignment outside any group, used for restoration.
    fn assign(&self, partitions: &[TopicPartition]) -> Result<()>;
    fn seek(&self, position: &TopicPartitionOffset) -> Result<()>;
    /// Return the next record, or `None` once `timeout` elapsed without one.
    fn poll(&self, timeout: Duration) -> Result<Option<ConsumedRecord>>;
    fn commit(&self, offsets: &[TopicPartitionOffset]) -> Result<()>;
    fn committed(&self, partition: &TopicPartition) -> Result<Option<Offset>>;
    /// Low and high watermark of a partition.
    fn watermark_offsets(&self, partition: &TopicPartition) -> Result<(Offset, Offset)>;
    fn assignment(&self) -> Result<Vec<TopicPartition>>;
    fn close(&self) -> Result<()>;
}

/// Record handed to a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    /// Explicit partition; `None` lets the producer hash the key.
    pub partition: Option<u32>,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub timestamp: Timestamp,
}

pub trait Producer: Send + Sync {
    /// Send a record and return where it was (or will be) written.
    fn send(&self, record: ProducerRecord) -> Result<TopicPartition>;
    fn flush(&self, timeout: Duration) -> Result<()>;
    fn init_transactions(&self, timeout: Duration) -> Result<()>;
    fn begin_transaction(&self) -> Result<()>;
    fn commit_transaction(&self, timeout: Duration) -> Result<()>;
    fn abort_transaction(&self, timeout: Duration) -> Result<()>;
    /// Commit consumer offsets atomically with the open transaction.
    fn send_offsets_to_transaction(
        &self,
        offsets: &[TopicPartitionOffset],
        group_id: &str,
        timeout: Duration,
    ) -> Result<()>;
    fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub topic: String,
    pub partition: u32,
}

pub trait AdminClient: Send + Sync {
    /// Partition metadata for `topic`; `None` when the topic is unknown.
    fn partitions_for(&self, topic: &str, timeout: Duration) -> Result<Option<Vec<PartitionMetadata>>>;
}

/// Callbacks raised by a group consumer while it polls.
pub trait RebalanceListener: Send + Sync {
    fn on_partitions_assigned(&self, partitions: &[TopicPartition]) -> Result<()>;
    fn on_partitions_revoked(&self, partitions: &[TopicPartition]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub client_id: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub client_id: String,
    /// Set for transactional producers.
    pub transactional_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub client_id: String,
}

/// Factory for every transport client the runtime needs.
pub trait ClientSupplier: Send + Sync {
    fn consumer(
        &self,
        config: ConsumerConfig,
        listener: Arc<dyn RebalanceListener>,
    ) -> Result<Arc<dyn Consumer>>;
    fn restore_consumer(&self, config: ConsumerConfig) -> Result<Arc<dyn Consumer>>;
    fn global_consumer(&self, config: ConsumerConfig) -> Result<Arc<dyn Consumer>>;
    fn producer(&self, config: ProducerConfig) -> Result<Arc<dyn Producer>>;
    fn admin(&self, config: AdminConfig) -> Result<Arc<dyn AdminClient>>;
}
