//! In-memory log transport.
//!
//! [`MockCluster`] keeps topics as vectors of partitions, tracks consumer-group
//! membership and committed offsets, and hands out assignments when a group's
//! generation changes. The clients built on top of it implement the traits in
//! [`crate::client`], so a whole runtime can run without a broker.

use crate::client::{
    AdminClient, AdminConfig, ClientSupplier, Consumer, ConsumerConfig, PartitionMetadata,
    Producer, ProducerConfig, ProducerRecord, RebalanceListener,
};
use crate::error::StreamsError;
use crate::types::{ConsumedRecord, Offset, Timestamp, TopicPartition, TopicPartitionOffset};
use ahash::AHasher;
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

mod admin;
mod cluster;
mod consumer;
mod producer;
mod supplier;

pub use admin::*;
pub use cluster::*;
pub use consumer::*;
pub use producer::*;
pub use supplier::*;

#[cfg(test)]
#[path = "tests/mock_tests.rs"]
mod tests;
