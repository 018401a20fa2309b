//! Tasks: the unit of assignment.
//!
//! A [`StreamTask`] owns the partitions of one sub-topology with the same
//! partition number, buffers their records, drives them through its own
//! instance of the processor graph and commits what it consumed. The
//! [`TaskManager`] creates and destroys tasks as partitions come and go.
//!
//! ```text
//!  poll ─▶ TaskManager::route ─▶ StreamTask queue (per partition)
//!                                      │ process(): smallest timestamp first
//!                                      ▼
//!                         SourceNode ─▶ ... ─▶ SinkProcessor ─▶ Producer
//!                                      │
//!                              commit(): offsets + producer flush/transaction
//! ```

use crate::client::{
    ClientSupplier, Consumer, Producer, ProducerConfig, task_producer_client_id,
    thread_producer_client_id, transactional_id,
};
use crate::config::StreamConfig;
use crate::error::{StreamsError, attempt_all};
use crate::processors::{ProcessorContext, ProcessorTopology, RecordCollector, RecordContext, TaskTopology};
use crate::state::StateStore;
use crate::types::{ConsumedRecord, Offset, ProcessingGuarantee, TaskId, TopicPartition, TopicPartitionOffset};
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

mod creator;
mod manager;
mod stream_task;

pub use creator::*;
pub use manager::*;
pub use stream_task::*;

/// Shared by every task of one runtime: global stores, visible from every
/// task context.
pub type GlobalStores = Arc<BTreeMap<String, Arc<dyn StateStore>>>;

#[cfg(test)]
#[path = "tests/task_tests.rs"]
mod task_tests;

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod manager_tests;
