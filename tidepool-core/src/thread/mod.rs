//! Stream threads.
//!
//! Each [`StreamThread`] runs one sequential poll-process-commit loop on its
//! own OS thread. Threads of one runtime join the same consumer group and
//! work on disjoint partitions.
//!
//! ```text
//! CREATED ─▶ STARTING ─▶ PARTITIONS_ASSIGNED ─▶ RUNNING
//!                │             ▲      │            │
//!                └──▶ PARTITIONS_REVOKED ◀─────────┘
//!
//! any ─▶ PENDING_SHUTDOWN ─▶ DEAD      (any ─▶ DEAD)
//! ```

use crate::client::{ClientSupplier, Consumer, ConsumerConfig, RebalanceListener, consumer_client_id};
use crate::config::StreamConfig;
use crate::error::StreamsError;
use crate::processors::ProcessorTopology;
use crate::query::ThreadStoreView;
use crate::state::StateStore;
use crate::task::{GlobalStores, TaskCreator, TaskManager};
use crate::time::Clock;
use crate::types::TopicPartition;
use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

mod listener;
mod state;
mod stream_thread;

pub use listener::*;
pub use state::*;
pub use stream_thread::*;

/// Cooperative stop flag, checked between loop iterations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod state_tests;

#[cfg(test)]
#[path = "tests/thread_tests.rs"]
mod thread_tests;
