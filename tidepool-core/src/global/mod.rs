//! Global state.
//!
//! Global stores are read-only copies of a whole log, replicated on every
//! instance. The [`GlobalStateManager`] builds them, resolves the partitions of
//! their bootstrap topics and replays those partitions into the stores before
//! any stream thread starts. A [`GlobalStateUpdater`] then keeps applying new
//! records on its own OS thread.
//!
//! ```text
//! initialize() ─▶ register() per store (changelog offset 0)
//!      │
//! restore(consumer): low..high watermark per partition ─▶ restore callback
//!      │
//! GlobalStateUpdater::run(): poll ─▶ apply() ─▶ periodic flush
//! ```

use crate::client::{AdminClient, Consumer};
use crate::config::StreamConfig;
use crate::error::{StreamsError, attempt_all};
use crate::processors::{ProcessorContext, ProcessorTopology};
use crate::state::{StateRestoreCallback, StateStore};
use crate::task::GlobalStores;
use crate::thread::CancellationToken;
use crate::time::Clock;
use crate::types::{ConsumedRecord, Offset, TopicPartition, TopicPartitionOffset};
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

mod state_manager;
mod updater;

pub use state_manager::*;
pub use updater::*;

#[cfg(test)]
#[path = "tests/global_tests.rs"]
mod tests;
