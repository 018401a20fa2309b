//! Processor graph runtime.
//!
//! A topology is a DAG of nodes. Source nodes decode raw records and push typed
//! pairs downstream; stateless and stateful transforms reshape them; sink nodes
//! encode and hand them to the task's record collector.
//!
//! ```text
//! ConsumedRecord ─▶ SourceProcessor ─▶ StatelessProcessor ─▶ StatefulProcessor ─▶ SinkProcessor ─▶ Producer
//!                          │
//!                          └──────────▶ (siblings run in parallel)
//! ```

use crate::client::{Producer, ProducerRecord};
use crate::config::StreamConfig;
use crate::error::{MessageComponent, StreamsError, attempt_all};
use crate::serdes::SerDes;
use crate::state::{StateStore, StoreBuilder, downcast_store};
use crate::types::{ConsumedRecord, Offset, TaskId, Timestamp};
use anyhow::{Result, anyhow};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tracing::{debug, error};

mod collector;
mod context;
mod deserialization;
mod node;
mod sink;
mod source;
mod stateful;
mod stateless;
mod topology;

pub use collector::*;
pub use context::*;
pub use deserialization::*;
pub use node::*;
pub use sink::*;
pub use source::*;
pub use stateful::*;
pub use stateless::*;
pub use topology::*;

#[cfg(test)]
#[path = "tests/node_tests.rs"]
mod node_tests;

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod source_tests;

#[cfg(test)]
#[path = "tests/topology_tests.rs"]
mod topology_tests;
