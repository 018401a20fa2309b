//! # Tidepool Core
//!
//! Stream processing runtime over partitioned, ordered message logs.
//!
//! A [`processors::TopologyBuilder`] describes a graph of source, stateless,
//! stateful and sink nodes. [`streams::StreamsRuntime`] runs that graph on a
//! number of [`thread::StreamThread`]s; each thread owns the
//! [`task::StreamTask`]s of the partitions the consumer group assigned to it.
//!
//! - [`types`]: offsets, partitions, task ids and consumed records.
//! - [`client`]: the log transport seams (consumer, producer, admin).
//! - [`mock`]: an in-memory log transport implementing [`client`].
//! - [`serdes`]: codecs: UTF-8 strings, bincode, value-and-timestamp.
//! - [`processors`]: processor nodes, record context and topology.
//! - [`state`]: key-value and window stores.
//! - [`task`]: tasks, their creation and their lifecycle.
//! - [`thread`]: the poll-process-commit loop and its state machine.
//! - [`global`]: global stores bootstrapped from their own logs.
//! - [`query`]: interactive queries over local state.
//! - [`streams`]: the runtime tying it all together.

pub mod client;
pub mod config;
pub mod error;
pub mod global;
pub mod mock;
pub mod processors;
pub mod query;
pub mod serdes;
pub mod state;
pub mod streams;
pub mod task;
pub mod thread;
pub mod time;
pub mod types;

pub use config::{StreamConfig, StreamSettings};
pub use error::StreamsError;
pub use streams::{RuntimeState, StreamsRuntime};
