//! State stores.
//!
//! Three layers, from the bottom:
//!
//! 1. [`KeyValueBytesStore`]: raw bytes, the only layer that touches the
//!    backend ([`InMemoryKeyValueStore`]).
//! 2. [`TypedKeyValueStore`]: binds key/value codecs at init and exposes typed
//!    operations; [`TimestampedKeyValueStore`] stores [`ValueAndTimestamp`].
//! 3. [`window`]: segmented, time-bounded window stores.
//!
//! Every store is registered under a name and reachable as an
//! `Arc<dyn StateStore>`; [`downcast_store`] recovers the concrete type.

use crate::error::StreamsError;
use crate::processors::ProcessorContext;
use crate::serdes::{SerDes, ValueAndTimestamp, ValueAndTimestampSerDes};
use crate::types::Timestamp;
use anyhow::{Result, anyhow};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::debug;

mod builder;
mod in_memory;
mod key_value;
pub mod window;

pub use builder::*;
pub use in_memory::*;
pub use key_value::*;

/// Applies one changelog record (raw key, raw value, timestamp) to a store.
pub type StateRestoreCallback = Arc<dyn Fn(&[u8], &[u8], Timestamp) -> Result<()> + Send + Sync>;

/// Upcast helper so `Arc<dyn StateStore>` can be turned back into its
/// concrete type.
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Lifecycle shared by every store.
pub trait StateStore: AsAny {
    fn name(&self) -> &str;
    /// Bind the store to its owning task (or the global context) and open it.
    fn init(&self, context: &ProcessorContext) -> Result<()>;
    fn flush(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
    fn is_open(&self) -> bool;
    fn persistent(&self) -> bool {
        false
    }
    /// How to apply changelog records during restoration. `None` means the
    /// store cannot be rebuilt from a log.
    fn restore_callback(&self) -> Option<StateRestoreCallback> {
        None
    }
}

/// Recover the concrete store behind a trait object.
pub fn downcast_store<T: StateStore>(store: &Arc<dyn StateStore>) -> Option<Arc<T>> {
    store.clone().into_any().downcast::<T>().ok()
}

/// Raw byte key-value store.
pub trait KeyValueBytesStore: StateStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;
    /// Insert only if the key is absent; returns the existing value otherwise.
    fn put_if_absent(&self, key: Vec<u8>, value: Vec<u8>) -> Result<Option<Vec<u8>>>;
    /// Remove a key, returning the old value.
    fn delete(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put_all(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()>;
    /// Snapshot of every entry in key order.
    fn all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
    fn approximate_num_entries(&self) -> Result<u64>;
}

pub(crate) fn closed_store_error(name: &str) -> anyhow::Error {
    StreamsError::InvalidStateStore(format!("store {name} is currently closed")).into()
}

#[cfg(test)]
#[path = "tests/in_memory_tests.rs"]
mod in_memory_tests;

#[cfg(test)]
#[path = "tests/key_value_tests.rs"]
mod key_value_tests;
