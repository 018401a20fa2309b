//! Interactive queries over local state.
//!
//! A [`QueryableStoreProvider`] looks a store name up in the global stores
//! first, then in the active tasks of every stream thread. Results are
//! read-only composite views that resolve the underlying stores again on each
//! read, so a store that migrates away after the lookup is reported on the next
//! read rather than silently served stale.

use crate::error::StreamsError;
use crate::serdes::ValueAndTimestamp;
use crate::state::window::{TypedWindowStore, Windowed};
use crate::state::{StateStore, TypedKeyValueStore, downcast_store};
use crate::task::GlobalStores;
use crate::thread::ThreadState;
use crate::types::Timestamp;
use anyhow::Result;
use std::marker::PhantomData;
use std::sync::Arc;

mod composite;
mod provider;
mod store_types;

pub use composite::*;
pub use provider::*;
pub use store_types::*;

/// What a store provider needs to know about a stream thread.
pub trait ThreadStoreView: Send + Sync {
    fn thread_state(&self) -> Result<ThreadState>;
    /// Every store with this name across the thread's active tasks.
    fn stores_named(&self, name: &str) -> Result<Vec<Arc<dyn StateStore>>>;
}

pub(crate) fn migrated_error(store_name: &str) -> anyhow::Error {
    StreamsError::InvalidStateStore(format!(
        "the state store, {store_name}, may have migrated to another instance."
    ))
    .into()
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
