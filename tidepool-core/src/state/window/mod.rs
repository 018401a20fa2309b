//! Windowed, segmented stores.
//!
//! Time is cut into segments of `segment_interval` milliseconds; each segment is
//! its own ordered byte store. Records are keyed by the window key schema
//! (`key ++ window_start ++ seq`), so a fetch for one key over a time range
//! only touches the segments overlapping that range. Segments whose newest
//! possible timestamp is older than `stream_time - retention` are dropped.

use super::*;
use crate::serdes::SerDes;
use std::sync::atomic::{AtomicI64, AtomicU32};

mod key_schema;
mod segmented;
mod segments;
mod store;
mod supplier;
mod typed;

pub use key_schema::*;
pub use segmented::*;
pub use segments::*;
pub use store::*;
pub use supplier::*;
pub use typed::*;

/// Default window size when none is configured: one minute.
pub const DEFAULT_WINDOW_SIZE_MS: i64 = 60_000;

/// Time interval `[start, end)` of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Window {
    pub fn new(start: Timestamp, size: i64) -> Self {
        Self {
            start,
            end: start.saturating_add(size),
        }
    }
}

/// A key tagged with the window it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Windowed<K> {
    pub key: K,
    pub window: Window,
}

impl<K> Windowed<K> {
    pub fn new(key: K, window: Window) -> Self {
        Self { key, window }
    }
}

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;
