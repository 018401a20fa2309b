//! Codecs between typed keys/values and the raw bytes held by the log and the
//! byte stores.

use anyhow::{Result, anyhow};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::sync::Arc;

mod binary;
mod string;
mod timestamped;

pub use binary::*;
pub use string::*;
pub use timestamped::*;

/// Serializer plus deserializer for one type.
pub trait SerDes<T>: Send + Sync {
    fn serialize(&self, data: &T) -> Result<Vec<u8>>;
    fn deserialize(&self, data: &[u8]) -> Result<T>;
}

impl<T, S: SerDes<T> + ?Sized> SerDes<T> for Arc<S> {
    fn serialize(&self, data: &T) -> Result<Vec<u8>> {
        (**self).serialize(data)
    }

    fn deserialize(&self, data: &[u8]) -> Result<T> {
        (**self).deserialize(data)
    }
}

#[cfg(test)]
#[path = "tests/serdes_tests.rs"]
mod tests;
