//! Store builders. A topology holds builders, not stores: every task builds
//! its own fresh instance.

use super::*;
use crate::state::window::{SegmentedWindowStore, TypedWindowStore, WindowBytesStoreSupplier};

/// Produces a new store instance per task.
pub trait StoreBuilder: Send + Sync {
    fn name(&self) -> &str;
    fn build(&self) -> Arc<dyn StateStore>;
}

/// Produces raw byte stores.
pub trait KeyValueBytesStoreSupplier: Send + Sync {
    fn name(&self) -> &str;
    fn get(&self) -> Arc<dyn KeyValueBytesStore>;
}

#[derive(Debug, Clone)]
pub struct InMemoryKeyValueBytesStoreSupplier {
    name: String,
}

impl KeyValueBytesStoreSupplier for InMemoryKeyValueBytesStoreSupplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self) -> Arc<dyn KeyValueBytesStore> {
        Arc::new(InMemoryKeyValueStore::new(self.name.clone()))
    }
}

pub struct KeyValueStoreBuilder<K, V> {
    supplier: Arc<dyn KeyValueBytesStoreSupplier>,
    key_serdes: Option<Arc<dyn SerDes<K>>>,
    value_serdes: Option<Arc<dyn SerDes<V>>>,
    timestamped: bool,
}

impl<K: 'static, V: 'static> StoreBuilder for KeyValueStoreBuilder<K, V> {
    fn name(&self) -> &str {
        self.supplier.name()
    }

    fn build(&self) -> Arc<dyn StateStore> {
        if self.timestamped {
            Arc::new(TypedKeyValueStore::<K, ValueAndTimestamp<V>>::timestamped(
                self.supplier.get(),
                self.key_serdes.clone(),
                self.value_serdes.clone(),
            ))
        } else {
            Arc::new(TypedKeyValueStore::<K, V>::new(
                self.supplier.get(),
                self.key_serdes.clone(),
                self.value_serdes.clone(),
            ))
        }
    }
}

pub struct WindowStoreBuilder<K, V> {
    supplier: WindowBytesStoreSupplier,
    key_serdes: Option<Arc<dyn SerDes<K>>>,
    value_serdes: Option<Arc<dyn SerDes<V>>>,
}

impl<K: 'static, V: 'static> StoreBuilder for WindowStoreBuilder<K, V> {
    fn name(&self) -> &str {
        self.supplier.name()
    }

    fn build(&self) -> Arc<dyn StateStore> {
        let inner: Arc<SegmentedWindowStore> = Arc::new(self.supplier.get());
        Arc::new(TypedWindowStore::<K, V>::new(
            inner,
            self.key_serdes.clone(),
            self.value_serdes.clone(),
        ))
    }
}

/// Builder backed by a closure; handy for custom store types.
pub struct FnStoreBuilder {
    name: String,
    factory: Box<dyn Fn() -> Arc<dyn StateStore> + Send + Sync>,
}

impl FnStoreBuilder {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn StateStore> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
        }
    }
}

impl StoreBuilder for FnStoreBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> Arc<dyn StateStore> {
        (self.factory)()
    }
}

/// Entry points for declaring stores.
pub struct Stores;

impl Stores {
    pub fn in_memory_key_value_store(name: impl Into<String>) -> Arc<dyn KeyValueBytesStoreSupplier> {
        Arc::new(InMemoryKeyValueBytesStoreSupplier { name: name.into() })
    }

    pub fn in_memory_window_store(
        name: impl Into<String>,
        retention_ms: i64,
        window_size_ms: i64,
        retain_duplicates: bool,
    ) -> Result<WindowBytesStoreSupplier> {
        WindowBytesStoreSupplier::new(name, retention_ms, Some(window_size_ms), retain_duplicates)
    }

    /// Codecs left as `None` fall back to the configured defaults at init.
    pub fn key_value_store_builder<K: 'static, V: 'static>(
        supplier: Arc<dyn KeyValueBytesStoreSupplier>,
        key_serdes: Option<Arc<dyn SerDes<K>>>,
        value_serdes: Option<Arc<dyn SerDes<V>>>,
    ) -> Arc<dyn StoreBuilder> {
        Arc::new(KeyValueStoreBuilder {
            supplier,
            key_serdes,
            value_serdes,
            timestamped: false,
        })
    }

    pub fn timestamped_key_value_store_builder<K: 'static, V: 'static>(
        supplier: Arc<dyn KeyValueBytesStoreSupplier>,
        key_serdes: Option<Arc<dyn SerDes<K>>>,
        value_serdes: Option<Arc<dyn SerDes<V>>>,
    ) -> Arc<dyn StoreBuilder> {
        Arc::new(KeyValueStoreBuilder {
            supplier,
            key_serdes,
            value_serdes,
            timestamped: true,
        })
    }

    pub fn window_store_builder<K: 'static, V: 'static>(
        supplier: WindowBytesStoreSupplier,
        key_serdes: Option<Arc<dyn SerDes<K>>>,
        value_serdes: Option<Arc<dyn SerDes<V>>>,
    ) -> Arc<dyn StoreBuilder> {
        Arc::new(WindowStoreBuilder {
            supplier,
            key_serdes,
            value_serdes,
        })
    }
}
