use super::*;

/// Read-only key-value view over every local instance of a store.
pub struct CompositeReadOnlyKeyValueStore<K, V> {
    provider: Arc<QueryableStoreProvider>,
    store_name: String,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: 'static, V: 'static> CompositeReadOnlyKeyValueStore<K, V> {
    pub fn new(provider: Arc<QueryableStoreProvider>, store_name: impl Into<String>) -> Self {
        Self {
            provider,
            store_name: store_name.into(),
            _marker: PhantomData,
        }
    }

    fn stores(&self) -> Result<Vec<Arc<TypedKeyValueStore<K, V>>>> {
        self.provider.stores(&self.store_name)
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// A key lives in exactly one partition, so the first hit wins.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        for store in self.stores()? {
            if let Some(value) = store.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn all(&self) -> Result<Vec<(K, V)>> {
        let mut entries = Vec::new();
        for store in self.stores()? {
            entries.extend(store.all()?);
        }
        Ok(entries)
    }

    pub fn approximate_num_entries(&self) -> Result<u64> {
        let mut total: u64 = 0;
        for store in self.stores()? {
            total = total.saturating_add(store.approximate_num_entries()?);
        }
        Ok(total)
    }
}

/// Read-only window view over every local instance of a window store.
pub struct CompositeReadOnlyWindowStore<K, V> {
    provider: Arc<QueryableStoreProvider>,
    store_name: String,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: 'static, V: 'static> CompositeReadOnlyWindowStore<K, V> {
    pub fn new(provider: Arc<QueryableStoreProvider>, store_name: impl Into<String>) -> Self {
        Self {
            provider,
            store_name: store_name.into(),
            _marker: PhantomData,
        }
    }

    fn stores(&self) -> Result<Vec<Arc<TypedWindowStore<K, V>>>> {
        self.provider.stores(&self.store_name)
    }

    pub fn fetch(&self, key: &K, window_start: Timestamp) -> Result<Option<V>> {
        for store in self.stores()? {
            if let Some(value) = store.fetch(key, window_start)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn fetch_range(&self, key: &K, from: Timestamp, to: Timestamp) -> Result<Vec<(Timestamp, V)>> {
        for store in self.stores()? {
            let found = store.fetch_range(key, from, to)?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    pub fn fetch_all(&self, from: Timestamp, to: Timestamp) -> Result<Vec<(Windowed<K>, V)>> {
        let mut entries = Vec::new();
        for store in self.stores()? {
            entries.extend(store.fetch_all(from, to)?);
        }
        Ok(entries)
    }

    pub fn all(&self) -> Result<Vec<(Windowed<K>, V)>> {
        let mut entries = Vec::new();
        for store in self.stores()? {
            entries.extend(store.all()?);
        }
        Ok(entries)
    }
}
