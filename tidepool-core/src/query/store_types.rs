use super::*;

/// A kind of store that can be queried, and the view handed back for it.
pub trait QueryableStoreType: Send + Sync + 'static {
    type Store: StateStore;
    type Output;

    fn create(&self, provider: Arc<QueryableStoreProvider>, store_name: &str) -> Self::Output;
}

pub struct KeyValueStoreType<K, V>(PhantomData<fn() -> (K, V)>);

impl<K: 'static, V: 'static> QueryableStoreType for KeyValueStoreType<K, V> {
    type Store = TypedKeyValueStore<K, V>;
    type Output = CompositeReadOnlyKeyValueStore<K, V>;

    fn create(&self, provider: Arc<QueryableStoreProvider>, store_name: &str) -> Self::Output {
        CompositeReadOnlyKeyValueStore::new(provider, store_name)
    }
}

pub struct TimestampedKeyValueStoreType<K, V>(PhantomData<fn() -> (K, V)>);

impl<K: 'static, V: 'static> QueryableStoreType for TimestampedKeyValueStoreType<K, V> {
    type Store = TypedKeyValueStore<K, ValueAndTimestamp<V>>;
    type Output = CompositeReadOnlyKeyValueStore<K, ValueAndTimestamp<V>>;

    fn create(&self, provider: Arc<QueryableStoreProvider>, store_name: &str) -> Self::Output {
        CompositeReadOnlyKeyValueStore::new(provider, store_name)
    }
}

pub struct WindowStoreType<K, V>(PhantomData<fn() -> (K, V)>);

impl<K: 'static, V: 'static> QueryableStoreType for WindowStoreType<K, V> {
    type Store = TypedWindowStore<K, V>;
    type Output = CompositeReadOnlyWindowStore<K, V>;

    fn create(&self, provider: Arc<QueryableStoreProvider>, store_name: &str) -> Self::Output {
        CompositeReadOnlyWindowStore::new(provider, store_name)
    }
}

/// Constructors for the queryable store kinds.
pub struct QueryableStoreTypes;

impl QueryableStoreTypes {
    pub fn key_value<K, V>() -> KeyValueStoreType<K, V> {
        KeyValueStoreType(PhantomData)
    }

    pub fn timestamped_key_value<K, V>() -> TimestampedKeyValueStoreType<K, V> {
        TimestampedKeyValueStoreType(PhantomData)
    }

    pub fn window<K, V>() -> WindowStoreType<K, V> {
        WindowStoreType(PhantomData)
    }
}

/// Which store to query and how to view it.
pub struct StoreQueryParameters<Q> {
    store_name: String,
    query_type: Q,
}

impl<Q: QueryableStoreType> StoreQueryParameters<Q> {
    pub fn from_name_and_type(store_name: impl Into<String>, query_type: Q) -> Self {
        Self {
            store_name: store_name.into(),
            query_type,
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn query_type(&self) -> &Q {
        &self.query_type
    }
}
