use super::*;
use crate::config::StreamConfig;
use crate::serdes::join_timestamped;

pub(crate) type CodecResolver<T> =
    Box<dyn Fn(&StreamConfig) -> Option<Arc<dyn SerDes<T>>> + Send + Sync>;

pub(crate) struct Codecs<K, V> {
    pub(crate) key: Arc<dyn SerDes<K>>,
    pub(crate) value: Arc<dyn SerDes<V>>,
}

impl<K, V> Codecs<K, V> {
    /// Resolve both codecs against the config or fail with a configuration error.
    pub(crate) fn bind(
        store_name: &str,
        resolve_key: &CodecResolver<K>,
        resolve_value: &CodecResolver<V>,
        config: &StreamConfig,
    ) -> Result<Self> {
        let key = resolve_key(config).ok_or_else(|| {
            StreamsError::Configuration(format!(
                "no key codec for store {store_name} and no compatible default key codec"
            ))
        })?;
        let value = resolve_value(config).ok_or_else(|| {
            StreamsError::Configuration(format!(
                "no value codec for store {store_name} and no compatible default value codec"
            ))
        })?;
        Ok(Self { key, value })
    }
}

/// Typed view over a [`KeyValueBytesStore`].
///
/// Codecs are resolved once, at `init`: an explicitly supplied codec wins,
/// otherwise the context's default codec for the type is used. Any operation
/// before `init` fails.
pub struct TypedKeyValueStore<K, V> {
    inner: Arc<dyn KeyValueBytesStore>,
    resolve_key: CodecResolver<K>,
    resolve_value: CodecResolver<V>,
    codecs: OnceLock<Codecs<K, V>>,
    timestamped: bool,
}

/// Key-value store whose values carry the timestamp of the record that wrote them.
pub type TimestampedKeyValueStore<K, V> = TypedKeyValueStore<K, ValueAndTimestamp<V>>;

impl<K: 'static, V: 'static> TypedKeyValueStore<K, V> {
    pub fn new(
        inner: Arc<dyn KeyValueBytesStore>,
        key_serdes: Option<Arc<dyn SerDes<K>>>,
        value_serdes: Option<Arc<dyn SerDes<V>>>,
    ) -> Self {
        Self {
            inner,
            resolve_key: key_resolver(key_serdes),
            resolve_value: value_resolver(value_serdes),
            codecs: OnceLock::new(),
            timestamped: false,
        }
    }
}

impl<K: 'static, V: 'static> TypedKeyValueStore<K, ValueAndTimestamp<V>> {
    /// `value_serdes` encodes the plain value; the timestamp prefix is added on top.
    pub fn timestamped(
        inner: Arc<dyn KeyValueBytesStore>,
        key_serdes: Option<Arc<dyn SerDes<K>>>,
        value_serdes: Option<Arc<dyn SerDes<V>>>,
    ) -> Self {
        Self {
            inner,
            resolve_key: key_resolver(key_serdes),
            resolve_value: Box::new(move |config: &StreamConfig| {
                value_serdes
                    .clone()
                    .or_else(|| config.default_value_serdes::<V>())
                    .map(|inner| {
                        Arc::new(ValueAndTimestampSerDes::new(inner))
                            as Arc<dyn SerDes<ValueAndTimestamp<V>>>
                    })
            }),
            codecs: OnceLock::new(),
            timestamped: true,
        }
    }
}

pub(crate) fn key_resolver<K: 'static>(key_serdes: Option<Arc<dyn SerDes<K>>>) -> CodecResolver<K> {
    Box::new(move |config: &StreamConfig| {
        key_serdes
            .clone()
            .or_else(|| config.default_key_serdes::<K>())
    })
}

pub(crate) fn value_resolver<V: 'static>(
    value_serdes: Option<Arc<dyn SerDes<V>>>,
) -> CodecResolver<V> {
    Box::new(move |config: &StreamConfig| {
        value_serdes
            .clone()
            .or_else(|| config.default_value_serdes::<V>())
    })
}

impl<K, V> TypedKeyValueStore<K, V> {
    fn codecs(&self) -> Result<&Codecs<K, V>> {
        self.codecs.get().ok_or_else(|| {
            StreamsError::ProcessorState(format!(
                "store {} used before init; codecs are not bound",
                self.inner.name()
            ))
            .into()
        })
    }

    pub fn inner(&self) -> &Arc<dyn KeyValueBytesStore> {
        &self.inner
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let codecs = self.codecs()?;
        let raw_key = codecs.key.serialize(key)?;
        match self.inner.get(&raw_key)? {
            Some(raw) => Ok(Some(codecs.value.deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, key: &K, value: &V) -> Result<()> {
        let codecs = self.codecs()?;
        self.inner
            .put(codecs.key.serialize(key)?, codecs.value.serialize(value)?)
    }

    /// Returns the existing value when the key was already present.
    pub fn put_if_absent(&self, key: &K, value: &V) -> Result<Option<V>> {
        let codecs = self.codecs()?;
        let existing = self
            .inner
            .put_if_absent(codecs.key.serialize(key)?, codecs.value.serialize(value)?)?;
        existing
            .map(|raw| codecs.value.deserialize(&raw))
            .transpose()
    }

    pub fn delete(&self, key: &K) -> Result<Option<V>> {
        let codecs = self.codecs()?;
        let old = self.inner.delete(&codecs.key.serialize(key)?)?;
        old.map(|raw| codecs.value.deserialize(&raw)).transpose()
    }

    pub fn put_all(&self, entries: &[(K, V)]) -> Result<()> {
        let codecs = self.codecs()?;
        let raw = entries
            .iter()
            .map(|(k, v)| Ok((codecs.key.serialize(k)?, codecs.value.serialize(v)?)))
            .collect::<Result<Vec<_>>>()?;
        self.inner.put_all(raw)
    }

    pub fn all(&self) -> Result<Vec<(K, V)>> {
        let codecs = self.codecs()?;
        self.inner
            .all()?
            .into_iter()
            .map(|(k, v)| Ok((codecs.key.deserialize(&k)?, codecs.value.deserialize(&v)?)))
            .collect()
    }

    pub fn approximate_num_entries(&self) -> Result<u64> {
        self.inner.approximate_num_entries()
    }
}

impl<K, V> std::fmt::Debug for TypedKeyValueStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedKeyValueStore")
            .field("name", &self.inner.name())
            .field("timestamped", &self.timestamped)
            .finish_non_exhaustive()
    }
}

impl<K: 'static, V: 'static> StateStore for TypedKeyValueStore<K, V> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn init(&self, context: &ProcessorContext) -> Result<()> {
        if self.codecs.get().is_none() {
            let codecs = Codecs::bind(
                self.name(),
                &self.resolve_key,
                &self.resolve_value,
                context.config(),
            )?;
            // A concurrent init may have won; both bindings are equivalent.
            let _ = self.codecs.set(codecs);
        }
        self.inner.init(context)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn persistent(&self) -> bool {
        self.inner.persistent()
    }

    fn restore_callback(&self) -> Option<StateRestoreCallback> {
        let inner = self.inner.clone();
        if self.timestamped {
            Some(Arc::new(move |key: &[u8], value: &[u8], timestamp: Timestamp| {
                inner.put(key.to_vec(), join_timestamped(timestamp, value))
            }))
        } else {
            Some(Arc::new(move |key: &[u8], value: &[u8], _: Timestamp| {
                inner.put(key.to_vec(), value.to_vec())
            }))
        }
    }
}
