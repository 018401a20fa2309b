use super::*;
use crate::state::key_value::{CodecResolver, Codecs, key_resolver, value_resolver};

/// Typed window store over a [`SegmentedWindowStore`]; codecs bind at `init`
/// like [`TypedKeyValueStore`].
pub struct TypedWindowStore<K, V> {
    inner: Arc<SegmentedWindowStore>,
    resolve_key: CodecResolver<K>,
    resolve_value: CodecResolver<V>,
    codecs: OnceLock<Codecs<K, V>>,
}

impl<K: 'static, V: 'static> TypedWindowStore<K, V> {
    pub fn new(
        inner: Arc<SegmentedWindowStore>,
        key_serdes: Option<Arc<dyn SerDes<K>>>,
        value_serdes: Option<Arc<dyn SerDes<V>>>,
    ) -> Self {
        Self {
            inner,
            resolve_key: key_resolver(key_serdes),
            resolve_value: value_resolver(value_serdes),
            codecs: OnceLock::new(),
        }
    }
}

impl<K, V> TypedWindowStore<K, V> {
    fn codecs(&self) -> Result<&Codecs<K, V>> {
        self.codecs.get().ok_or_else(|| {
            StreamsError::ProcessorState(format!(
                "window store {} used before init; codecs are not bound",
                self.inner.name()
            ))
            .into()
        })
    }

    pub fn inner(&self) -> &Arc<SegmentedWindowStore> {
        &self.inner
    }

    pub fn put(&self, key: &K, value: &V, window_start: Timestamp) -> Result<()> {
        let codecs = self.codecs()?;
        self.inner.put(
            &codecs.key.serialize(key)?,
            Some(codecs.value.serialize(value)?),
            window_start,
        )
    }

    pub fn delete(&self, key: &K, window_start: Timestamp) -> Result<()> {
        let codecs = self.codecs()?;
        self.inner
            .put(&codecs.key.serialize(key)?, None, window_start)
    }

    pub fn fetch(&self, key: &K, window_start: Timestamp) -> Result<Option<V>> {
        let codecs = self.codecs()?;
        self.inner
            .fetch(&codecs.key.serialize(key)?, window_start)?
            .map(|raw| codecs.value.deserialize(&raw))
            .transpose()
    }

    pub fn fetch_range(&self, key: &K, from: Timestamp, to: Timestamp) -> Result<Vec<(Timestamp, V)>> {
        let codecs = self.codecs()?;
        self.inner
            .fetch_range(&codecs.key.serialize(key)?, from, to)?
            .into_iter()
            .map(|(ts, raw)| Ok((ts, codecs.value.deserialize(&raw)?)))
            .collect()
    }

    pub fn fetch_all(&self, from: Timestamp, to: Timestamp) -> Result<Vec<(Windowed<K>, V)>> {
        let entries = self.inner.fetch_all(from, to)?;
        self.decode_windowed(entries)
    }

    pub fn all(&self) -> Result<Vec<(Windowed<K>, V)>> {
        let entries = self.inner.all()?;
        self.decode_windowed(entries)
    }

    fn decode_windowed(&self, entries: Vec<(Windowed<Vec<u8>>, Vec<u8>)>) -> Result<Vec<(Windowed<K>, V)>> {
        let codecs = self.codecs()?;
        entries
            .into_iter()
            .map(|(windowed, raw)| {
                Ok((
                    Windowed::new(codecs.key.deserialize(&windowed.key)?, windowed.window),
                    codecs.value.deserialize(&raw)?,
                ))
            })
            .collect()
    }
}

impl<K, V> std::fmt::Debug for TypedWindowStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedWindowStore")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

impl<K: 'static, V: 'static> StateStore for TypedWindowStore<K, V> {
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
}
