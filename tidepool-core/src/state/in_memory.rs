//! BTreeMap-based byte store.
//!
//! Entries are kept ordered by raw key bytes, so full scans come back sorted and
//! the window layer can reuse this store as a segment.

use super::*;

#[derive(Debug)]
pub struct InMemoryKeyValueStore {
    name: String,
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    open: AtomicBool,
}

impl InMemoryKeyValueStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
            open: AtomicBool::new(false),
        }
    }

    /// A store that is usable without `init`, for segments owned by a parent store.
    pub(crate) fn opened(name: impl Into<String>) -> Self {
        let store = Self::new(name);
        store.open.store(true, Ordering::SeqCst);
        store
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        if !self.is_open() {
            return Err(closed_store_error(&self.name));
        }
        self.entries
            .read()
            .map_err(|_| anyhow!("store {} lock poisoned", self.name))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        if !self.is_open() {
            return Err(closed_store_error(&self.name));
        }
        self.entries
            .write()
            .map_err(|_| anyhow!("store {} lock poisoned", self.name))
    }

    /// Entries with `from <= key <= to`, in key order.
    pub fn range(&self, from: &[u8], to: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if from > to {
            return Ok(Vec::new());
        }
        let entries = self.read()?;
        Ok(entries
            .range(from.to_vec()..=to.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl StateStore for InMemoryKeyValueStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, context: &ProcessorContext) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        debug!("{}store {} opened", context.log_prefix(), self.name);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl KeyValueBytesStore for InMemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.write()?.insert(key, value);
        Ok(())
    }

    fn put_if_absent(&self, key: Vec<u8>, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut entries = self.write()?;
        if let Some(existing) = entries.get(&key) {
            return Ok(Some(existing.clone()));
        }
        entries.insert(key, value);
        Ok(None)
    }

    fn delete(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.write()?.remove(key))
    }

    fn put_all(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        let mut map = self.write()?;
        for (key, value) in entries {
            map.insert(key, value);
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .read()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn approximate_num_entries(&self) -> Result<u64> {
        Ok(self.read()?.len() as u64)
    }
}
