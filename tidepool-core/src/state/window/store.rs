use super::*;

/// Raw window store: raw keys and values, addressed by window start.
///
/// With `retain_duplicates` every put gets a fresh sequence number, so several
/// values can live under the same key and window; otherwise a put overwrites.
#[derive(Debug)]
pub struct SegmentedWindowStore {
    bytes: SegmentedBytesStore,
    window_size: i64,
    retain_duplicates: bool,
    seq: AtomicU32,
    open: AtomicBool,
}

impl SegmentedWindowStore {
    pub fn new(
        name: impl Into<String>,
        retention: i64,
        segment_interval: i64,
        window_size: i64,
        retain_duplicates: bool,
    ) -> Self {
        Self {
            bytes: SegmentedBytesStore::new(name, retention, segment_interval),
            window_size,
            retain_duplicates,
            seq: AtomicU32::new(0),
            open: AtomicBool::new(false),
        }
    }

    pub fn window_size(&self) -> i64 {
        self.window_size
    }

    pub fn retain_duplicates(&self) -> bool {
        self.retain_duplicates
    }

    pub fn observed_stream_time(&self) -> Timestamp {
        self.bytes.observed_stream_time()
    }

    fn check_open(&self) -> Result<()> {
        if !self.is_open() {
            return Err(closed_store_error(self.bytes.name()));
        }
        Ok(())
    }

    fn next_seq(&self) -> u32 {
        if self.retain_duplicates {
            self.seq.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
        } else {
            0
        }
    }

    /// Write `value` for `key` in the window starting at `window_start`.
    /// `None` deletes (a no-op when duplicates are retained).
    pub fn put(&self, key: &[u8], value: Option<Vec<u8>>, window_start: Timestamp) -> Result<()> {
        self.check_open()?;
        match value {
            Some(value) => {
                let store_key = WindowKeySchema::to_store_key(key, window_start, self.next_seq());
                self.bytes.put(store_key, value)?;
            }
            None if !self.retain_duplicates => {
                self.bytes
                    .remove(&WindowKeySchema::to_store_key(key, window_start, 0))?;
            }
            None => {}
        }
        Ok(())
    }

    /// Value for `key` in the window starting exactly at `window_start`.
    pub fn fetch(&self, key: &[u8], window_start: Timestamp) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self
            .bytes
            .fetch(key, window_start, window_start)?
            .into_iter()
            .next()
            .map(|(_, value)| value))
    }

    /// `(window_start, value)` pairs for `key` with start in `[from, to]`.
    pub fn fetch_range(&self, key: &[u8], from: Timestamp, to: Timestamp) -> Result<Vec<(Timestamp, Vec<u8>)>> {
        self.check_open()?;
        self.bytes
            .fetch(key, from, to)?
            .into_iter()
            .map(|(store_key, value)| Ok((WindowKeySchema::extract_timestamp(&store_key)?, value)))
            .collect()
    }

    /// Every windowed entry with start in `[from, to]`, across all keys.
    pub fn fetch_all(&self, from: Timestamp, to: Timestamp) -> Result<Vec<(Windowed<Vec<u8>>, Vec<u8>)>> {
        self.check_open()?;
        let entries = self.bytes.fetch_all(from, to)?;
        self.to_windowed(entries)
    }

    pub fn all(&self) -> Result<Vec<(Windowed<Vec<u8>>, Vec<u8>)>> {
        self.check_open()?;
        let entries = self.bytes.all()?;
        self.to_windowed(entries)
    }

    fn to_windowed(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Vec<(Windowed<Vec<u8>>, Vec<u8>)>> {
        entries
            .into_iter()
            .map(|(store_key, value)| {
                let key = WindowKeySchema::extract_key(&store_key)?.to_vec();
                let start = WindowKeySchema::extract_timestamp(&store_key)?;
                Ok((Windowed::new(key, Window::new(start, self.window_size)), value))
            })
            .collect()
    }
}

impl StateStore for SegmentedWindowStore {
    fn name(&self) -> &str {
        self.bytes.name()
    }

    fn init(&self, context: &ProcessorContext) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        debug!(
            "{}window store {} opened (window size {}ms)",
            context.log_prefix(),
            self.name(),
            self.window_size
        );
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        self.bytes.clear()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
