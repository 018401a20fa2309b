use super::*;

/// Byte store spread over time segments, keyed with [`WindowKeySchema`].
///
/// Tracks the highest timestamp it has seen (stream time); every write may
/// evict segments that fell out of retention.
#[derive(Debug)]
pub struct SegmentedBytesStore {
    name: String,
    segments: Segments,
    observed_stream_time: AtomicI64,
}

impl SegmentedBytesStore {
    pub fn new(name: impl Into<String>, retention: i64, segment_interval: i64) -> Self {
        let name = name.into();
        Self {
            segments: Segments::new(name.clone(), retention, segment_interval),
            name,
            observed_stream_time: AtomicI64::new(Timestamp::MIN),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &Segments {
        &self.segments
    }

    pub fn observed_stream_time(&self) -> Timestamp {
        self.observed_stream_time.load(Ordering::SeqCst)
    }

    /// Write under a schema key. Returns `false` when the record was dropped
    /// because its segment is already expired.
    pub fn put(&self, store_key: Vec<u8>, value: Vec<u8>) -> Result<bool> {
        let timestamp = WindowKeySchema::extract_timestamp(&store_key)?;
        let previous = self
            .observed_stream_time
            .fetch_max(timestamp, Ordering::SeqCst);
        let stream_time = previous.max(timestamp);

        let Some(segment) = self.segments.get_or_create(timestamp, stream_time)? else {
            debug!(
                "store {} skipping record for expired segment (timestamp {timestamp}, stream time {stream_time})",
                self.name
            );
            return Ok(false);
        };
        segment.store().put(store_key, value)?;

        let evicted = self.segments.cleanup(stream_time)?;
        if !evicted.is_empty() {
            debug!("store {} evicted segments {:?}", self.name, evicted);
        }
        Ok(true)
    }

    pub fn get(&self, store_key: &[u8]) -> Result<Option<Vec<u8>>> {
        let timestamp = WindowKeySchema::extract_timestamp(store_key)?;
        match self.segments.get(timestamp)? {
            Some(segment) => segment.store().get(store_key),
            None => Ok(None),
        }
    }

    pub fn remove(&self, store_key: &[u8]) -> Result<()> {
        let timestamp = WindowKeySchema::extract_timestamp(store_key)?;
        if let Some(segment) = self.segments.get(timestamp)? {
            segment.store().delete(store_key)?;
        }
        Ok(())
    }

    /// Entries for exactly `key` with window start in `[from, to]`, in time order.
    pub fn fetch(&self, key: &[u8], from: Timestamp, to: Timestamp) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let lower = WindowKeySchema::lower_range(key, from);
        let upper = WindowKeySchema::upper_range(key, to);
        let mut out = Vec::new();
        for segment in self.segments.segments_for_range(from, to)? {
            for (store_key, value) in segment.store().range(&lower, &upper)? {
                if WindowKeySchema::extract_key(&store_key)? != key {
                    continue;
                }
                let ts = WindowKeySchema::extract_timestamp(&store_key)?;
                if ts >= from && ts <= to {
                    out.push((store_key, value));
                }
            }
        }
        Ok(out)
    }

    /// Every entry with window start in `[from, to]`, segment by segment.
    pub fn fetch_all(&self, from: Timestamp, to: Timestamp) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for segment in self.segments.segments_for_range(from, to)? {
            for (store_key, value) in segment.store().all()? {
                let ts = WindowKeySchema::extract_timestamp(&store_key)?;
                if ts >= from && ts <= to {
                    out.push((store_key, value));
                }
            }
        }
        Ok(out)
    }

    pub fn all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for segment in self.segments.all_segments()? {
            out.extend(segment.store().all()?);
        }
        Ok(out)
    }

    pub fn clear(&self) -> Result<()> {
        self.segments.clear()
    }
}
