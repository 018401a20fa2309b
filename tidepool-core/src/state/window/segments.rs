use super::*;

/// One time slice of a segmented store.
#[derive(Debug)]
pub struct Segment {
    pub id: i64,
    store: InMemoryKeyValueStore,
}

impl Segment {
    fn new(store_name: &str, id: i64) -> Self {
        Self {
            id,
            store: InMemoryKeyValueStore::opened(format!("{store_name}.{id}")),
        }
    }

    pub fn store(&self) -> &InMemoryKeyValueStore {
        &self.store
    }
}

/// Owns the live segments of one store.
///
/// `segment_id` is the single place where a timestamp is mapped to a segment;
/// both the write path and the scan path go through it.
#[derive(Debug)]
pub struct Segments {
    store_name: String,
    segment_interval: i64,
    retention: i64,
    live: RwLock<BTreeMap<i64, Arc<Segment>>>,
}

impl Segments {
    pub fn new(store_name: impl Into<String>, retention: i64, segment_interval: i64) -> Self {
        Self {
            store_name: store_name.into(),
            segment_interval,
            retention,
            live: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn segment_id(&self, timestamp: Timestamp) -> i64 {
        timestamp.div_euclid(self.segment_interval)
    }

    /// Oldest segment id that must still be kept at `stream_time`.
    fn min_live_segment(&self, stream_time: Timestamp) -> i64 {
        let earliest = stream_time.saturating_sub(self.retention);
        // Segment `id` covers up to `(id + 1) * interval - 1`.
        self.segment_id(earliest)
    }

    /// Segment for a write at `timestamp`, creating it if needed. `None` when
    /// the timestamp is already outside retention.
    pub fn get_or_create(&self, timestamp: Timestamp, stream_time: Timestamp) -> Result<Option<Arc<Segment>>> {
        let id = self.segment_id(timestamp);
        if id < self.min_live_segment(stream_time) {
            return Ok(None);
        }
        let mut live = self
            .live
            .write()
            .map_err(|_| anyhow!("segments of {} lock poisoned", self.store_name))?;
        let segment = live
            .entry(id)
            .or_insert_with(|| Arc::new(Segment::new(&self.store_name, id)))
            .clone();
        Ok(Some(segment))
    }

    pub fn get(&self, timestamp: Timestamp) -> Result<Option<Arc<Segment>>> {
        let id = self.segment_id(timestamp);
        Ok(self
            .live
            .read()
            .map_err(|_| anyhow!("segments of {} lock poisoned", self.store_name))?
            .get(&id)
            .cloned())
    }

    /// Snapshot of the segments overlapping `[from, to]`, oldest first. The
    /// returned handles stay valid even if cleanup drops them from the live set.
    pub fn segments_for_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<Arc<Segment>>> {
        if from > to {
            return Ok(Vec::new());
        }
        let (low, high) = (self.segment_id(from), self.segment_id(to));
        Ok(self
            .live
            .read()
            .map_err(|_| anyhow!("segments of {} lock poisoned", self.store_name))?
            .range(low..=high)
            .map(|(_, s)| s.clone())
            .collect())
    }

    pub fn all_segments(&self) -> Result<Vec<Arc<Segment>>> {
        Ok(self
            .live
            .read()
            .map_err(|_| anyhow!("segments of {} lock poisoned", self.store_name))?
            .values()
            .cloned()
            .collect())
    }

    /// Drop every segment whose upper time bound is older than
    /// `stream_time - retention`. Returns the dropped ids.
    pub fn cleanup(&self, stream_time: Timestamp) -> Result<Vec<i64>> {
        let min_live = self.min_live_segment(stream_time);
        let mut live = self
            .live
            .write()
            .map_err(|_| anyhow!("segments of {} lock poisoned", self.store_name))?;
        let expired: Vec<i64> = live.range(..min_live).map(|(id, _)| *id).collect();
        for id in &expired {
            live.remove(id);
        }
        Ok(expired)
    }

    pub fn clear(&self) -> Result<()> {
        let mut live = self
            .live
            .write()
            .map_err(|_| anyhow!("segments of {} lock poisoned", self.store_name))?;
        for segment in live.values() {
            segment.store.mark_closed();
        }
        live.clear();
        Ok(())
    }
}
