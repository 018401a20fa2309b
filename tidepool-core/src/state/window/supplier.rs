use super::*;

const MIN_SEGMENT_INTERVAL_MS: i64 = 60_000;

/// Describes how to build a [`SegmentedWindowStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBytesStoreSupplier {
    name: String,
    retention_ms: i64,
    segment_interval_ms: i64,
    window_size_ms: i64,
    retain_duplicates: bool,
}

impl WindowBytesStoreSupplier {
    /// `window_size_ms` defaults to one minute. The segment interval defaults to
    /// half the retention, but never less than one minute.
    pub fn new(
        name: impl Into<String>,
        retention_ms: i64,
        window_size_ms: Option<i64>,
        retain_duplicates: bool,
    ) -> Result<Self> {
        let name = name.into();
        let window_size_ms = window_size_ms.unwrap_or(DEFAULT_WINDOW_SIZE_MS);
        if retention_ms <= 0 || window_size_ms <= 0 {
            return Err(StreamsError::Configuration(format!(
                "window store {name}: retention and window size must be positive"
            ))
            .into());
        }
        if retention_ms < window_size_ms {
            return Err(StreamsError::Configuration(format!(
                "window store {name}: retention ({retention_ms}ms) is shorter than the window size ({window_size_ms}ms)"
            ))
            .into());
        }
        Ok(Self {
            name,
            retention_ms,
            segment_interval_ms: (retention_ms / 2).max(MIN_SEGMENT_INTERVAL_MS),
            window_size_ms,
            retain_duplicates,
        })
    }

    pub fn with_segment_interval(mut self, segment_interval_ms: i64) -> Result<Self> {
        if segment_interval_ms <= 0 {
            return Err(StreamsError::Configuration(format!(
                "window store {}: segment interval must be positive",
                self.name
            ))
            .into());
        }
        self.segment_interval_ms = segment_interval_ms;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_ms
    }

    pub fn segment_interval_ms(&self) -> i64 {
        self.segment_interval_ms
    }

    pub fn window_size_ms(&self) -> i64 {
        self.window_size_ms
    }

    pub fn get(&self) -> SegmentedWindowStore {
        SegmentedWindowStore::new(
            self.name.clone(),
            self.retention_ms,
            self.segment_interval_ms,
            self.window_size_ms,
            self.retain_duplicates,
        )
    }
}
