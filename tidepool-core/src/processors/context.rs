use super::*;

/// Metadata of the record currently being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordContext {
    pub topic: String,
    pub partition: u32,
    pub offset: Offset,
    pub timestamp: Timestamp,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl RecordContext {
    pub fn from_record(record: &ConsumedRecord) -> Self {
        Self {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            timestamp: record.timestamp,
            headers: record.headers.clone(),
        }
    }
}

/// Processing context shared by every node and store of one task.
///
/// It is created per task (or once for global stores) and passed around as an
/// `Arc`; there is no process-wide registry.
pub struct ProcessorContext {
    task_id: Option<TaskId>,
    config: Arc<StreamConfig>,
    record: RwLock<RecordContext>,
    stores: BTreeMap<String, Arc<dyn StateStore>>,
    global_stores: Arc<BTreeMap<String, Arc<dyn StateStore>>>,
    collector: Option<Arc<RecordCollector>>,
    commit_requested: AtomicBool,
    log_prefix: String,
}

impl ProcessorContext {
    pub fn for_task(
        task_id: TaskId,
        config: Arc<StreamConfig>,
        stores: BTreeMap<String, Arc<dyn StateStore>>,
        global_stores: Arc<BTreeMap<String, Arc<dyn StateStore>>>,
        collector: Arc<RecordCollector>,
    ) -> Self {
        Self {
            task_id: Some(task_id),
            config,
            record: RwLock::new(RecordContext::default()),
            stores,
            global_stores,
            collector: Some(collector),
            commit_requested: AtomicBool::new(false),
            log_prefix: format!("stream-task[{task_id}] "),
        }
    }

    /// Context for global stores: no task, no collector.
    pub fn for_global(config: Arc<StreamConfig>) -> Self {
        Self {
            task_id: None,
            config,
            record: RwLock::new(RecordContext::default()),
            stores: BTreeMap::new(),
            global_stores: Arc::new(BTreeMap::new()),
            collector: None,
            commit_requested: AtomicBool::new(false),
            log_prefix: "global-state ".to_string(),
        }
    }

    /// Context with only a configuration, for running nodes or stores outside
    /// a task.
    pub fn standalone(config: Arc<StreamConfig>) -> Self {
        Self {
            task_id: None,
            config,
            record: RwLock::new(RecordContext::default()),
            stores: BTreeMap::new(),
            global_stores: Arc::new(BTreeMap::new()),
            collector: None,
            commit_requested: AtomicBool::new(false),
            log_prefix: String::new(),
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn application_id(&self) -> &str {
        &self.config.settings.application_id
    }

    pub fn log_prefix(&self) -> &str {
        &self.log_prefix
    }

    /// `stream-task[{id}]|processor[{name}] ` inside a task.
    pub fn processor_log_prefix(&self, processor: &str) -> String {
        match self.task_id {
            Some(task_id) => format!("stream-task[{task_id}]|processor[{processor}] "),
            None => format!("processor[{processor}] "),
        }
    }

    pub fn record_context(&self) -> RecordContext {
        self.record
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_record_context(&self, record: RecordContext) {
        *self
            .record
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = record;
    }

    pub fn timestamp(&self) -> Timestamp {
        self.record
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .timestamp
    }

    /// Overwrite the timestamp seen by downstream nodes and sinks.
    pub fn change_timestamp(&self, timestamp: Timestamp) {
        self.record
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .timestamp = timestamp;
    }

    /// Task-local store first, then global stores.
    pub fn get_state_store(&self, name: &str) -> Option<Arc<dyn StateStore>> {
        self.stores
            .get(name)
            .or_else(|| self.global_stores.get(name))
            .cloned()
    }

    /// Typed access to a store; fails when the store is unknown or has another type.
    pub fn get_store<T: StateStore>(&self, name: &str) -> Result<Arc<T>> {
        let store = self.get_state_store(name).ok_or_else(|| {
            StreamsError::Configuration(format!(
                "{}store {name} is not connected to this task",
                self.log_prefix
            ))
        })?;
        downcast_store::<T>(&store).ok_or_else(|| {
            StreamsError::Configuration(format!(
                "{}store {name} has a different type than requested",
                self.log_prefix
            ))
            .into()
        })
    }

    pub fn stores(&self) -> &BTreeMap<String, Arc<dyn StateStore>> {
        &self.stores
    }

    pub fn collector(&self) -> Result<&Arc<RecordCollector>> {
        self.collector.as_ref().ok_or_else(|| {
            StreamsError::Configuration(format!(
                "{}no record collector; sinks need a task context",
                self.log_prefix
            ))
            .into()
        })
    }

    /// Ask the owning task to commit right after the current record.
    pub fn request_commit(&self) {
        self.commit_requested.store(true, Ordering::SeqCst);
    }

    pub fn commit_requested(&self) -> bool {
        self.commit_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_commit_request(&self) {
        self.commit_requested.store(false, Ordering::SeqCst);
    }
}
