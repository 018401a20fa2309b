use super::*;

// ============================================================================
// StreamTask
// ============================================================================

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Built but stores and nodes are not initialized yet.
    Created,
    Running,
    Closed,
}

#[derive(Debug)]
struct TaskInner {
    state: TaskState,
    queues: BTreeMap<TopicPartition, VecDeque<ConsumedRecord>>,
    /// Offset of the last processed record per partition.
    consumed: BTreeMap<TopicPartition, Offset>,
    /// Records were processed since the last commit.
    uncommitted: bool,
}

/// One task: a sub-topology instance bound to a set of partitions.
///
/// All methods take `&self`; the task is shared as an `Arc` between the task
/// manager and the thread's store view. Records are driven only by the owning
/// stream thread.
pub struct StreamTask {
    id: TaskId,
    partitions: Vec<TopicPartition>,
    application_id: String,
    guarantee: ProcessingGuarantee,
    timeout: Duration,
    topology: TaskTopology,
    context: Arc<ProcessorContext>,
    producer: Arc<dyn Producer>,
    log_prefix: String,
    inner: Mutex<TaskInner>,
}

impl StreamTask {
    pub fn new(
        id: TaskId,
        partitions: Vec<TopicPartition>,
        topology: &ProcessorTopology,
        config: Arc<StreamConfig>,
        producer: Arc<dyn Producer>,
        global_stores: GlobalStores,
    ) -> Result<Self> {
        let log_prefix = format!("stream-task[{id}] ");
        let task_topology = topology.instantiate(id)?;
        let collector = Arc::new(RecordCollector::new(producer.clone(), log_prefix.clone()));
        let context = Arc::new(ProcessorContext::for_task(
            id,
            config.clone(),
            task_topology.stores().clone(),
            global_stores,
            collector,
        ));
        let queues = partitions
            .iter()
            .map(|tp| (tp.clone(), VecDeque::new()))
            .collect();

        Ok(Self {
            id,
            partitions,
            application_id: config.settings.application_id.clone(),
            guarantee: config.settings.guarantee,
            timeout: config.settings.metadata_request_timeout(),
            topology: task_topology,
            context,
            producer,
            log_prefix,
            inner: Mutex::new(TaskInner {
                state: TaskState::Created,
                queues,
                consumed: BTreeMap::new(),
                uncommitted: false,
            }),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TaskInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("task {} lock poisoned", self.id))
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn partitions(&self) -> &[TopicPartition] {
        &self.partitions
    }

    pub fn context(&self) -> &Arc<ProcessorContext> {
        &self.context
    }

    pub fn state(&self) -> Result<TaskState> {
        Ok(self.lock()?.state)
    }

    /// Open stores, then init nodes. Under exactly-once the task producer
    /// starts its first transaction.
    pub fn initialize(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.state != TaskState::Created {
            return Ok(());
        }
        for store in self.topology.stores().values() {
            store.init(&self.context)?;
        }
        self.topology.init_nodes(&self.context)?;
        if self.guarantee == ProcessingGuarantee::ExactlyOnce {
            self.producer.init_transactions(self.timeout)?;
            self.producer.begin_transaction()?;
        }
        inner.state = TaskState::Running;
        info!(
            "{}initialized with partitions [{}]",
            self.log_prefix,
            self.partitions
                .iter()
                .map(|tp| tp.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    /// Buffer a record of one of the task's partitions.
    pub fn add_record(&self, record: ConsumedRecord) -> Result<()> {
        let tp = record.topic_partition();
        let mut inner = self.lock()?;
        let queue = inner.queues.get_mut(&tp).ok_or_else(|| {
            StreamsError::ProcessorState(format!(
                "{}partition {tp} is not assigned to this task",
                self.log_prefix
            ))
        })?;
        queue.push_back(record);
        Ok(())
    }

    pub fn buffered(&self) -> Result<usize> {
        Ok(self.lock()?.queues.values().map(VecDeque::len).sum())
    }

    pub fn can_process(&self) -> Result<bool> {
        let inner = self.lock()?;
        Ok(inner.state == TaskState::Running && inner.queues.values().any(|q| !q.is_empty()))
    }

    /// Process one buffered record: the head with the smallest timestamp,
    /// ties going to the lowest partition. Returns `false` when nothing was
    /// buffered.
    pub fn process(&self) -> Result<bool> {
        let record = {
            let mut inner = self.lock()?;
            if inner.state != TaskState::Running {
                return Ok(false);
            }
            let next = inner
                .queues
                .iter()
                .filter_map(|(tp, q)| q.front().map(|r| (r.timestamp, tp.clone())))
                .min_by_key(|(ts, _)| *ts)
                .map(|(_, tp)| tp);
            let Some(tp) = next else {
                return Ok(false);
            };
            match inner.queues.get_mut(&tp).and_then(VecDeque::pop_front) {
                Some(record) => record,
                None => return Ok(false),
            }
        };

        let source = self.topology.source_for(&record.topic).ok_or_else(|| {
            StreamsError::Configuration(format!(
                "{}no source node for topic {}",
                self.log_prefix, record.topic
            ))
        })?;
        self.context
            .set_record_context(RecordContext::from_record(&record));
        source.process_record(&record)?;

        let mut inner = self.lock()?;
        inner.consumed.insert(record.topic_partition(), record.offset);
        inner.uncommitted = true;
        Ok(true)
    }

    /// A processor asked for a commit while handling the last record. Eager
    /// per-task commits happen only on such a request; everything else waits
    /// for the thread's periodic commit.
    pub fn commit_needed(&self) -> Result<bool> {
        Ok(self.context.commit_requested() && self.lock()?.uncommitted)
    }

    pub fn has_uncommitted(&self) -> Result<bool> {
        Ok(self.lock()?.uncommitted)
    }

    /// Offsets to commit: one past the last processed record of each partition.
    pub fn committable_offsets(&self) -> Result<Vec<TopicPartitionOffset>> {
        Ok(next_offsets(&self.lock()?.consumed))
    }

    /// Flush stores and persist consumed offsets. A second call without new
    /// records in between does nothing and returns `false`.
    pub fn commit(&self, consumer: &dyn Consumer) -> Result<bool> {
        let mut inner = self.lock()?;
        self.context.clear_commit_request();
        if !inner.uncommitted {
            return Ok(false);
        }
        for store in self.topology.stores().values() {
            store.flush()?;
        }
        let offsets = next_offsets(&inner.consumed);

        match self.guarantee {
            ProcessingGuarantee::ExactlyOnce => {
                self.producer
                    .send_offsets_to_transaction(&offsets, &self.application_id, self.timeout)?;
                self.producer.commit_transaction(self.timeout)?;
                self.producer.begin_transaction()?;
            }
            ProcessingGuarantee::AtLeastOnce => {
                self.producer.flush(self.timeout)?;
                consumer.commit(&offsets)?;
            }
        }
        inner.uncommitted = false;
        debug!("{}committed {} offsets", self.log_prefix, offsets.len());
        Ok(true)
    }

    /// Close nodes and stores. Every item is attempted; the first failure is
    /// returned. An unclean close under exactly-once aborts the open
    /// transaction.
    pub fn close(&self, clean: bool) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.state == TaskState::Closed {
            return Ok(());
        }
        let was_running = inner.state == TaskState::Running;
        inner.state = TaskState::Closed;
        inner.queues.values_mut().for_each(VecDeque::clear);
        drop(inner);

        let nodes = self.topology.close_nodes();
        let stores = attempt_all(self.topology.stores().values(), |store| store.close());

        let producer = if self.guarantee == ProcessingGuarantee::ExactlyOnce {
            let abort = if !clean && was_running {
                self.producer.abort_transaction(self.timeout)
            } else {
                Ok(())
            };
            abort.and(self.producer.close())
        } else {
            Ok(())
        };

        info!("{}closed (clean: {clean})", self.log_prefix);
        nodes.and(stores).and(producer)
    }

    pub fn get_store(&self, name: &str) -> Option<Arc<dyn StateStore>> {
        self.topology.stores().get(name).cloned()
    }

    pub fn stores(&self) -> &BTreeMap<String, Arc<dyn StateStore>> {
        self.topology.stores()
    }
}

/// One past the last processed offset of each partition.
fn next_offsets(consumed: &BTreeMap<TopicPartition, Offset>) -> Vec<TopicPartitionOffset> {
    consumed
        .iter()
        .map(|(tp, offset)| TopicPartitionOffset::new(tp.clone(), offset + 1))
        .collect()
}

impl std::fmt::Debug for StreamTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTask")
            .field("id", &self.id)
            .field("partitions", &self.partitions)
            .field("guarantee", &self.guarantee)
            .finish()
    }
}
