use super::*;

/// Owns the active tasks of one stream thread.
///
/// Tasks are created when the group assigns partitions and closed when they
/// are revoked. Records polled by the thread are routed here to the task that
/// owns their partition.
pub struct TaskManager {
    creator: TaskCreator,
    tasks: RwLock<BTreeMap<TaskId, Arc<StreamTask>>>,
    by_partition: RwLock<HashMap<TopicPartition, TaskId>>,
    consumer: OnceLock<Arc<dyn Consumer>>,
    rebalance_in_progress: AtomicBool,
    log_prefix: String,
}

impl TaskManager {
    pub fn new(creator: TaskCreator, log_prefix: impl Into<String>) -> Self {
        Self {
            creator,
            tasks: RwLock::new(BTreeMap::new()),
            by_partition: RwLock::new(HashMap::new()),
            consumer: OnceLock::new(),
            rebalance_in_progress: AtomicBool::new(false),
            log_prefix: log_prefix.into(),
        }
    }

    /// Consumer used for at-least-once offset commits. Bound once.
    pub fn set_consumer(&self, consumer: Arc<dyn Consumer>) -> Result<()> {
        self.consumer
            .set(consumer)
            .map_err(|_| anyhow!("{}consumer already set", self.log_prefix))
    }

    fn consumer(&self) -> Result<&Arc<dyn Consumer>> {
        self.consumer.get().ok_or_else(|| {
            StreamsError::Configuration(format!("{}no consumer bound to the task manager", self.log_prefix))
                .into()
        })
    }

    pub fn set_rebalance_in_progress(&self, in_progress: bool) {
        self.rebalance_in_progress.store(in_progress, Ordering::SeqCst);
    }

    pub fn rebalance_in_progress(&self) -> bool {
        self.rebalance_in_progress.load(Ordering::SeqCst)
    }

    fn read_tasks(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<TaskId, Arc<StreamTask>>>> {
        self.tasks
            .read()
            .map_err(|_| anyhow!("{}task table lock poisoned", self.log_prefix))
    }

    fn write_tasks(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<TaskId, Arc<StreamTask>>>> {
        self.tasks
            .write()
            .map_err(|_| anyhow!("{}task table lock poisoned", self.log_prefix))
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Create and initialize one task per (topic group, partition) among the
    /// assigned partitions. Partitions of topics outside the topology are
    /// skipped with a warning.
    pub fn create_tasks(&self, assigned: &[TopicPartition]) -> Result<()> {
        let topology = self.creator.topology();
        let mut grouped: BTreeMap<TaskId, Vec<TopicPartition>> = BTreeMap::new();
        for tp in assigned {
            match topology.group_for_topic(&tp.topic) {
                Some(group) => grouped
                    .entry(TaskId::new(group, tp.partition))
                    .or_default()
                    .push(tp.clone()),
                None => warn!("{}ignoring partition {tp} of unknown topic", self.log_prefix),
            }
        }

        for (task_id, partitions) in grouped {
            if self.read_tasks()?.contains_key(&task_id) {
                continue;
            }
            let task = Arc::new(self.creator.create(task_id, partitions.clone())?);
            task.initialize()?;

            let mut index = self
                .by_partition
                .write()
                .map_err(|_| anyhow!("{}partition index lock poisoned", self.log_prefix))?;
            for tp in partitions {
                index.insert(tp, task_id);
            }
            self.write_tasks()?.insert(task_id, task);
            debug!("{}created task {task_id}", self.log_prefix);
        }
        Ok(())
    }

    /// Commit and close every active task. All tasks are attempted; the first
    /// failure is returned.
    pub fn revoke_tasks(&self, revoked: &[TopicPartition]) -> Result<()> {
        let tasks: Vec<Arc<StreamTask>> = std::mem::take(&mut *self.write_tasks()?)
            .into_values()
            .collect();
        self.by_partition
            .write()
            .map_err(|_| anyhow!("{}partition index lock poisoned", self.log_prefix))?
            .clear();
        if !tasks.is_empty() {
            info!(
                "{}revoking {} partitions, closing {} tasks",
                self.log_prefix,
                revoked.len(),
                tasks.len()
            );
        }
        attempt_all(tasks, |task| self.commit_and_close(&task))
    }

    fn commit_and_close(&self, task: &StreamTask) -> Result<()> {
        let committed = match self.consumer.get() {
            Some(consumer) => task.commit(consumer.as_ref()).map(|_| ()),
            None => Ok(()),
        };
        match committed {
            Ok(()) => task.close(true),
            Err(err) => {
                warn!("{}commit of task {} failed before close: {err:#}", self.log_prefix, task.id());
                if let Err(close_err) = task.close(false) {
                    warn!("{}unclean close of task {} failed: {close_err:#}", self.log_prefix, task.id());
                }
                Err(err)
            }
        }
    }

    // ========================================================================
    // Processing
    // ========================================================================

    /// Buffer a polled record in its task. Returns `false` if no active task
    /// owns the partition.
    pub fn route(&self, record: ConsumedRecord) -> Result<bool> {
        match self.active_task_for(&record.topic_partition())? {
            Some(task) => {
                task.add_record(record)?;
                Ok(true)
            }
            None => {
                debug!(
                    "{}dropping record of unowned partition {}",
                    self.log_prefix,
                    record.topic_partition()
                );
                Ok(false)
            }
        }
    }

    pub fn active_tasks(&self) -> Result<Vec<Arc<StreamTask>>> {
        Ok(self.read_tasks()?.values().cloned().collect())
    }

    pub fn active_task_ids(&self) -> Result<Vec<TaskId>> {
        Ok(self.read_tasks()?.keys().copied().collect())
    }

    pub fn active_task_for(&self, partition: &TopicPartition) -> Result<Option<Arc<StreamTask>>> {
        let task_id = self
            .by_partition
            .read()
            .map_err(|_| anyhow!("{}partition index lock poisoned", self.log_prefix))?
            .get(partition)
            .copied();
        match task_id {
            Some(id) => Ok(self.read_tasks()?.get(&id).cloned()),
            None => Ok(None),
        }
    }

    pub fn commit_task(&self, task: &StreamTask) -> Result<bool> {
        task.commit(self.consumer()?.as_ref())
    }

    /// Commit every task that processed something since its last commit.
    /// Returns the number of committed tasks, or -1 while a rebalance is in
    /// progress.
    pub fn commit_all(&self) -> Result<i32> {
        if self.rebalance_in_progress() {
            return Ok(-1);
        }
        let mut committed = 0;
        for task in self.active_tasks()? {
            if self.commit_task(&task)? {
                committed += 1;
            }
        }
        Ok(committed)
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Commit and close every task, then the shared producer. A task whose
    /// commit fails is closed uncleanly.
    pub fn close(&self) -> Result<()> {
        let tasks: Vec<Arc<StreamTask>> = std::mem::take(&mut *self.write_tasks()?)
            .into_values()
            .collect();
        self.by_partition
            .write()
            .map_err(|_| anyhow!("{}partition index lock poisoned", self.log_prefix))?
            .clear();
        let tasks_closed = attempt_all(tasks, |task| self.commit_and_close(&task));
        tasks_closed.and(self.creator.close())
    }
}
