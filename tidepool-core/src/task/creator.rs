use super::*;

/// Builds tasks for one stream thread and hands each its producer.
///
/// Under at-least-once every task of the thread shares one producer, created
/// lazily on the first task. Under exactly-once each task gets its own
/// transactional producer.
pub struct TaskCreator {
    topology: Arc<ProcessorTopology>,
    config: Arc<StreamConfig>,
    supplier: Arc<dyn ClientSupplier>,
    thread_id: String,
    global_stores: GlobalStores,
    shared_producer: Mutex<Option<Arc<dyn Producer>>>,
}

impl TaskCreator {
    pub fn new(
        topology: Arc<ProcessorTopology>,
        config: Arc<StreamConfig>,
        supplier: Arc<dyn ClientSupplier>,
        thread_id: impl Into<String>,
        global_stores: GlobalStores,
    ) -> Self {
        Self {
            topology,
            config,
            supplier,
            thread_id: thread_id.into(),
            global_stores,
            shared_producer: Mutex::new(None),
        }
    }

    pub fn topology(&self) -> &Arc<ProcessorTopology> {
        &self.topology
    }

    pub fn create(&self, task_id: TaskId, partitions: Vec<TopicPartition>) -> Result<StreamTask> {
        let producer = match self.config.settings.guarantee {
            ProcessingGuarantee::AtLeastOnce => self.shared_producer()?,
            ProcessingGuarantee::ExactlyOnce => self.supplier.producer(ProducerConfig {
                client_id: task_producer_client_id(&self.thread_id, &task_id),
                transactional_id: Some(transactional_id(
                    &self.config.settings.application_id,
                    &task_id,
                )),
            })?,
        };
        StreamTask::new(
            task_id,
            partitions,
            &self.topology,
            self.config.clone(),
            producer,
            self.global_stores.clone(),
        )
    }

    fn shared_producer(&self) -> Result<Arc<dyn Producer>> {
        let mut shared = self
            .shared_producer
            .lock()
            .map_err(|_| anyhow!("shared producer lock poisoned"))?;
        if let Some(producer) = shared.as_ref() {
            return Ok(producer.clone());
        }
        let producer = self.supplier.producer(ProducerConfig {
            client_id: thread_producer_client_id(&self.thread_id),
            transactional_id: None,
        })?;
        *shared = Some(producer.clone());
        Ok(producer)
    }

    /// Close the thread's shared producer, if one was created.
    pub fn close(&self) -> Result<()> {
        let producer = self
            .shared_producer
            .lock()
            .map_err(|_| anyhow!("shared producer lock poisoned"))?
            .take();
        match producer {
            Some(producer) => producer.close(),
            None => Ok(()),
        }
    }
}
