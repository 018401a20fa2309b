use super::*;

/// Builds mock clients and remembers every client it handed out, so tests can
/// check which clients a runtime created and how it drove them.
pub struct MockClientSupplier {
    cluster: Arc<MockCluster>,
    producers: Mutex<Vec<Arc<MockProducer>>>,
    consumers: Mutex<Vec<Arc<MockConsumer>>>,
}

impl MockClientSupplier {
    pub fn new(cluster: Arc<MockCluster>) -> Self {
        Self {
            cluster,
            producers: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
        }
    }

    pub fn cluster(&self) -> &Arc<MockCluster> {
        &self.cluster
    }

    pub fn producers(&self) -> Result<Vec<Arc<MockProducer>>> {
        Ok(self
            .producers
            .lock()
            .map_err(|_| anyhow!("producer registry lock poisoned"))?
            .clone())
    }

    pub fn consumers(&self) -> Result<Vec<Arc<MockConsumer>>> {
        Ok(self
            .consumers
            .lock()
            .map_err(|_| anyhow!("consumer registry lock poisoned"))?
            .clone())
    }

    pub fn consumer_client_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .consumers()?
            .iter()
            .map(|c| c.client_id().to_string())
            .collect())
    }

    /// The consumer handed out under `client_id`, if any.
    pub fn consumer_by_client_id(&self, client_id: &str) -> Result<Option<Arc<MockConsumer>>> {
        Ok(self
            .consumers()?
            .into_iter()
            .find(|c| c.client_id() == client_id))
    }

    fn remember_consumer(&self, consumer: MockConsumer) -> Result<Arc<dyn Consumer>> {
        let consumer = Arc::new(consumer);
        self.consumers
            .lock()
            .map_err(|_| anyhow!("consumer registry lock poisoned"))?
            .push(consumer.clone());
        Ok(consumer)
    }
}

impl ClientSupplier for MockClientSupplier {
    fn consumer(
        &self,
        config: ConsumerConfig,
        listener: Arc<dyn RebalanceListener>,
    ) -> Result<Arc<dyn Consumer>> {
        self.remember_consumer(MockConsumer::new(
            self.cluster.clone(),
            config,
            Some(listener),
        ))
    }

    fn restore_consumer(&self, config: ConsumerConfig) -> Result<Arc<dyn Consumer>> {
        self.remember_consumer(MockConsumer::new(self.cluster.clone(), config, None))
    }

    fn global_consumer(&self, config: ConsumerConfig) -> Result<Arc<dyn Consumer>> {
        self.remember_consumer(MockConsumer::new(self.cluster.clone(), config, None))
    }

    fn producer(&self, config: ProducerConfig) -> Result<Arc<dyn Producer>> {
        let producer = Arc::new(MockProducer::new(self.cluster.clone(), config));
        self.producers
            .lock()
            .map_err(|_| anyhow!("producer registry lock poisoned"))?
            .push(producer.clone());
        Ok(producer)
    }

    fn admin(&self, _config: AdminConfig) -> Result<Arc<dyn AdminClient>> {
        Ok(Arc::new(MockAdmin::new(self.cluster.clone())))
    }
}
