use super::*;

struct SinkBinding<K, V> {
    context: Arc<ProcessorContext>,
    key: Option<Arc<dyn SerDes<K>>>,
    value: Option<Arc<dyn SerDes<V>>>,
}

/// Terminal node: encodes pairs and sends them to `topic` through the task's
/// record collector, stamped with the current record timestamp.
pub struct SinkProcessor<K, V> {
    name: String,
    topic: String,
    key_serdes: Option<Arc<dyn SerDes<K>>>,
    value_serdes: Option<Arc<dyn SerDes<V>>>,
    binding: OnceLock<SinkBinding<K, V>>,
}

impl<K, V> SinkProcessor<K, V> {
    pub fn new(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            key_serdes: None,
            value_serdes: None,
            binding: OnceLock::new(),
        }
    }

    pub fn with_key_serdes(mut self, serdes: Arc<dyn SerDes<K>>) -> Self {
        self.key_serdes = Some(serdes);
        self
    }

    pub fn with_value_serdes(mut self, serdes: Arc<dyn SerDes<V>>) -> Self {
        self.value_serdes = Some(serdes);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<K: 'static, V: 'static> ProcessorNode for SinkProcessor<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, context: &Arc<ProcessorContext>) -> Result<()> {
        let config = context.config();
        let _ = self.binding.set(SinkBinding {
            context: context.clone(),
            key: self
                .key_serdes
                .clone()
                .or_else(|| config.default_key_serdes::<K>()),
            value: self
                .value_serdes
                .clone()
                .or_else(|| config.default_value_serdes::<V>()),
        });
        Ok(())
    }
}

impl<K: 'static, V: 'static> Processor<K, V> for SinkProcessor<K, V> {
    fn process(&self, key: K, value: V) -> Result<()> {
        let binding = self.binding.get().ok_or_else(|| {
            StreamsError::Configuration(format!("sink {} used before init", self.name))
        })?;
        let key_serdes = binding.key.as_ref().ok_or_else(|| {
            StreamsError::Configuration(format!("sink {} has no usable key codec", self.name))
        })?;
        let value_serdes = binding.value.as_ref().ok_or_else(|| {
            StreamsError::Configuration(format!("sink {} has no usable value codec", self.name))
        })?;

        let record = ProducerRecord {
            topic: self.topic.clone(),
            partition: None,
            key: key_serdes.serialize(&key)?,
            value: value_serdes.serialize(&value)?,
            timestamp: binding.context.timestamp(),
        };
        binding.context.collector()?.send(record)
    }
}
