use super::*;

/// Entry point for raw records of one topic.
pub trait SourceNode: ProcessorNode {
    fn topic(&self) -> &str;
    /// Decode and push a raw record downstream.
    fn process_record(&self, record: &ConsumedRecord) -> Result<()>;
}

struct SourceBinding<K, V> {
    context: Arc<ProcessorContext>,
    key: Option<Arc<dyn SerDes<K>>>,
    value: Option<Arc<dyn SerDes<V>>>,
    handler: DeserializationHandler,
    log_prefix: String,
}

/// Decodes records of one topic with its key and value codecs.
///
/// Codecs left unset are looked up among the configured defaults at `init`.
/// If neither exists, processing a record fails with a configuration error.
pub struct SourceProcessor<K, V> {
    name: String,
    topic: String,
    key_serdes: Option<Arc<dyn SerDes<K>>>,
    value_serdes: Option<Arc<dyn SerDes<V>>>,
    binding: OnceLock<SourceBinding<K, V>>,
    children: Children<K, V>,
}

impl<K, V> SourceProcessor<K, V> {
    pub fn new(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            key_serdes: None,
            value_serdes: None,
            binding: OnceLock::new(),
            children: Children::default(),
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

    fn binding(&self) -> Result<&SourceBinding<K, V>> {
        self.binding.get().ok_or_else(|| {
            StreamsError::Configuration(format!("source {} processed before init", self.name)).into()
        })
    }
}

impl<K, V> ProcessorNode for SourceProcessor<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, context: &Arc<ProcessorContext>) -> Result<()> {
        let config = context.config();
        let binding = SourceBinding {
            context: context.clone(),
            key: self
                .key_serdes
                .clone()
                .or_else(|| config.default_key_serdes::<K>()),
            value: self
                .value_serdes
                .clone()
                .or_else(|| config.default_value_serdes::<V>()),
            handler: config.deserialization_handler(),
            log_prefix: context.processor_log_prefix(&self.name),
        };
        let _ = self.binding.set(binding);
        Ok(())
    }
}

impl<K, V> Processor<K, V> for SourceProcessor<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn process(&self, key: K, value: V) -> Result<()> {
        self.children.forward(key, value)
    }
}

impl<K, V> SourceNode for SourceProcessor<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn topic(&self) -> &str {
        &self.topic
    }

    fn process_record(&self, record: &ConsumedRecord) -> Result<()> {
        let binding = self.binding()?;
        let key_serdes = binding.key.as_ref().ok_or_else(|| {
            StreamsError::Configuration(format!(
                "{}the key codec is missing or not compatible with the key type; set one on the source or a matching default key codec",
                binding.log_prefix
            ))
        })?;
        let value_serdes = binding.value.as_ref().ok_or_else(|| {
            StreamsError::Configuration(format!(
                "{}the value codec is missing or not compatible with the value type; set one on the source or a matching default value codec",
                binding.log_prefix
            ))
        })?;

        let key = match deserialize_component(
            key_serdes.as_ref(),
            MessageComponent::Key,
            &record.key,
            record,
            &binding.context,
            &binding.handler,
            &binding.log_prefix,
        ) {
            ObjectDeserialized::Value(key) => key,
            ObjectDeserialized::Skip => return Ok(()),
            ObjectDeserialized::Fatal(err) => return Err(err),
        };
        let value = match deserialize_component(
            value_serdes.as_ref(),
            MessageComponent::Value,
            &record.value,
            record,
            &binding.context,
            &binding.handler,
            &binding.log_prefix,
        ) {
            ObjectDeserialized::Value(value) => value,
            ObjectDeserialized::Skip => return Ok(()),
            ObjectDeserialized::Fatal(err) => return Err(err),
        };

        self.process(key, value)
    }
}

impl<K, V> Forwarding<K, V> for SourceProcessor<K, V> {
    fn children(&self) -> &Children<K, V> {
        &self.children
    }
}
