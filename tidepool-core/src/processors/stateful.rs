use super::*;

/// User logic of a stateful node. Stores are reached through the context.
pub trait Transformer<K, V, K1, V1>: Send + Sync {
    fn init(&self, _context: &Arc<ProcessorContext>) -> Result<()> {
        Ok(())
    }
    fn transform(&self, context: &ProcessorContext, key: K, value: V) -> Result<Vec<(K1, V1)>>;
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct FnTransformer<F>(F);

impl<F, K, V, K1, V1> Transformer<K, V, K1, V1> for FnTransformer<F>
where
    F: Fn(&ProcessorContext, K, V) -> Result<Vec<(K1, V1)>> + Send + Sync,
{
    fn transform(&self, context: &ProcessorContext, key: K, value: V) -> Result<Vec<(K1, V1)>> {
        (self.0)(context, key, value)
    }
}

/// Node that runs a [`Transformer`] with access to named stores.
///
/// Every declared store must be reachable from the task context at `init`.
pub struct StatefulProcessor<K, V, K1, V1> {
    name: String,
    store_names: Vec<String>,
    transformer: Box<dyn Transformer<K, V, K1, V1>>,
    context: OnceLock<Arc<ProcessorContext>>,
    children: Children<K1, V1>,
}

impl<K, V, K1, V1> StatefulProcessor<K, V, K1, V1> {
    pub fn new<T>(name: impl Into<String>, store_names: &[&str], transformer: T) -> Self
    where
        T: Transformer<K, V, K1, V1> + 'static,
    {
        Self {
            name: name.into(),
            store_names: store_names.iter().map(|s| s.to_string()).collect(),
            transformer: Box::new(transformer),
            context: OnceLock::new(),
            children: Children::default(),
        }
    }

    pub fn from_fn<F>(name: impl Into<String>, store_names: &[&str], f: F) -> Self
    where
        F: Fn(&ProcessorContext, K, V) -> Result<Vec<(K1, V1)>> + Send + Sync + 'static,
        K: 'static,
        V: 'static,
        K1: 'static,
        V1: 'static,
    {
        Self::new(name, store_names, FnTransformer(f))
    }
}

impl<K, V, K1, V1> ProcessorNode for StatefulProcessor<K, V, K1, V1>
where
    K1: Clone + Send + Sync,
    V1: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, context: &Arc<ProcessorContext>) -> Result<()> {
        for store in &self.store_names {
            if context.get_state_store(store).is_none() {
                return Err(StreamsError::Configuration(format!(
                    "{}store {store} is not available to processor {}",
                    context.log_prefix(),
                    self.name
                ))
                .into());
            }
        }
        let _ = self.context.set(context.clone());
        self.transformer.init(context)
    }

    fn close(&self) -> Result<()> {
        self.transformer.close()
    }

    fn store_names(&self) -> Vec<String> {
        self.store_names.clone()
    }
}

impl<K, V, K1, V1> Processor<K, V> for StatefulProcessor<K, V, K1, V1>
where
    K1: Clone + Send + Sync,
    V1: Clone + Send + Sync,
{
    fn process(&self, key: K, value: V) -> Result<()> {
        let context = self.context.get().ok_or_else(|| {
            StreamsError::Configuration(format!("processor {} used before init", self.name))
        })?;
        for (k, v) in self.transformer.transform(context, key, value)? {
            self.children.forward(k, v)?;
        }
        Ok(())
    }
}

impl<K, V, K1, V1> Forwarding<K1, V1> for StatefulProcessor<K, V, K1, V1> {
    fn children(&self) -> &Children<K1, V1> {
        &self.children
    }
}
