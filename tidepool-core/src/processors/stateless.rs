use super::*;

type TransformFn<K, V, K1, V1> = Box<dyn Fn(K, V) -> Vec<(K1, V1)> + Send + Sync>;

/// Record-at-a-time transform with no state: map, filter, flat-map, peek.
pub struct StatelessProcessor<K, V, K1, V1> {
    name: String,
    transform: TransformFn<K, V, K1, V1>,
    children: Children<K1, V1>,
}

impl<K, V, K1, V1> StatelessProcessor<K, V, K1, V1> {
    pub fn flat_map<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(K, V) -> Vec<(K1, V1)> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Box::new(f),
            children: Children::default(),
        }
    }

    pub fn map<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(K, V) -> (K1, V1) + Send + Sync + 'static,
    {
        Self::flat_map(name, move |k, v| vec![f(k, v)])
    }
}

impl<K, V> StatelessProcessor<K, V, K, V> {
    pub fn filter<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        Self::flat_map(name, move |k, v| {
            if predicate(&k, &v) {
                vec![(k, v)]
            } else {
                Vec::new()
            }
        })
    }

    pub fn peek<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::flat_map(name, move |k, v| {
            action(&k, &v);
            vec![(k, v)]
        })
    }
}

impl<K, V, K1, V1> ProcessorNode for StatelessProcessor<K, V, K1, V1>
where
    K1: Clone + Send + Sync,
    V1: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, _context: &Arc<ProcessorContext>) -> Result<()> {
        Ok(())
    }
}

impl<K, V, K1, V1> Processor<K, V> for StatelessProcessor<K, V, K1, V1>
where
    K1: Clone + Send + Sync,
    V1: Clone + Send + Sync,
{
    fn process(&self, key: K, value: V) -> Result<()> {
        for (k, v) in (self.transform)(key, value) {
            self.children.forward(k, v)?;
        }
        Ok(())
    }
}

impl<K, V, K1, V1> Forwarding<K1, V1> for StatelessProcessor<K, V, K1, V1> {
    fn children(&self) -> &Children<K1, V1> {
        &self.children
    }
}
