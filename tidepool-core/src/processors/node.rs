use super::*;

/// Lifecycle every graph node has, regardless of its key/value types.
pub trait ProcessorNode: Send + Sync {
    fn name(&self) -> &str;
    /// Bind the node to its task context. Called once, in registration order.
    fn init(&self, context: &Arc<ProcessorContext>) -> Result<()>;
    fn close(&self) -> Result<()> {
        Ok(())
    }
    /// Stores this node reads or writes.
    fn store_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A node that accepts typed key/value pairs.
pub trait Processor<K, V>: ProcessorNode {
    fn process(&self, key: K, value: V) -> Result<()>;
}

/// A node with downstream children of type `(K, V)`.
pub trait Forwarding<K, V> {
    fn children(&self) -> &Children<K, V>;
}

/// Ordered list of a node's children.
///
/// Names are unique: adding a second child with an existing name is ignored.
/// When more than one child receives a record they run on the rayon pool, so
/// siblings see no ordering guarantee between each other.
pub struct Children<K, V> {
    nodes: RwLock<Vec<Arc<dyn Processor<K, V>>>>,
}

impl<K, V> Default for Children<K, V> {
    fn default() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }
}

impl<K, V> Children<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Returns `false` if a child with the same name is already attached.
    pub fn add(&self, child: Arc<dyn Processor<K, V>>) -> Result<bool> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| anyhow!("children lock poisoned"))?;
        if nodes.iter().any(|n| n.name() == child.name()) {
            return Ok(false);
        }
        nodes.push(child);
        Ok(true)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.snapshot()?.iter().map(|n| n.name().to_string()).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn snapshot(&self) -> Result<Vec<Arc<dyn Processor<K, V>>>> {
        Ok(self
            .nodes
            .read()
            .map_err(|_| anyhow!("children lock poisoned"))?
            .clone())
    }

    /// Send to every child.
    pub fn forward(&self, key: K, value: V) -> Result<()> {
        dispatch(&self.snapshot()?, key, value)
    }

    /// Send only to the child called `name`.
    pub fn forward_to(&self, name: &str, key: K, value: V) -> Result<()> {
        let targets: Vec<_> = self
            .snapshot()?
            .into_iter()
            .filter(|n| n.name() == name)
            .collect();
        dispatch(&targets, key, value)
    }

    /// Set the record timestamp on `context`, then send to every child.
    pub fn forward_with_timestamp(
        &self,
        context: &ProcessorContext,
        key: K,
        value: V,
        timestamp: Timestamp,
    ) -> Result<()> {
        context.change_timestamp(timestamp);
        self.forward(key, value)
    }
}

fn dispatch<K, V>(targets: &[Arc<dyn Processor<K, V>>], key: K, value: V) -> Result<()>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    match targets {
        [] => Ok(()),
        [only] => only.process(key, value),
        many => many
            .par_iter()
            .try_for_each(|child| child.process(key.clone(), value.clone())),
    }
}
