//! Topology description and per-task instantiation.
//!
//! A [`TopologyBuilder`] holds a graph factory plus store builders. `build()`
//! runs the factory once to validate the graph and split it into
//! sub-topologies (connected components, numbered by first source). Every task
//! then calls [`ProcessorTopology::instantiate`] and gets fresh node and store
//! instances of its own group.

use super::*;
use std::collections::BTreeSet;

/// Builds the processor graph. Called once per task, so it must be
/// deterministic.
pub type GraphFactory = Arc<dyn Fn(&mut GraphBuilder) -> Result<()> + Send + Sync>;

/// A global store and the log it is bootstrapped from.
#[derive(Clone)]
pub struct GlobalStoreDefinition {
    pub builder: Arc<dyn StoreBuilder>,
    pub topic: String,
}

#[derive(Default)]
pub struct TopologyBuilder {
    factory: Option<GraphFactory>,
    stores: Vec<Arc<dyn StoreBuilder>>,
    global_stores: Vec<GlobalStoreDefinition>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph<F>(mut self, factory: F) -> Self
    where
        F: Fn(&mut GraphBuilder) -> Result<()> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn add_state_store(mut self, builder: Arc<dyn StoreBuilder>) -> Self {
        self.stores.push(builder);
        self
    }

    /// Duplicate global names are reported when global state is initialized.
    pub fn add_global_store(mut self, builder: Arc<dyn StoreBuilder>, topic: impl Into<String>) -> Self {
        self.global_stores.push(GlobalStoreDefinition {
            builder,
            topic: topic.into(),
        });
        self
    }

    pub fn build(self) -> Result<ProcessorTopology> {
        let factory: GraphFactory = self.factory
            .unwrap_or_else(|| Arc::new(|_: &mut GraphBuilder| Ok(())));

        let mut stores: BTreeMap<String, Arc<dyn StoreBuilder>> = BTreeMap::new();
        for builder in self.stores {
            let name = builder.name().to_string();
            if stores.insert(name.clone(), builder).is_some() {
                return Err(
                    StreamsError::Configuration(format!("store {name} is declared twice")).into(),
                );
            }
        }

        let global_names: BTreeSet<String> = self
            .global_stores
            .iter()
            .map(|g| g.builder.name().to_string())
            .collect();
        let global_topics: BTreeSet<&str> =
            self.global_stores.iter().map(|g| g.topic.as_str()).collect();
        if let Some(name) = global_names.iter().find(|n| stores.contains_key(*n)) {
            return Err(StreamsError::Configuration(format!(
                "store {name} is declared both as a local and a global store"
            ))
            .into());
        }

        let mut graph = GraphBuilder::default();
        factory(&mut graph)?;

        for source in &graph.sources {
            if global_topics.contains(source.topic()) {
                return Err(StreamsError::Configuration(format!(
                    "topic {} is already used by a global store",
                    source.topic()
                ))
                .into());
            }
        }

        let mut node_stores: Vec<Vec<String>> = Vec::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let names = node.store_names();
            for store in &names {
                if !stores.contains_key(store) && !global_names.contains(store) {
                    return Err(StreamsError::Configuration(format!(
                        "processor {} uses unknown store {store}",
                        node.name()
                    ))
                    .into());
                }
            }
            node_stores.push(names);
        }

        // Nodes joined by an edge or by a shared local store end up in the
        // same sub-topology.
        let mut groups = UnionFind::new(graph.nodes.len());
        for &(parent, child) in &graph.edges {
            groups.union(parent, child);
        }
        let mut first_user: HashMap<&str, usize> = HashMap::new();
        for (idx, names) in node_stores.iter().enumerate() {
            for store in names.iter().filter(|s| stores.contains_key(*s)) {
                match first_user.get(store.as_str()) {
                    Some(&other) => groups.union(other, idx),
                    None => {
                        first_user.insert(store.as_str(), idx);
                    }
                }
            }
        }

        let mut group_of_root: HashMap<usize, u32> = HashMap::new();
        let mut topic_groups = BTreeMap::new();
        for source in &graph.sources {
            let idx = graph.index_of(source.name())?;
            let root = groups.find(idx);
            let next = group_of_root.len() as u32;
            let group = *group_of_root.entry(root).or_insert(next);
            topic_groups.insert(source.topic().to_string(), group);
        }

        let mut group_nodes: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
        let mut group_stores: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
        for (idx, node) in graph.nodes.iter().enumerate() {
            let Some(&group) = group_of_root.get(&groups.find(idx)) else {
                continue;
            };
            group_nodes
                .entry(group)
                .or_default()
                .insert(node.name().to_string());
            for store in node_stores[idx].iter().filter(|s| stores.contains_key(*s)) {
                group_stores.entry(group).or_default().insert(store.clone());
            }
        }

        debug!(
            "topology built: {} nodes, {} sub-topologies, {} local stores, {} global stores",
            graph.nodes.len(),
            group_of_root.len(),
            stores.len(),
            self.global_stores.len()
        );

        Ok(ProcessorTopology {
            factory,
            node_count: graph.nodes.len(),
            stores,
            global_stores: self.global_stores,
            topic_groups,
            group_nodes,
            group_stores,
        })
    }
}

/// Immutable, validated topology shared by all tasks.
pub struct ProcessorTopology {
    factory: GraphFactory,
    node_count: usize,
    stores: BTreeMap<String, Arc<dyn StoreBuilder>>,
    global_stores: Vec<GlobalStoreDefinition>,
    topic_groups: BTreeMap<String, u32>,
    group_nodes: BTreeMap<u32, BTreeSet<String>>,
    group_stores: BTreeMap<u32, BTreeSet<String>>,
}

impl ProcessorTopology {
    pub fn source_topics(&self) -> Vec<String> {
        self.topic_groups.keys().cloned().collect()
    }

    pub fn group_for_topic(&self, topic: &str) -> Option<u32> {
        self.topic_groups.get(topic).copied()
    }

    pub fn topics_for_group(&self, group: u32) -> Vec<String> {
        self.topic_groups
            .iter()
            .filter(|(_, g)| **g == group)
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn groups(&self) -> Vec<u32> {
        self.group_nodes.keys().copied().collect()
    }

    pub fn global_stores(&self) -> &[GlobalStoreDefinition] {
        &self.global_stores
    }

    /// Global store name to bootstrap topic.
    pub fn global_store_topics(&self) -> BTreeMap<String, String> {
        self.global_stores
            .iter()
            .map(|g| (g.builder.name().to_string(), g.topic.clone()))
            .collect()
    }

    /// Names of the task-local stores.
    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn stores_for_group(&self, group: u32) -> Vec<String> {
        self.group_stores
            .get(&group)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Fresh nodes and stores for the sub-topology of `task_id`.
    pub fn instantiate(&self, task_id: TaskId) -> Result<TaskTopology> {
        let nodes_of_group = self.group_nodes.get(&task_id.topic_group).ok_or_else(|| {
            StreamsError::Configuration(format!("no sub-topology {} for task {task_id}", task_id.topic_group))
        })?;

        let mut graph = GraphBuilder::default();
        (self.factory)(&mut graph)?;
        if graph.nodes.len() != self.node_count {
            return Err(StreamsError::Configuration(format!(
                "graph factory produced {} nodes for task {task_id}, expected {}",
                graph.nodes.len(),
                self.node_count
            ))
            .into());
        }

        let sources = graph
            .sources
            .into_iter()
            .filter(|s| nodes_of_group.contains(s.name()))
            .map(|s| (s.topic().to_string(), s))
            .collect();
        let nodes = graph
            .nodes
            .into_iter()
            .filter(|n| nodes_of_group.contains(n.name()))
            .collect();

        let mut stores = BTreeMap::new();
        if let Some(names) = self.group_stores.get(&task_id.topic_group) {
            for name in names {
                if let Some(builder) = self.stores.get(name) {
                    stores.insert(name.clone(), builder.build());
                }
            }
        }

        Ok(TaskTopology {
            sources,
            nodes,
            stores,
        })
    }
}

/// Collects nodes and edges while a graph factory runs.
#[derive(Default)]
pub struct GraphBuilder {
    sources: Vec<Arc<dyn SourceNode>>,
    nodes: Vec<Arc<dyn ProcessorNode>>,
    index: HashMap<String, usize>,
    edges: Vec<(usize, usize)>,
}

impl GraphBuilder {
    pub fn add_source<K, V>(&mut self, source: SourceProcessor<K, V>) -> Result<Arc<SourceProcessor<K, V>>>
    where
        K: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if self.sources.iter().any(|s| s.topic() == source.topic()) {
            return Err(StreamsError::Configuration(format!(
                "topic {} already has a source node",
                source.topic()
            ))
            .into());
        }
        let source = Arc::new(source);
        self.register(source.clone())?;
        self.sources.push(source.clone());
        Ok(source)
    }

    /// Attach a new node under `parent`.
    pub fn add_processor<K, V, Parent, P>(&mut self, parent: &Arc<Parent>, node: P) -> Result<Arc<P>>
    where
        K: Clone + Send + Sync,
        V: Clone + Send + Sync,
        Parent: Forwarding<K, V> + ProcessorNode + ?Sized,
        P: Processor<K, V> + 'static,
    {
        let parent_idx = self.index_of(parent.name())?;
        let node = Arc::new(node);
        let child_idx = self.register(node.clone())?;
        parent.children().add(node.clone())?;
        self.edges.push((parent_idx, child_idx));
        Ok(node)
    }

    /// Add an edge between two registered nodes. Connecting the same pair
    /// again is a no-op.
    pub fn connect<K, V, Parent, P>(&mut self, parent: &Arc<Parent>, child: &Arc<P>) -> Result<()>
    where
        K: Clone + Send + Sync,
        V: Clone + Send + Sync,
        Parent: Forwarding<K, V> + ProcessorNode + ?Sized,
        P: Processor<K, V> + 'static,
    {
        let parent_idx = self.index_of(parent.name())?;
        let child_idx = self.index_of(child.name())?;
        if parent.children().add(child.clone())? {
            self.edges.push((parent_idx, child_idx));
        }
        Ok(())
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name().to_string()).collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.index.get(name).copied().ok_or_else(|| {
            StreamsError::Configuration(format!("processor {name} is not part of this graph")).into()
        })
    }

    fn register(&mut self, node: Arc<dyn ProcessorNode>) -> Result<usize> {
        let name = node.name().to_string();
        if self.index.contains_key(&name) {
            return Err(
                StreamsError::Configuration(format!("processor {name} is already registered")).into(),
            );
        }
        let idx = self.nodes.len();
        self.nodes.push(node);
        self.index.insert(name, idx);
        Ok(idx)
    }
}

/// Node and store instances owned by one task.
pub struct TaskTopology {
    sources: BTreeMap<String, Arc<dyn SourceNode>>,
    nodes: Vec<Arc<dyn ProcessorNode>>,
    stores: BTreeMap<String, Arc<dyn StateStore>>,
}

impl TaskTopology {
    pub fn source_for(&self, topic: &str) -> Option<&Arc<dyn SourceNode>> {
        self.sources.get(topic)
    }

    pub fn source_topics(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn stores(&self) -> &BTreeMap<String, Arc<dyn StateStore>> {
        &self.stores
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name().to_string()).collect()
    }

    /// Init every node in registration order.
    pub fn init_nodes(&self, context: &Arc<ProcessorContext>) -> Result<()> {
        for node in &self.nodes {
            node.init(context)?;
        }
        Ok(())
    }

    pub fn close_nodes(&self) -> Result<()> {
        attempt_all(&self.nodes, |node| node.close())
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
