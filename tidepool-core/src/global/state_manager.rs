use super::*;

struct RegisteredStore {
    store: Arc<dyn StateStore>,
    restore: Option<StateRestoreCallback>,
}

#[derive(Default)]
struct GlobalInner {
    /// Partitions of each global store's bootstrap topic, keyed by store.
    partitions: BTreeMap<String, Vec<TopicPartition>>,
    /// Bootstrap topic to store name.
    topics: BTreeMap<String, String>,
    stores: BTreeMap<String, RegisteredStore>,
    /// Next offset to apply per bootstrap partition.
    changelog_offsets: BTreeMap<TopicPartition, Offset>,
}

/// Owns the global stores of a runtime and the position of each store in its
/// bootstrap log.
pub struct GlobalStateManager {
    topology: Arc<ProcessorTopology>,
    admin: Arc<dyn AdminClient>,
    config: Arc<StreamConfig>,
    context: ProcessorContext,
    inner: Mutex<GlobalInner>,
}

impl GlobalStateManager {
    pub fn new(
        topology: Arc<ProcessorTopology>,
        admin: Arc<dyn AdminClient>,
        config: Arc<StreamConfig>,
    ) -> Self {
        Self {
            context: ProcessorContext::for_global(config.clone()),
            topology,
            admin,
            config,
            inner: Mutex::new(GlobalInner::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, GlobalInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("global state lock poisoned"))
    }

    /// Build, open and register every declared global store. Returns the
    /// names of the initialized stores.
    pub fn initialize(&self) -> Result<BTreeSet<String>> {
        let definitions = self.topology.global_stores();
        let timeout = self.config.settings.metadata_request_timeout();

        let mut names = BTreeSet::new();
        for definition in definitions {
            let name = definition.builder.name();
            if !names.insert(name.to_string()) {
                return Err(StreamsError::Configuration(format!(
                    "global store {name} is declared more than once"
                ))
                .into());
            }
        }

        let mut resolved = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let name = definition.builder.name().to_string();
            let partitions: Vec<TopicPartition> = self
                .admin
                .partitions_for(&definition.topic, timeout)?
                .unwrap_or_default()
                .into_iter()
                .map(|p| TopicPartition::new(p.topic, p.partition))
                .collect();
            if partitions.is_empty() {
                return Err(StreamsError::Configuration(format!(
                    "there are no partitions available for topic {} when initializing global store {name}",
                    definition.topic
                ))
                .into());
            }
            resolved.push((name, definition.topic.clone(), partitions));
        }

        {
            let mut inner = self.lock()?;
            for (name, topic, partitions) in resolved {
                inner.topics.insert(topic, name.clone());
                inner.partitions.insert(name, partitions);
            }
        }

        for definition in definitions {
            let store = definition.builder.build();
            store.init(&self.context)?;
            let restore = store.restore_callback();
            self.register(store, restore)?;
        }

        info!("global state initialized with stores {names:?}");
        Ok(names)
    }

    /// Make `store` visible under its name and start its bootstrap
    /// partitions at offset 0.
    pub fn register(&self, store: Arc<dyn StateStore>, restore: Option<StateRestoreCallback>) -> Result<()> {
        let name = store.name().to_string();
        let mut inner = self.lock()?;
        if inner.stores.contains_key(&name) {
            return Err(StreamsError::Configuration(format!(
                "global store {name} has already been registered"
            ))
            .into());
        }
        let partitions = inner.partitions.get(&name).cloned().ok_or_else(|| {
            StreamsError::Configuration(format!("store {name} is not a declared global store"))
        })?;
        for tp in partitions {
            inner.changelog_offsets.insert(tp, 0);
        }
        inner.stores.insert(name.clone(), RegisteredStore { store, restore });
        debug!("registered global store {name}");
        Ok(())
    }

    pub fn changelog_offsets(&self) -> Result<BTreeMap<TopicPartition, Offset>> {
        Ok(self.lock()?.changelog_offsets.clone())
    }

    pub fn get_store(&self, name: &str) -> Result<Option<Arc<dyn StateStore>>> {
        Ok(self.lock()?.stores.get(name).map(|r| r.store.clone()))
    }

    /// Registered stores by name, as handed to tasks and the query provider.
    pub fn global_stores(&self) -> Result<GlobalStores> {
        Ok(Arc::new(
            self.lock()?
                .stores
                .iter()
                .map(|(name, r)| (name.clone(), r.store.clone()))
                .collect(),
        ))
    }

    /// Every bootstrap partition with the offset to resume from.
    pub fn positions(&self) -> Result<Vec<TopicPartitionOffset>> {
        Ok(self
            .lock()?
            .changelog_offsets
            .iter()
            .map(|(tp, offset)| TopicPartitionOffset::new(tp.clone(), *offset))
            .collect())
    }

    fn registered(&self) -> Result<Vec<(String, Arc<dyn StateStore>, Option<StateRestoreCallback>)>> {
        Ok(self
            .lock()?
            .stores
            .iter()
            .map(|(name, r)| (name.clone(), r.store.clone(), r.restore.clone()))
            .collect())
    }

    pub fn flush(&self) -> Result<()> {
        debug!("flushing global stores");
        attempt_all(self.registered()?, |(_, store, _)| store.flush())
    }

    /// Close every store, even when some fail; the first failure is returned.
    pub fn close(&self) -> Result<()> {
        info!("closing global state manager");
        attempt_all(self.registered()?, |(name, store, _)| {
            store.close().inspect_err(|err| {
                error!("failed to close global store {name}: {err:#}");
            })
        })
    }

    // ========================================================================
    // Restoration
    // ========================================================================

    /// Replay every bootstrap partition from its changelog offset up to the
    /// high watermark. The consumer is left without an assignment.
    pub fn restore(&self, consumer: &dyn Consumer) -> Result<()> {
        let timeout = self.config.settings.metadata_request_timeout();
        let poll_timeout = self.config.settings.poll_timeout();

        for (name, _, restore) in self.registered()? {
            let restore = restore.ok_or_else(|| {
                StreamsError::Configuration(format!("global store {name} cannot be restored from a log"))
            })?;
            let partitions = self.lock()?.partitions.get(&name).cloned().unwrap_or_default();

            let mut restored: u64 = 0;
            for tp in partitions {
                let (low, high) = consumer.watermark_offsets(&tp)?;
                let mut offset = self
                    .lock()?
                    .changelog_offsets
                    .get(&tp)
                    .copied()
                    .unwrap_or(0)
                    .max(low);
                if offset >= high {
                    continue;
                }

                consumer.assign(std::slice::from_ref(&tp))?;
                consumer.seek(&TopicPartitionOffset::new(tp.clone(), offset))?;
                let deadline = Instant::now() + timeout;
                while offset < high {
                    match consumer.poll(poll_timeout)? {
                        Some(record) => {
                            restore(&record.key, &record.value, record.timestamp)?;
                            offset = record.offset + 1;
                            restored += 1;
                        }
                        None if Instant::now() >= deadline => {
                            return Err(StreamsError::Transport(format!(
                                "global store {name} stopped at offset {offset} of {tp}, expected {high} within {timeout:?}"
                            ))
                            .into());
                        }
                        None => {}
                    }
                }
                self.lock()?.changelog_offsets.insert(tp, offset);
            }
            info!("restored global store {name} from {restored} records");
        }

        consumer.assign(&[])?;
        self.flush()
    }

    /// Apply one record of a bootstrap topic. Returns `false` when no global
    /// store reads the record's topic.
    pub fn apply(&self, record: &ConsumedRecord) -> Result<bool> {
        let restore = {
            let inner = self.lock()?;
            let Some(name) = inner.topics.get(&record.topic) else {
                warn!(
                    "no global store for {}, skipping offset {}",
                    record.topic_partition(),
                    record.offset
                );
                return Ok(false);
            };
            inner.stores.get(name).and_then(|r| r.restore.clone())
        };
        let Some(restore) = restore else {
            return Ok(false);
        };

        restore(&record.key, &record.value, record.timestamp)?;
        self.lock()?
            .changelog_offsets
            .insert(record.topic_partition(), record.offset + 1);
        Ok(true)
    }
}

impl std::fmt::Debug for GlobalStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalStateManager")
            .field("stores", &self.topology.global_store_topics())
            .finish()
    }
}
