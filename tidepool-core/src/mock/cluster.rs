use super::*;

#[derive(Debug, Clone)]
struct StoredRecord {
    timestamp: Timestamp,
    key: Vec<u8>,
    value: Vec<u8>,
    headers: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Default)]
struct GroupState {
    generation: u64,
    /// member id -> subscribed topics
    members: BTreeMap<u64, Vec<String>>,
}

#[derive(Debug, Default)]
struct ClusterState {
    topics: BTreeMap<String, Vec<Vec<StoredRecord>>>,
    groups: HashMap<String, GroupState>,
    committed: HashMap<(String, TopicPartition), Offset>,
    next_member_id: u64,
}

/// Shared in-memory broker.
#[derive(Debug, Default)]
pub struct MockCluster {
    state: Mutex<ClusterState>,
}

impl MockCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ClusterState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("mock cluster lock poisoned"))
    }

    /// Create a topic. Creating an existing topic with the same partition count
    /// is a no-op.
    pub fn create_topic(&self, topic: &str, partitions: u32) -> Result<()> {
        if partitions == 0 {
            return Err(anyhow!("topic {topic} needs at least one partition"));
        }
        let mut state = self.lock()?;
        match state.topics.get(topic) {
            Some(existing) if existing.len() as u32 != partitions => Err(anyhow!(
                "topic {topic} already exists with {} partitions",
                existing.len()
            )),
            Some(_) => Ok(()),
            None => {
                state
                    .topics
                    .insert(topic.to_string(), vec![Vec::new(); partitions as usize]);
                Ok(())
            }
        }
    }

    pub fn partition_count(&self, topic: &str) -> Result<Option<u32>> {
        Ok(self.lock()?.topics.get(topic).map(|p| p.len() as u32))
    }

    /// Append a record. Without an explicit partition the key is hashed.
    pub fn produce(
        &self,
        topic: &str,
        partition: Option<u32>,
        key: Vec<u8>,
        value: Vec<u8>,
        timestamp: Timestamp,
    ) -> Result<TopicPartitionOffset> {
        let tp = self.resolve_partition(topic, partition, &key)?;
        self.append(&tp, key, value, timestamp)
    }

    pub(crate) fn resolve_partition(
        &self,
        topic: &str,
        partition: Option<u32>,
        key: &[u8],
    ) -> Result<TopicPartition> {
        let count = self
            .partition_count(topic)?
            .ok_or_else(|| StreamsError::Transport(format!("unknown topic {topic}")))?;
        let partition = match partition {
            Some(p) if p < count => p,
            Some(p) => {
                return Err(
                    StreamsError::Transport(format!("partition {p} out of range for {topic}")).into(),
                );
            }
            None => partition_for_key(key, count),
        };
        Ok(TopicPartition::new(topic, partition))
    }

    pub(crate) fn append(
        &self,
        tp: &TopicPartition,
        key: Vec<u8>,
        value: Vec<u8>,
        timestamp: Timestamp,
    ) -> Result<TopicPartitionOffset> {
        let mut state = self.lock()?;
        let log = state
            .topics
            .get_mut(&tp.topic)
            .and_then(|parts| parts.get_mut(tp.partition as usize))
            .ok_or_else(|| StreamsError::Transport(format!("unknown partition {tp}")))?;
        log.push(StoredRecord {
            timestamp,
            key,
            value,
            headers: Vec::new(),
        });
        Ok(TopicPartitionOffset::new(tp.clone(), log.len() as Offset - 1))
    }

    pub(crate) fn fetch(&self, tp: &TopicPartition, offset: Offset) -> Result<Option<ConsumedRecord>> {
        let state = self.lock()?;
        let stored = state
            .topics
            .get(&tp.topic)
            .and_then(|parts| parts.get(tp.partition as usize))
            .and_then(|log| usize::try_from(offset).ok().and_then(|i| log.get(i)));
        Ok(stored.map(|s| ConsumedRecord {
            topic: tp.topic.clone(),
            partition: tp.partition,
            offset,
            timestamp: s.timestamp,
            key: s.key.clone(),
            value: s.value.clone(),
            headers: s.headers.clone(),
        }))
    }

    pub fn end_offset(&self, tp: &TopicPartition) -> Result<Offset> {
        let state = self.lock()?;
        state
            .topics
            .get(&tp.topic)
            .and_then(|parts| parts.get(tp.partition as usize))
            .map(|log| log.len() as Offset)
            .ok_or_else(|| StreamsError::Transport(format!("unknown partition {tp}")).into())
    }

    /// Every record of a topic, partition by partition.
    pub fn records(&self, topic: &str) -> Result<Vec<ConsumedRecord>> {
        let count = self.partition_count(topic)?.unwrap_or(0);
        let mut out = Vec::new();
        for partition in 0..count {
            let tp = TopicPartition::new(topic, partition);
            let end = self.end_offset(&tp)?;
            for offset in 0..end {
                if let Some(record) = self.fetch(&tp, offset)? {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    // ========== Consumer groups ==========

    pub(crate) fn join_group(&self, group: &str, topics: &[String]) -> Result<u64> {
        let mut state = self.lock()?;
        state.next_member_id += 1;
        let member = state.next_member_id;
        let group_state = state.groups.entry(group.to_string()).or_default();
        group_state.members.insert(member, topics.to_vec());
        group_state.generation += 1;
        debug!(group, member, generation = group_state.generation, "member joined");
        Ok(member)
    }

    pub(crate) fn leave_group(&self, group: &str, member: u64) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(group_state) = state.groups.get_mut(group) {
            if group_state.members.remove(&member).is_some() {
                group_state.generation += 1;
                debug!(group, member, generation = group_state.generation, "member left");
            }
        }
        Ok(())
    }

    pub fn group_generation(&self, group: &str) -> Result<u64> {
        Ok(self
            .lock()?
            .groups
            .get(group)
            .map(|g| g.generation)
            .unwrap_or(0))
    }

    /// Current generation plus this member's share: partition `p` of a topic
    /// goes to the `p % n`-th member subscribed to it, so co-partitioned topics
    /// land on the same member.
    pub(crate) fn assignment(&self, group: &str, member: u64) -> Result<(u64, Vec<TopicPartition>)> {
        let state = self.lock()?;
        let Some(group_state) = state.groups.get(group) else {
            return Ok((0, Vec::new()));
        };
        let Some(topics) = group_state.members.get(&member) else {
            return Ok((group_state.generation, Vec::new()));
        };
        let mut assigned = Vec::new();
        for topic in topics {
            let Some(parts) = state.topics.get(topic) else {
                continue;
            };
            let subscribers: Vec<u64> = group_state
                .members
                .iter()
                .filter(|(_, t)| t.contains(topic))
                .map(|(id, _)| *id)
                .collect();
            let Some(slot) = subscribers.iter().position(|id| *id == member) else {
                continue;
            };
            for partition in 0..parts.len() as u32 {
                if partition as usize % subscribers.len() == slot {
                    assigned.push(TopicPartition::new(topic.clone(), partition));
                }
            }
        }
        assigned.sort();
        Ok((group_state.generation, assigned))
    }

    pub(crate) fn commit(&self, group: &str, offsets: &[TopicPartitionOffset]) -> Result<()> {
        let mut state = self.lock()?;
        for tpo in offsets {
            state
                .committed
                .insert((group.to_string(), tpo.topic_partition.clone()), tpo.offset);
        }
        Ok(())
    }

    /// Next offset the group will read from `tp`, if anything was committed.
    pub fn committed_offset(&self, group: &str, tp: &TopicPartition) -> Result<Option<Offset>> {
        Ok(self
            .lock()?
            .committed
            .get(&(group.to_string(), tp.clone()))
            .copied())
    }
}

pub(crate) fn partition_for_key(key: &[u8], partitions: u32) -> u32 {
    let mut hasher = AHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as u32
}
