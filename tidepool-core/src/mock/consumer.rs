use super::*;

/// Upper bound on how long an empty poll sleeps.
const MAX_IDLE_WAIT: Duration = Duration::from_millis(20);

#[derive(Debug, Default)]
struct ConsumerState {
    member_id: Option<u64>,
    subscription: Vec<String>,
    generation: u64,
    assignment: Vec<TopicPartition>,
    positions: HashMap<TopicPartition, Offset>,
    cursor: usize,
    closed: bool,
    poll_timeouts: Vec<Duration>,
}

/// Consumer over a [`MockCluster`].
///
/// Group rebalances are detected at the start of `poll`: the listener sees a
/// revocation of the whole previous assignment, then the new assignment. The
/// consumer's own lock is never held while a listener callback runs.
pub struct MockConsumer {
    cluster: Arc<MockCluster>,
    config: ConsumerConfig,
    listener: Option<Arc<dyn RebalanceListener>>,
    state: Mutex<ConsumerState>,
}

impl MockConsumer {
    pub fn new(
        cluster: Arc<MockCluster>,
        config: ConsumerConfig,
        listener: Option<Arc<dyn RebalanceListener>>,
    ) -> Self {
        Self {
            cluster,
            config,
            listener,
            state: Mutex::new(ConsumerState::default()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Timeout of every `poll` call so far, oldest first.
    pub fn poll_timeouts(&self) -> Result<Vec<Duration>> {
        Ok(self.lock()?.poll_timeouts.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ConsumerState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("mock consumer lock poisoned"))
    }

    fn ensure_open(state: &ConsumerState) -> Result<()> {
        if state.closed {
            return Err(StreamsError::Transport("consumer is closed".into()).into());
        }
        Ok(())
    }

    fn maybe_rebalance(&self) -> Result<()> {
        let (member, revoked) = {
            let state = self.lock()?;
            Self::ensure_open(&state)?;
            let Some(member) = state.member_id else {
                return Ok(());
            };
            if self.cluster.group_generation(&self.config.group_id)? == state.generation {
                return Ok(());
            }
            (member, state.assignment.clone())
        };

        if let Some(listener) = &self.listener {
            listener.on_partitions_revoked(&revoked)?;
        }

        let (generation, assigned) = self.cluster.assignment(&self.config.group_id, member)?;
        {
            let mut state = self.lock()?;
            state.generation = generation;
            state.assignment = assigned.clone();
            state.cursor = 0;
            state.positions.clear();
            for tp in &assigned {
                let start = self
                    .cluster
                    .committed_offset(&self.config.group_id, tp)?
                    .unwrap_or(0);
                state.positions.insert(tp.clone(), start);
            }
        }
        debug!(
            client_id = %self.config.client_id,
            generation,
            partitions = assigned.len(),
            "assignment received"
        );

        if let Some(listener) = &self.listener {
            listener.on_partitions_assigned(&assigned)?;
        }
        Ok(())
    }

    fn fetch_next(&self) -> Result<Option<ConsumedRecord>> {
        let mut state = self.lock()?;
        let count = state.assignment.len();
        for step in 0..count {
            let idx = (state.cursor + step) % count;
            let tp = state.assignment[idx].clone();
            let position = state.positions.get(&tp).copied().unwrap_or(0);
            if let Some(record) = self.cluster.fetch(&tp, position)? {
                state.positions.insert(tp, position + 1);
                state.cursor = idx + 1;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

impl Consumer for MockConsumer {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        let previous = {
            let mut state = self.lock()?;
            Self::ensure_open(&state)?;
            state.subscription = topics.to_vec();
            state.generation = 0;
            state.member_id.take()
        };
        if let Some(member) = previous {
            self.cluster.leave_group(&self.config.group_id, member)?;
        }
        let member = self.cluster.join_group(&self.config.group_id, topics)?;
        self.lock()?.member_id = Some(member);
        Ok(())
    }

    fn unsubscribe(&self) -> Result<()> {
        let member = {
            let mut state = self.lock()?;
            state.subscription.clear();
            state.assignment.clear();
            state.positions.clear();
            state.member_id.take()
        };
        if let Some(member) = member {
            self.cluster.leave_group(&self.config.group_id, member)?;
        }
        Ok(())
    }

    fn assign(&self, partitions: &[TopicPartition]) -> Result<()> {
        let mut state = self.lock()?;
        Self::ensure_open(&state)?;
        state.assignment = partitions.to_vec();
        state.cursor = 0;
        state.positions.retain(|tp, _| partitions.contains(tp));
        for tp in partitions {
            state.positions.entry(tp.clone()).or_insert(0);
        }
        Ok(())
    }

    fn seek(&self, position: &TopicPartitionOffset) -> Result<()> {
        let mut state = self.lock()?;
        if !state.assignment.contains(&position.topic_partition) {
            return Err(StreamsError::Transport(format!(
                "cannot seek unassigned partition {}",
                position.topic_partition
            ))
            .into());
        }
        state
            .positions
            .insert(position.topic_partition.clone(), position.offset);
        Ok(())
    }

    fn poll(&self, timeout: Duration) -> Result<Option<ConsumedRecord>> {
        self.lock()?.poll_timeouts.push(timeout);
        self.maybe_rebalance()?;
        if let Some(record) = self.fetch_next()? {
            return Ok(Some(record));
        }
        if timeout.is_zero() {
            return Ok(None);
        }
        std::thread::sleep(timeout.min(MAX_IDLE_WAIT));
        self.fetch_next()
    }

    fn commit(&self, offsets: &[TopicPartitionOffset]) -> Result<()> {
        Self::ensure_open(&*self.lock()?)?;
        self.cluster.commit(&self.config.group_id, offsets)
    }

    fn committed(&self, partition: &TopicPartition) -> Result<Option<Offset>> {
        self.cluster.committed_offset(&self.config.group_id, partition)
    }

    fn watermark_offsets(&self, partition: &TopicPartition) -> Result<(Offset, Offset)> {
        Ok((0, self.cluster.end_offset(partition)?))
    }

    fn assignment(&self) -> Result<Vec<TopicPartition>> {
        Ok(self.lock()?.assignment.clone())
    }

    fn close(&self) -> Result<()> {
        self.unsubscribe()?;
        self.lock()?.closed = true;
        Ok(())
    }
}
