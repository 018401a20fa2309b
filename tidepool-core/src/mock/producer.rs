use super::*;

#[derive(Debug, Default)]
struct ProducerState {
    transactions_ready: bool,
    in_transaction: bool,
    pending_records: Vec<(TopicPartition, ProducerRecord)>,
    pending_offsets: Vec<(String, Vec<TopicPartitionOffset>)>,
    sent: u64,
    committed_transactions: u64,
    aborted_transactions: u64,
    closed: bool,
}

/// Producer over a [`MockCluster`].
///
/// Transactional producers buffer records and offsets until
/// `commit_transaction`; an abort discards both.
pub struct MockProducer {
    cluster: Arc<MockCluster>,
    config: ProducerConfig,
    state: Mutex<ProducerState>,
}

impl MockProducer {
    pub fn new(cluster: Arc<MockCluster>, config: ProducerConfig) -> Self {
        Self {
            cluster,
            config,
            state: Mutex::new(ProducerState::default()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    pub fn is_transactional(&self) -> bool {
        self.config.transactional_id.is_some()
    }

    pub fn sent_count(&self) -> Result<u64> {
        Ok(self.lock()?.sent)
    }

    pub fn committed_transactions(&self) -> Result<u64> {
        Ok(self.lock()?.committed_transactions)
    }

    pub fn aborted_transactions(&self) -> Result<u64> {
        Ok(self.lock()?.aborted_transactions)
    }

    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.lock()?.closed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ProducerState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("mock producer lock poisoned"))
    }

    fn transactional_state(&self) -> Result<std::sync::MutexGuard<'_, ProducerState>> {
        if !self.is_transactional() {
            return Err(StreamsError::Transport(format!(
                "producer {} is not transactional",
                self.config.client_id
            ))
            .into());
        }
        let state = self.lock()?;
        if !state.transactions_ready {
            return Err(StreamsError::Transport("transactions not initialized".into()).into());
        }
        Ok(state)
    }
}

impl Producer for MockProducer {
    fn send(&self, record: ProducerRecord) -> Result<TopicPartition> {
        let tp = self
            .cluster
            .resolve_partition(&record.topic, record.partition, &record.key)?;
        let mut state = self.lock()?;
        if state.closed {
            return Err(StreamsError::Transport("producer is closed".into()).into());
        }
        if self.is_transactional() {
            if !state.in_transaction {
                return Err(StreamsError::Transport("send outside of a transaction".into()).into());
            }
            state.pending_records.push((tp.clone(), record));
        } else {
            self.cluster
                .append(&tp, record.key, record.value, record.timestamp)?;
        }
        state.sent += 1;
        Ok(tp)
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn init_transactions(&self, _timeout: Duration) -> Result<()> {
        if !self.is_transactional() {
            return Err(StreamsError::Transport("transactional_id not set".into()).into());
        }
        self.lock()?.transactions_ready = true;
        Ok(())
    }

    fn begin_transaction(&self) -> Result<()> {
        let mut state = self.transactional_state()?;
        if state.in_transaction {
            return Err(StreamsError::Transport("transaction already in progress".into()).into());
        }
        state.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&self, _timeout: Duration) -> Result<()> {
        let mut state = self.transactional_state()?;
        if !state.in_transaction {
            return Err(StreamsError::Transport("no transaction in progress".into()).into());
        }
        for (tp, record) in state.pending_records.drain(..) {
            self.cluster
                .append(&tp, record.key, record.value, record.timestamp)?;
        }
        for (group, offsets) in state.pending_offsets.drain(..) {
            self.cluster.commit(&group, &offsets)?;
        }
        state.in_transaction = false;
        state.committed_transactions += 1;
        Ok(())
    }

    fn abort_transaction(&self, _timeout: Duration) -> Result<()> {
        let mut state = self.transactional_state()?;
        state.pending_records.clear();
        state.pending_offsets.clear();
        state.in_transaction = false;
        state.aborted_transactions += 1;
        Ok(())
    }

    fn send_offsets_to_transaction(
        &self,
        offsets: &[TopicPartitionOffset],
        group_id: &str,
        _timeout: Duration,
    ) -> Result<()> {
        let mut state = self.transactional_state()?;
        if !state.in_transaction {
            return Err(StreamsError::Transport("no transaction in progress".into()).into());
        }
        state
            .pending_offsets
            .push((group_id.to_string(), offsets.to_vec()));
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.pending_records.clear();
        state.pending_offsets.clear();
        state.in_transaction = false;
        state.closed = true;
        Ok(())
    }
}
