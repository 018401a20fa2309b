use super::*;

/// Keeps global stores current after the initial restore.
pub struct GlobalStateUpdater {
    manager: Arc<GlobalStateManager>,
    consumer: Arc<dyn Consumer>,
    clock: Arc<dyn Clock>,
    flush_interval_ms: i64,
    last_flush_ms: AtomicI64,
}

impl GlobalStateUpdater {
    pub fn new(
        manager: Arc<GlobalStateManager>,
        consumer: Arc<dyn Consumer>,
        config: &StreamConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            manager,
            consumer,
            flush_interval_ms: config.settings.commit_interval().as_millis() as i64,
            last_flush_ms: AtomicI64::new(clock.now_ms()),
            clock,
        }
    }

    pub fn manager(&self) -> &Arc<GlobalStateManager> {
        &self.manager
    }

    /// Restore every store, then position the consumer after the restored
    /// records.
    pub fn initialize(&self) -> Result<()> {
        self.manager.restore(self.consumer.as_ref())?;
        let positions = self.manager.positions()?;
        let partitions: Vec<TopicPartition> =
            positions.iter().map(|p| p.topic_partition.clone()).collect();
        self.consumer.assign(&partitions)?;
        for position in &positions {
            self.consumer.seek(position)?;
        }
        self.last_flush_ms.store(self.clock.now_ms(), Ordering::SeqCst);
        Ok(())
    }

    /// Apply at most one record, flushing the stores once the flush interval
    /// elapsed. Returns whether a record was applied.
    pub fn update(&self, timeout: Duration) -> Result<bool> {
        let applied = match self.consumer.poll(timeout)? {
            Some(record) => self.manager.apply(&record)?,
            None => false,
        };

        let now = self.clock.now_ms();
        if now - self.last_flush_ms.load(Ordering::SeqCst) > self.flush_interval_ms {
            self.manager.flush()?;
            self.last_flush_ms.store(now, Ordering::SeqCst);
        }
        Ok(applied)
    }

    /// Update until cancelled. An error stops the loop and is returned.
    pub fn run(&self, cancel: &CancellationToken, poll_timeout: Duration) -> Result<()> {
        info!("global state updater started");
        while !cancel.is_cancelled() {
            if let Err(err) = self.update(poll_timeout) {
                error!("global state updater failed: {err:#}");
                return Err(err);
            }
        }
        info!("global state updater stopped");
        Ok(())
    }

    /// Flush and close the stores, then release the consumer.
    pub fn close(&self) -> Result<()> {
        let flushed = self.manager.flush();
        let closed = self.manager.close();
        let released = self.consumer.close();
        flushed.and(closed).and(released)
    }
}
