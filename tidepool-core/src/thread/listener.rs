use super::*;

/// Turns consumer-group callbacks into task creation and closure.
///
/// The listener is handed to the consumer before the thread exists, so it
/// holds a weak reference bound right after construction.
#[derive(Default)]
pub struct StreamsRebalanceListener {
    thread: OnceLock<Weak<StreamThread>>,
}

impl StreamsRebalanceListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, thread: &Arc<StreamThread>) -> Result<()> {
        self.thread
            .set(Arc::downgrade(thread))
            .map_err(|_| anyhow!("rebalance listener already bound"))
    }

    /// The owning thread, unless it is gone or shutting down.
    fn live_thread(&self) -> Result<Option<Arc<StreamThread>>> {
        let Some(thread) = self.thread.get().and_then(Weak::upgrade) else {
            return Ok(None);
        };
        if thread.state()?.is_alive() {
            Ok(Some(thread))
        } else {
            Ok(None)
        }
    }
}

impl RebalanceListener for StreamsRebalanceListener {
    fn on_partitions_assigned(&self, partitions: &[TopicPartition]) -> Result<()> {
        let Some(thread) = self.live_thread()? else {
            return Ok(());
        };
        info!(
            "{}partitions assigned: [{}]",
            thread.log_prefix(),
            partitions
                .iter()
                .map(|tp| tp.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        thread.task_manager().create_tasks(partitions)?;
        thread.set_state(ThreadState::PartitionsAssigned)?;
        thread.task_manager().set_rebalance_in_progress(false);
        Ok(())
    }

    fn on_partitions_revoked(&self, partitions: &[TopicPartition]) -> Result<()> {
        let Some(thread) = self.live_thread()? else {
            return Ok(());
        };
        info!(
            "{}partitions revoked: [{}]",
            thread.log_prefix(),
            partitions
                .iter()
                .map(|tp| tp.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        thread.set_state(ThreadState::PartitionsRevoked)?;
        thread.task_manager().set_rebalance_in_progress(true);
        thread.task_manager().revoke_tasks(partitions)
    }
}
