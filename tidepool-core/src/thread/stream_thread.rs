use super::*;

// ============================================================================
// StreamThread
// ============================================================================

/// One poll-process-commit loop over a subset of the input partitions.
///
/// # Loop iteration
///
/// ```text
/// while !cancelled {
///     if an error was captured last iteration => close, return it
///     record = consumer.poll(timeout for state)
///     route record to its task
///     for each task that can process => process one record, commit if requested
///     if RUNNING => maybe_commit()
///     if PARTITIONS_ASSIGNED => RUNNING
/// }
/// signal loop exit, wait for the close path, release the consumer
/// ```
///
/// # Shutdown
///
/// [`StreamThread::close`] cancels the loop and waits for it to exit, then
/// moves to `PENDING_SHUTDOWN` and closes the tasks. The loop in turn waits for
/// the close path before releasing the consumer, so the consumer is never
/// closed while tasks still commit through it.
pub struct StreamThread {
    thread_id: String,
    log_prefix: String,
    config: Arc<StreamConfig>,
    clock: Arc<dyn Clock>,
    state: ThreadStateMachine,
    manager: TaskManager,
    consumer: Arc<dyn Consumer>,
    source_topics: Vec<String>,
    cancel: OnceLock<CancellationToken>,
    last_commit_ms: AtomicI64,
    spawned: AtomicBool,
    loop_exit_tx: Sender<()>,
    loop_exit_rx: Receiver<()>,
    /// Dropped by the close path; the loop waits for the disconnect.
    release_tx: Mutex<Option<Sender<()>>>,
    release_rx: Receiver<()>,
    handle: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl StreamThread {
    /// Build thread `index` of a runtime: its consumer, task manager and
    /// rebalance listener.
    pub fn create(
        index: usize,
        topology: Arc<ProcessorTopology>,
        config: Arc<StreamConfig>,
        supplier: Arc<dyn ClientSupplier>,
        global_stores: GlobalStores,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>> {
        let thread_id = format!("{}-StreamThread-{index}", config.settings.client_id());
        let log_prefix = format!("stream-thread[{thread_id}] ");

        let listener = Arc::new(StreamsRebalanceListener::new());
        let consumer = supplier.consumer(
            ConsumerConfig {
                client_id: consumer_client_id(&thread_id),
                group_id: config.settings.application_id.clone(),
            },
            listener.clone(),
        )?;

        let source_topics = topology.source_topics();
        let creator = TaskCreator::new(
            topology,
            config.clone(),
            supplier,
            thread_id.clone(),
            global_stores,
        );
        let manager = TaskManager::new(creator, log_prefix.clone());
        manager.set_consumer(consumer.clone())?;

        let (loop_exit_tx, loop_exit_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(0);
        let thread = Arc::new(Self {
            state: ThreadStateMachine::new(thread_id.clone()),
            thread_id,
            log_prefix,
            last_commit_ms: AtomicI64::new(clock.now_ms()),
            config,
            clock,
            manager,
            consumer,
            source_topics,
            cancel: OnceLock::new(),
            spawned: AtomicBool::new(false),
            loop_exit_tx,
            loop_exit_rx,
            release_tx: Mutex::new(Some(release_tx)),
            release_rx,
            handle: Mutex::new(None),
        });
        listener.bind(&thread)?;
        Ok(thread)
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn log_prefix(&self) -> &str {
        &self.log_prefix
    }

    pub fn state(&self) -> Result<ThreadState> {
        self.state.state()
    }

    pub(crate) fn set_state(&self, next: ThreadState) -> Result<Option<ThreadState>> {
        self.state.set_state(next)
    }

    pub fn add_state_listener(&self, listener: ThreadStateListener) -> Result<()> {
        self.state.add_listener(listener)
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.manager
    }

    pub fn last_commit_ms(&self) -> i64 {
        self.last_commit_ms.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// Subscribe to the source topics and spawn the loop on a dedicated OS
    /// thread. A thread that is already shutting down is not started.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<()> {
        if !self.prepare_start(cancel)? {
            return Ok(());
        }
        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(self.thread_id.clone())
            .spawn(move || this.run())?;
        self.spawned.store(true, Ordering::SeqCst);
        *self
            .handle
            .lock()
            .map_err(|_| anyhow!("{}join handle lock poisoned", self.log_prefix))? = Some(handle);
        Ok(())
    }

    /// Start without spawning; the caller drives [`StreamThread::run_once`].
    #[cfg(test)]
    pub(crate) fn start_inline(&self, cancel: CancellationToken) -> Result<bool> {
        self.prepare_start(cancel)
    }

    fn prepare_start(&self, cancel: CancellationToken) -> Result<bool> {
        info!("{}starting", self.log_prefix);
        if self.state.set_state(ThreadState::Starting)?.is_none() {
            info!("{}already shut down, not starting", self.log_prefix);
            return Ok(false);
        }
        self.cancel
            .set(cancel)
            .map_err(|_| anyhow!("{}thread started twice", self.log_prefix))?;
        self.consumer.subscribe(&self.source_topics)?;
        Ok(true)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.get().is_some_and(CancellationToken::is_cancelled)
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// Loop body of the OS thread. Returns the error that stopped the loop, if
    /// any.
    pub fn run(&self) -> Result<()> {
        let mut captured: Option<anyhow::Error> = None;
        while !self.is_cancelled() {
            if let Some(err) = captured.take() {
                let _ = self.shutdown();
                self.signal_loop_exit();
                self.release_consumer();
                return Err(err);
            }
            if let Err(err) = self.run_once() {
                error!("{}encountered an error during processing: {err:#}", self.log_prefix);
                captured = Some(err);
            }
        }

        self.signal_loop_exit();
        // Blocks until the close path drops the release sender.
        let _ = self.release_rx.recv();
        self.release_consumer();
        Ok(())
    }

    /// One loop iteration.
    pub(crate) fn run_once(&self) -> Result<()> {
        let timeout = match self.state.state()? {
            ThreadState::PartitionsAssigned | ThreadState::PartitionsRevoked => Duration::ZERO,
            ThreadState::Running | ThreadState::Starting => self.config.settings.poll_timeout(),
            other => {
                return Err(anyhow!(
                    "{}unexpected state {other} during normal iteration",
                    self.log_prefix
                ));
            }
        };

        if let Some(record) = self.consumer.poll(timeout)? {
            self.manager.route(record)?;
        }

        for task in self.manager.active_tasks()? {
            if task.can_process()? && task.process()? && task.commit_needed()? {
                self.manager.commit_task(&task)?;
            }
        }

        let state = self.state.state()?;
        if state == ThreadState::Running {
            self.maybe_commit()?;
        }
        if state == ThreadState::PartitionsAssigned {
            self.state.set_state(ThreadState::Running)?;
        }
        Ok(())
    }

    /// Commit every task once the commit interval has elapsed. Returns `None`
    /// when no commit was attempted, otherwise the task manager's result
    /// (`-1` during a rebalance). The commit timestamp advances only when at
    /// least one task committed.
    pub fn maybe_commit(&self) -> Result<Option<i32>> {
        let now = self.clock.now_ms();
        let elapsed = now - self.last_commit_ms();
        let interval = self.config.settings.commit_interval().as_millis() as i64;
        if elapsed <= interval {
            return Ok(None);
        }

        debug!(
            "{}committing active tasks {:?} since {elapsed}ms has elapsed (commit interval is {interval}ms)",
            self.log_prefix,
            self.manager.active_task_ids()?
        );
        let committed = self.manager.commit_all()?;
        if committed == -1 {
            debug!("{}unable to commit during a rebalance, will retry", self.log_prefix);
        } else if committed > 0 {
            self.last_commit_ms.store(now, Ordering::SeqCst);
        }
        Ok(Some(committed))
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stop the loop, close every task and wait for the OS thread. Safe to call
    /// more than once.
    pub fn close(&self) -> Result<()> {
        if let Some(cancel) = self.cancel.get() {
            cancel.cancel();
        }
        if !self.state.state()?.is_alive() {
            self.join();
            return Ok(());
        }
        if self.spawned.load(Ordering::SeqCst) && !self.on_own_thread() {
            // The loop signals once it leaves; a loop that already failed has
            // signalled too.
            let _ = self.loop_exit_rx.recv();
        }
        let result = self.shutdown();
        if !self.spawned.load(Ordering::SeqCst) {
            self.release_consumer();
        }
        self.join();
        result
    }

    /// Close tasks and leave the group, then release the loop and move to
    /// `DEAD`. Runs at most once.
    fn shutdown(&self) -> Result<()> {
        if self.state.set_state(ThreadState::PendingShutdown)?.is_none() {
            return Ok(());
        }
        info!("{}shutting down", self.log_prefix);

        let tasks = self.manager.close();
        let unsubscribe = self.consumer.unsubscribe();
        self.release_loop();
        let dead = self.state.set_state(ThreadState::Dead).map(|_| ());

        let result = tasks.and(unsubscribe).and(dead);
        match &result {
            Ok(()) => info!("{}shutdown complete", self.log_prefix),
            Err(err) => error!("{}failed to close stream thread: {err:#}", self.log_prefix),
        }
        result
    }

    fn signal_loop_exit(&self) {
        let _ = self.loop_exit_tx.try_send(());
    }

    fn release_loop(&self) {
        match self.release_tx.lock() {
            Ok(mut sender) => drop(sender.take()),
            Err(_) => warn!("{}release lock poisoned", self.log_prefix),
        }
    }

    fn release_consumer(&self) {
        if let Err(err) = self.consumer.close() {
            error!("{}failed to close consumer: {err:#}", self.log_prefix);
        }
    }

    fn on_own_thread(&self) -> bool {
        std::thread::current().name() == Some(self.thread_id.as_str())
    }

    fn join(&self) {
        if self.on_own_thread() {
            return;
        }
        let handle = match self.handle.lock() {
            Ok(mut handle) => handle.take(),
            Err(_) => {
                warn!("{}join handle lock poisoned", self.log_prefix);
                None
            }
        };
        if let Some(handle) = handle {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!("{}loop ended with error: {err:#}", self.log_prefix),
                Err(_) => error!("{}stream thread panicked", self.log_prefix),
            }
        }
    }
}

impl ThreadStoreView for StreamThread {
    fn thread_state(&self) -> Result<ThreadState> {
        self.state()
    }

    fn stores_named(&self, name: &str) -> Result<Vec<Arc<dyn StateStore>>> {
        Ok(self
            .manager
            .active_tasks()?
            .iter()
            .filter_map(|task| task.get_store(name))
            .collect())
    }
}

impl std::fmt::Debug for StreamThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamThread")
            .field("thread_id", &self.thread_id)
            .field("source_topics", &self.source_topics)
            .finish()
    }
}
