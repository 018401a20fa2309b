use super::*;

/// Lifecycle of a stream thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    Created,
    Starting,
    PartitionsRevoked,
    PartitionsAssigned,
    Running,
    PendingShutdown,
    Dead,
}

impl ThreadState {
    pub const ALL: [ThreadState; 7] = [
        ThreadState::Created,
        ThreadState::Starting,
        ThreadState::PartitionsRevoked,
        ThreadState::PartitionsAssigned,
        ThreadState::Running,
        ThreadState::PendingShutdown,
        ThreadState::Dead,
    ];

    /// Static transition table. Any state may move to `Dead`.
    pub fn is_valid_transition(self, next: ThreadState) -> bool {
        use ThreadState::*;
        if next == Dead {
            return true;
        }
        match self {
            Created => matches!(next, Starting | PendingShutdown),
            Starting => matches!(next, PartitionsAssigned | PartitionsRevoked | PendingShutdown),
            PartitionsRevoked => matches!(next, PartitionsAssigned | PendingShutdown),
            PartitionsAssigned => matches!(next, PartitionsRevoked | Running | PendingShutdown),
            Running => matches!(next, PartitionsRevoked | PartitionsAssigned | PendingShutdown),
            PendingShutdown | Dead => false,
        }
    }

    pub fn is_alive(self) -> bool {
        !matches!(self, ThreadState::PendingShutdown | ThreadState::Dead)
    }
}

impl std::fmt::Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ThreadState::Created => "CREATED",
            ThreadState::Starting => "STARTING",
            ThreadState::PartitionsRevoked => "PARTITIONS_REVOKED",
            ThreadState::PartitionsAssigned => "PARTITIONS_ASSIGNED",
            ThreadState::Running => "RUNNING",
            ThreadState::PendingShutdown => "PENDING_SHUTDOWN",
            ThreadState::Dead => "DEAD",
        };
        f.write_str(name)
    }
}

/// Called with `(thread_id, previous, new)` after every accepted transition.
pub type ThreadStateListener = Arc<dyn Fn(&str, ThreadState, ThreadState) + Send + Sync>;

/// Guards a thread's state and notifies listeners on change.
pub struct ThreadStateMachine {
    thread_id: String,
    log_prefix: String,
    state: Mutex<ThreadState>,
    listeners: RwLock<Vec<ThreadStateListener>>,
}

impl ThreadStateMachine {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let thread_id = thread_id.into();
        Self {
            log_prefix: format!("stream-thread[{thread_id}] "),
            thread_id,
            state: Mutex::new(ThreadState::Created),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn state(&self) -> Result<ThreadState> {
        Ok(*self
            .state
            .lock()
            .map_err(|_| anyhow!("{}state lock poisoned", self.log_prefix))?)
    }

    pub fn add_listener(&self, listener: ThreadStateListener) -> Result<()> {
        self.listeners
            .write()
            .map_err(|_| anyhow!("{}listener lock poisoned", self.log_prefix))?
            .push(listener);
        Ok(())
    }

    /// Move to `next`. Returns the previous state, or `None` when the request
    /// was ignored: once `PendingShutdown` only `Dead` is accepted, and once
    /// `Dead` nothing is.
    pub fn set_state(&self, next: ThreadState) -> Result<Option<ThreadState>> {
        let previous = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow!("{}state lock poisoned", self.log_prefix))?;
            let previous = *state;
            if previous == ThreadState::PendingShutdown && next != ThreadState::Dead {
                debug!(
                    "{}ignoring transition from {previous} to {next}: only DEAD may follow",
                    self.log_prefix
                );
                return Ok(None);
            }
            if previous == ThreadState::Dead {
                debug!("{}ignoring transition from DEAD to {next}", self.log_prefix);
                return Ok(None);
            }
            if !previous.is_valid_transition(next) {
                error!("{}unexpected state transition from {previous} to {next}", self.log_prefix);
                return Err(StreamsError::IllegalStateTransition {
                    from: previous.to_string(),
                    to: next.to_string(),
                }
                .into());
            }
            *state = next;
            previous
        };

        info!("{}state transition from {previous} to {next}", self.log_prefix);
        let listeners = self
            .listeners
            .read()
            .map_err(|_| anyhow!("{}listener lock poisoned", self.log_prefix))?
            .clone();
        for listener in listeners {
            listener(&self.thread_id, previous, next);
        }
        Ok(Some(previous))
    }
}
