//! Runtime entry point.
//!
//! [`StreamsRuntime`] owns every thread of one application instance: the
//! stream threads, and the global state thread when the topology declares
//! global stores. Its own state is an aggregate of the thread states.
//!
//! ```text
//! CREATED ─▶ REBALANCING ◀─▶ RUNNING
//!    │            │             │
//!    │            └──▶ ERROR ◀──┘        (every stream thread died)
//!    ▼
//! PENDING_SHUTDOWN ─▶ NOT_RUNNING        (close, from any state)
//! ```

use crate::client::{AdminConfig, ClientSupplier, ConsumerConfig, admin_client_id, global_consumer_client_id};
use crate::config::StreamConfig;
use crate::error::{StreamsError, attempt_all};
use crate::global::{GlobalStateManager, GlobalStateUpdater};
use crate::processors::ProcessorTopology;
use crate::query::{
    GlobalStateStoreProvider, QueryableStoreProvider, QueryableStoreType, StoreQueryParameters,
    StreamThreadStateStoreProvider, ThreadStoreView,
};
use crate::task::GlobalStores;
use crate::thread::{CancellationToken, StreamThread, ThreadState};
use crate::time::{Clock, SystemClock};
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeState {
    Created,
    Rebalancing,
    Running,
    PendingShutdown,
    NotRunning,
    Error,
}

impl RuntimeState {
    /// States in which stores may be queried.
    pub fn is_running_or_rebalancing(self) -> bool {
        matches!(self, RuntimeState::Running | RuntimeState::Rebalancing)
    }

    fn is_shutting_down(self) -> bool {
        matches!(self, RuntimeState::PendingShutdown | RuntimeState::NotRunning)
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeState::Created => "CREATED",
            RuntimeState::Rebalancing => "REBALANCING",
            RuntimeState::Running => "RUNNING",
            RuntimeState::PendingShutdown => "PENDING_SHUTDOWN",
            RuntimeState::NotRunning => "NOT_RUNNING",
            RuntimeState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Called with `(previous, new)` on every runtime state change.
pub type RuntimeStateListener = Arc<dyn Fn(RuntimeState, RuntimeState) + Send + Sync>;

/// Aggregates thread states into the runtime state.
#[derive(Default)]
struct StateTracker {
    inner: Mutex<TrackerInner>,
    listener: RwLock<Option<RuntimeStateListener>>,
}

struct TrackerInner {
    state: RuntimeState,
    threads: BTreeMap<String, ThreadState>,
}

impl Default for TrackerInner {
    fn default() -> Self {
        Self {
            state: RuntimeState::Created,
            threads: BTreeMap::new(),
        }
    }
}

impl StateTracker {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TrackerInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("runtime state lock poisoned"))
    }

    fn state(&self) -> Result<RuntimeState> {
        Ok(self.lock()?.state)
    }

    fn set_listener(&self, listener: RuntimeStateListener) -> Result<()> {
        *self
            .listener
            .write()
            .map_err(|_| anyhow!("runtime listener lock poisoned"))? = Some(listener);
        Ok(())
    }

    /// Move to `next` unless already there; returns the previous state.
    fn transition(&self, next: RuntimeState) -> Result<Option<RuntimeState>> {
        let previous = {
            let mut inner = self.lock()?;
            if inner.state == next {
                return Ok(None);
            }
            std::mem::replace(&mut inner.state, next)
        };
        info!("runtime state transition from {previous} to {next}");
        self.notify(previous, next)?;
        Ok(Some(previous))
    }

    /// Track `threads` from `CREATED` so a fast thread cannot report the
    /// runtime as running before the others started.
    fn track(&self, threads: &[Arc<StreamThread>]) -> Result<()> {
        let mut inner = self.lock()?;
        for thread in threads {
            inner
                .threads
                .insert(thread.thread_id().to_string(), ThreadState::Created);
        }
        Ok(())
    }

    fn on_thread_state(&self, thread_id: &str, new: ThreadState) -> Result<()> {
        let change = {
            let mut inner = self.lock()?;
            inner.threads.insert(thread_id.to_string(), new);
            if inner.state.is_shutting_down() || inner.state == RuntimeState::Created {
                return Ok(());
            }
            let next = aggregate(inner.threads.values().copied());
            if next == inner.state {
                return Ok(());
            }
            (std::mem::replace(&mut inner.state, next), next)
        };
        let (previous, next) = change;
        match next {
            RuntimeState::Error => error!("all stream threads have died, runtime state is {next}"),
            _ => info!("runtime state transition from {previous} to {next}"),
        }
        self.notify(previous, next)
    }

    fn notify(&self, previous: RuntimeState, next: RuntimeState) -> Result<()> {
        let listener = self
            .listener
            .read()
            .map_err(|_| anyhow!("runtime listener lock poisoned"))?
            .clone();
        if let Some(listener) = listener {
            listener(previous, next);
        }
        Ok(())
    }
}

/// Runtime state implied by the states of its stream threads.
fn aggregate(threads: impl Iterator<Item = ThreadState>) -> RuntimeState {
    let live: Vec<ThreadState> = threads.filter(|s| *s != ThreadState::Dead).collect();
    if live.is_empty() {
        RuntimeState::Error
    } else if live.iter().all(|s| *s == ThreadState::Running) {
        RuntimeState::Running
    } else {
        RuntimeState::Rebalancing
    }
}

struct GlobalThread {
    updater: Arc<GlobalStateUpdater>,
    handle: Option<JoinHandle<Result<()>>>,
}

#[derive(Default)]
struct RuntimeInner {
    threads: Vec<Arc<StreamThread>>,
    global: Option<GlobalThread>,
    provider: Option<Arc<QueryableStoreProvider>>,
}

// ============================================================================
// StreamsRuntime
// ============================================================================

/// One running instance of a topology.
pub struct StreamsRuntime {
    topology: Arc<ProcessorTopology>,
    config: Arc<StreamConfig>,
    supplier: Arc<dyn ClientSupplier>,
    clock: Arc<dyn Clock>,
    tracker: Arc<StateTracker>,
    cancel: CancellationToken,
    inner: Mutex<RuntimeInner>,
}

impl StreamsRuntime {
    pub fn new(
        topology: ProcessorTopology,
        config: StreamConfig,
        supplier: Arc<dyn ClientSupplier>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            topology: Arc::new(topology),
            config: Arc::new(config),
            supplier,
            clock: Arc::new(SystemClock),
            tracker: Arc::new(StateTracker::default()),
            cancel: CancellationToken::new(),
            inner: Mutex::new(RuntimeInner::default()),
        })
    }

    /// Replace the wall clock used for commit timing.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RuntimeInner>> {
        self.inner.lock().map_err(|_| anyhow!("runtime lock poisoned"))
    }

    pub fn state(&self) -> Result<RuntimeState> {
        self.tracker.state()
    }

    pub fn set_state_listener(&self, listener: RuntimeStateListener) -> Result<()> {
        self.tracker.set_listener(listener)
    }

    /// Current state of every stream thread.
    pub fn thread_states(&self) -> Result<BTreeMap<String, ThreadState>> {
        let threads = self.lock()?.threads.clone();
        threads
            .iter()
            .map(|t| Ok((t.thread_id().to_string(), t.state()?)))
            .collect()
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// Restore global state, then start every stream thread. A runtime starts
    /// at most once.
    pub fn start(&self) -> Result<()> {
        if self.state()? != RuntimeState::Created {
            return Err(StreamsError::Configuration(format!(
                "runtime can only be started once, state is {}",
                self.state()?
            ))
            .into());
        }
        let client_id = self.config.settings.client_id().to_string();
        info!("starting runtime {client_id}");

        let (global_stores, global) = self.start_global(&client_id)?;

        let mut threads = Vec::with_capacity(self.config.settings.num_stream_threads);
        for index in 0..self.config.settings.num_stream_threads {
            let thread = StreamThread::create(
                index,
                self.topology.clone(),
                self.config.clone(),
                self.supplier.clone(),
                global_stores.clone(),
                self.clock.clone(),
            )?;
            let tracker = self.tracker.clone();
            thread.add_state_listener(Arc::new(move |thread_id: &str, _old: ThreadState, new: ThreadState| {
                if let Err(err) = tracker.on_thread_state(thread_id, new) {
                    error!("failed to track state of {thread_id}: {err:#}");
                }
            }))?;
            threads.push(thread);
        }

        let provider = Arc::new(QueryableStoreProvider::new(
            GlobalStateStoreProvider::new(global_stores),
            threads
                .iter()
                .map(|t| {
                    let view: Arc<dyn ThreadStoreView> = t.clone();
                    StreamThreadStateStoreProvider::new(view)
                })
                .collect(),
        ));

        {
            let mut inner = self.lock()?;
            inner.threads = threads.clone();
            inner.global = global;
            inner.provider = Some(provider);
        }
        self.tracker.track(&threads)?;
        self.tracker.transition(RuntimeState::Rebalancing)?;

        for thread in &threads {
            thread.start(self.cancel.clone())?;
        }
        info!("runtime {client_id} started {} stream threads", threads.len());
        Ok(())
    }

    /// Bootstrap global stores and spawn their updater. Without global stores
    /// nothing is started.
    fn start_global(&self, client_id: &str) -> Result<(GlobalStores, Option<GlobalThread>)> {
        if self.topology.global_stores().is_empty() {
            return Ok((Arc::new(BTreeMap::new()), None));
        }

        let admin = self.supplier.admin(AdminConfig {
            client_id: admin_client_id(client_id),
        })?;
        let manager = Arc::new(GlobalStateManager::new(
            self.topology.clone(),
            admin,
            self.config.clone(),
        ));
        manager.initialize()?;

        let consumer = self.supplier.global_consumer(ConsumerConfig {
            client_id: global_consumer_client_id(client_id),
            group_id: self.config.settings.application_id.clone(),
        })?;
        let updater = Arc::new(GlobalStateUpdater::new(
            manager.clone(),
            consumer,
            &self.config,
            self.clock.clone(),
        ));
        updater.initialize()?;

        let runner = updater.clone();
        let cancel = self.cancel.clone();
        let poll_timeout = self.config.settings.poll_timeout();
        let handle = std::thread::Builder::new()
            .name(format!("{client_id}-GlobalStreamThread"))
            .spawn(move || runner.run(&cancel, poll_timeout))?;

        Ok((
            manager.global_stores()?,
            Some(GlobalThread {
                updater,
                handle: Some(handle),
            }),
        ))
    }

    // ========================================================================
    // Interactive queries
    // ========================================================================

    /// Read-only view of a store across every local instance.
    pub fn store<Q: QueryableStoreType>(&self, params: &StoreQueryParameters<Q>) -> Result<Q::Output> {
        let state = self.state()?;
        if !state.is_running_or_rebalancing() {
            return Err(StreamsError::InvalidStateStore(format!(
                "cannot get state store {} because the runtime is not running, state is {state}",
                params.store_name()
            ))
            .into());
        }
        let provider = self
            .lock()?
            .provider
            .clone()
            .ok_or_else(|| anyhow!("runtime has no store provider"))?;
        provider.get_store(params)
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stop every thread and release every client. Safe to call more than
    /// once.
    pub fn close(&self) -> Result<()> {
        if self.state()? == RuntimeState::NotRunning {
            return Ok(());
        }
        self.tracker.transition(RuntimeState::PendingShutdown)?;
        info!("closing runtime");
        self.cancel.cancel();

        let (threads, global) = {
            let mut inner = self.lock()?;
            inner.provider = None;
            (std::mem::take(&mut inner.threads), inner.global.take())
        };

        // Each close blocks until its loop exits, and a loop may still need the
        // rayon pool to finish fanning out its last record, so closes run on
        // plain scoped threads.
        let results: Vec<Result<()>> = std::thread::scope(|scope| {
            let handles: Vec<_> = threads
                .iter()
                .map(|thread| scope.spawn(move || thread.close()))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("stream thread close panicked")))
                })
                .collect()
        });
        let mut result = attempt_all(results, |r| r);

        if let Some(mut global) = global {
            if let Some(handle) = global.handle.take() {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => error!("global state thread ended with error: {err:#}"),
                    Err(_) => error!("global state thread panicked"),
                }
            }
            result = result.and(global.updater.close());
        }

        self.tracker.transition(RuntimeState::NotRunning)?;
        match &result {
            Ok(()) => info!("runtime closed"),
            Err(err) => error!("runtime closed with errors: {err:#}"),
        }
        result
    }
}

impl Drop for StreamsRuntime {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!("failed to close runtime on drop: {err:#}");
        }
    }
}

impl fmt::Debug for StreamsRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamsRuntime")
            .field("application_id", &self.config.settings.application_id)
            .field("source_topics", &self.topology.source_topics())
            .finish()
    }
}
