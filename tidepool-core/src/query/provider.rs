use super::*;

/// Stores of one stream thread, available only while it is `RUNNING`.
#[derive(Clone)]
pub struct StreamThreadStateStoreProvider {
    thread: Arc<dyn ThreadStoreView>,
}

impl StreamThreadStateStoreProvider {
    pub fn new(thread: Arc<dyn ThreadStoreView>) -> Self {
        Self { thread }
    }

    /// Matching stores of the thread. A dead thread contributes nothing; a
    /// thread that is not running, or a matching store that is closed, means
    /// the store may have moved.
    pub fn stores<T: StateStore>(&self, store_name: &str) -> Result<Vec<Arc<T>>> {
        match self.thread.thread_state()? {
            ThreadState::Dead => return Ok(Vec::new()),
            ThreadState::Running => {}
            _ => return Err(migrated_error(store_name)),
        }
        let mut found = Vec::new();
        for store in self.thread.stores_named(store_name)? {
            if let Some(typed) = downcast_store::<T>(&store) {
                if !store.is_open() {
                    return Err(migrated_error(store_name));
                }
                found.push(typed);
            }
        }
        Ok(found)
    }
}

/// Stores owned by the global state manager.
#[derive(Clone)]
pub struct GlobalStateStoreProvider {
    stores: GlobalStores,
}

impl GlobalStateStoreProvider {
    pub fn new(stores: GlobalStores) -> Self {
        Self { stores }
    }

    pub fn stores<T: StateStore>(&self, store_name: &str) -> Result<Vec<Arc<T>>> {
        let Some(store) = self.stores.get(store_name) else {
            return Ok(Vec::new());
        };
        let Some(typed) = downcast_store::<T>(store) else {
            return Ok(Vec::new());
        };
        if !store.is_open() {
            return Err(StreamsError::InvalidStateStore(format!(
                "the state store, {store_name}, is not open."
            ))
            .into());
        }
        Ok(vec![typed])
    }
}

/// Entry point for interactive queries.
pub struct QueryableStoreProvider {
    global: GlobalStateStoreProvider,
    threads: Vec<StreamThreadStateStoreProvider>,
}

impl QueryableStoreProvider {
    pub fn new(global: GlobalStateStoreProvider, threads: Vec<StreamThreadStateStoreProvider>) -> Self {
        Self { global, threads }
    }

    /// Global stores answer first; otherwise the union over every thread.
    /// Finding nothing is a "may have migrated" error.
    pub fn stores<T: StateStore>(&self, store_name: &str) -> Result<Vec<Arc<T>>> {
        let global = self.global.stores::<T>(store_name)?;
        if !global.is_empty() {
            return Ok(global);
        }
        let mut all = Vec::new();
        for thread in &self.threads {
            all.extend(thread.stores::<T>(store_name)?);
        }
        if all.is_empty() {
            return Err(migrated_error(store_name));
        }
        Ok(all)
    }

    /// Resolve once up front so an unavailable store fails fast, then hand
    /// out a view that resolves again on every read.
    pub fn get_store<Q: QueryableStoreType>(
        self: &Arc<Self>,
        params: &StoreQueryParameters<Q>,
    ) -> Result<Q::Output> {
        self.stores::<Q::Store>(params.store_name())?;
        Ok(params
            .query_type()
            .create(Arc::clone(self), params.store_name()))
    }
}
