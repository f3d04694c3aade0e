use super::{
    Inner,
    QueryKey,
    QueryState,
};
use std::sync::{
    Arc,
    Weak,
};
use tokio::sync::watch;

/// Live view of one query. The key stays observed until the last clone is dropped.
pub struct QueryObserver<T> {
    key: QueryKey,
    receiver: watch::Receiver<QueryState<T>>,
    _guard: Arc<ObserverGuard>,
}

impl<T> Clone for QueryObserver<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            receiver: self.receiver.clone(),
            _guard: self._guard.clone(),
        }
    }
}

impl<T> std::fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key.to_string())
            .finish_non_exhaustive()
    }
}

impl<T: Clone> QueryObserver<T> {
    pub(super) fn new(key: QueryKey, receiver: watch::Receiver<QueryState<T>>, guard: ObserverGuard) -> Self {
        Self {
            key,
            receiver,
            _guard: Arc::new(guard),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next change and returns the new state. `None` once the entry was removed from the cache.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Waits until no request is in flight and there is data or an error to show.
    pub async fn settled(&mut self) -> QueryState<T> {
        let settled = self
            .receiver
            .wait_for(QueryState::is_settled)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }
}

/// Unregisters the observer from its cache entry when dropped.
pub(super) struct ObserverGuard {
    pub(super) cache: Weak<Inner>,
    pub(super) key: QueryKey,
    pub(super) id: u64,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.unobserve(&self.key, self.id);
        }
    }
}
