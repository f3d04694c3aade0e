//! Keyed query cache with staleness, request deduplication, invalidation and refetch timers.

mod key;
mod observer;
mod query;

use crate::error::{
    ApiError,
    ClientError,
    ClientResult,
};
use futures::{
    future::{
        BoxFuture,
        Shared,
    },
    FutureExt as _,
};
pub use key::{
    KeyPart,
    QueryKey,
};
pub use observer::QueryObserver;
use observer::ObserverGuard;
pub use query::{
    Query,
    QueryFn,
    QueryState,
    QueryStatus,
};
use std::{
    any::Any,
    collections::HashMap,
    sync::{
        atomic::{
            AtomicU64,
            Ordering,
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        Weak,
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    time::{
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

type AnyValue = Arc<dyn Any + Send + Sync>;
type AnyResult = Result<AnyValue, ClientError>;
type ErasedFetch = Arc<dyn Fn() -> BoxFuture<'static, AnyResult> + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, AnyResult>>;

/// Shared query cache. Clones refer to the same cache.
#[derive(Clone, Default)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.inner.entries().len())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    /// Orders fetch starts, invalidations and clears.
    generation: AtomicU64,
    observer_ids: AtomicU64,
}

#[derive(Default)]
struct Entry {
    data: Option<AnyValue>,
    error: Option<ClientError>,
    updated_at: Option<Instant>,
    /// Generation of the last invalidation not yet covered by a newer fetch.
    invalidated_at: Option<u64>,
    fetch: Option<ErasedFetch>,
    in_flight: Option<InFlight>,
    observers: HashMap<u64, ObserverSlot>,
    timer: Option<RefetchTimer>,
}

struct InFlight {
    generation: u64,
    shared: SharedFetch,
}

struct ObserverSlot {
    enabled: bool,
    refetch_interval: Option<Duration>,
    publish: Box<dyn Fn(&Entry) + Send + Sync>,
}

struct RefetchTimer {
    interval: Duration,
    _guard: DropGuard,
}

impl Entry {
    fn is_fresh(&self, stale_time: Duration) -> bool {
        self.data.is_some()
            && self.invalidated_at.is_none()
            && self.updated_at.is_some_and(|at| at.elapsed() < stale_time)
    }

    fn has_active_observers(&self) -> bool {
        self.observers.values().any(|slot| slot.enabled)
    }

    fn state<T: Clone + 'static>(&self) -> QueryState<T> {
        QueryState::new(
            self.data.as_ref().and_then(|data| data.downcast_ref::<T>()).cloned(),
            self.error.clone(),
            self.in_flight.is_some(),
            self.updated_at,
        )
    }

    fn publish(&self) {
        for slot in self.observers.values() {
            (slot.publish)(self);
        }
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns cached data while it is fresh, otherwise joins the request in flight or starts one.
    #[instrument(level = "trace", skip_all, fields(key = %query.key))]
    pub async fn fetch<T>(&self, query: &Query<T>) -> ClientResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !query.enabled {
            return self.get_query_data(&query.key).ok_or(ClientError::Disabled);
        }
        let shared = {
            let mut entries = self.inner.entries();
            let entry = entries.entry(query.key.clone()).or_default();
            entry.fetch = Some(erase(query));
            if entry.is_fresh(query.stale_time) {
                trace!("serving fresh data");
                if let Some(data) = entry.data.clone() {
                    return downcast(&query.key, data);
                }
            }
            self.inner.join_or_start(&query.key, entry)
        };
        downcast(&query.key, shared.await?)
    }

    /// Fetches regardless of staleness. A request already in flight is joined.
    pub async fn refetch<T>(&self, query: &Query<T>) -> ClientResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !query.enabled {
            return Err(ClientError::Disabled);
        }
        let shared = {
            let mut entries = self.inner.entries();
            let entry = entries.entry(query.key.clone()).or_default();
            entry.fetch = Some(erase(query));
            self.inner.join_or_start(&query.key, entry)
        };
        downcast(&query.key, shared.await?)
    }

    /// Subscribes to a query. While any observer of the key is alive, the key is refetched when invalidated and
    /// on the shortest refetch interval among its observers.
    pub fn observe<T>(&self, query: &Query<T>) -> QueryObserver<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = self.inner.observer_ids.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(QueryState::default());
        let slot = ObserverSlot {
            enabled: query.enabled,
            refetch_interval: query.refetch_interval.filter(|_| query.enabled),
            publish: Box::new(move |entry| {
                sender.send_replace(entry.state::<T>());
            }),
        };

        {
            let mut entries = self.inner.entries();
            let entry = entries.entry(query.key.clone()).or_default();
            (slot.publish)(entry);
            entry.observers.insert(id, slot);
            if query.enabled {
                entry.fetch = Some(erase(query));
                if !entry.is_fresh(query.stale_time) {
                    self.inner.join_or_start(&query.key, entry);
                }
            }
            self.inner.reschedule_timer(&query.key, entry);
        }
        debug!(key = %query.key, enabled = query.enabled, "observing query");

        QueryObserver::new(
            query.key.clone(),
            receiver,
            ObserverGuard {
                cache: Arc::downgrade(&self.inner),
                key: query.key.clone(),
                id,
            },
        )
    }

    /// Marks every entry under `prefix` as outdated. Observed entries refetch right away.
    pub fn invalidate(&self, prefix: &QueryKey) {
        let mut entries = self.inner.entries();
        for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            entry.invalidated_at = Some(self.inner.next_generation());
            trace!(%key, "invalidated");
            if entry.has_active_observers() && entry.in_flight.is_none() {
                self.inner.start(key, entry);
            }
        }
        debug!(%prefix, "invalidated queries");
    }

    pub fn set_query_data<T>(&self, key: &QueryKey, data: T)
    where
        T: Send + Sync + 'static,
    {
        let mut entries = self.inner.entries();
        let entry = entries.entry(key.clone()).or_default();
        entry.data = Some(Arc::new(data));
        entry.error = None;
        entry.updated_at = Some(Instant::now());
        entry.invalidated_at = None;
        entry.publish();
    }

    pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + 'static,
    {
        let entries = self.inner.entries();
        let data = entries.get(key)?.data.as_ref()?;
        data.downcast_ref::<T>().cloned()
    }

    /// Drops every entry under `prefix` together with its observers and timers.
    pub fn remove(&self, prefix: &QueryKey) {
        let removed = {
            let mut entries = self.inner.entries();
            let keys = entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect::<Vec<_>>();
            keys.into_iter()
                .filter_map(|key| entries.remove(&key))
                .collect::<Vec<_>>()
        };
        debug!(%prefix, count = removed.len(), "removed queries");
    }

    /// Forgets all cached data. Results of requests still in flight are discarded. Observed entries are kept
    /// empty so their observers stay connected.
    pub fn clear(&self) {
        let generation = self.inner.next_generation();
        let mut entries = self.inner.entries();
        entries.retain(|_, entry| !entry.observers.is_empty());
        for entry in entries.values_mut() {
            entry.data = None;
            entry.error = None;
            entry.updated_at = None;
            entry.invalidated_at = None;
            entry.in_flight = None;
            entry.publish();
        }
        debug!(generation, kept = entries.len(), "cleared query cache");
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys = self.inner.entries().keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn join_or_start(self: &Arc<Self>, key: &QueryKey, entry: &mut Entry) -> SharedFetch {
        match &entry.in_flight {
            Some(in_flight) => {
                trace!(%key, "joining request in flight");
                in_flight.shared.clone()
            }
            None => self.start(key, entry),
        }
    }

    /// Starts the entry's fetch on its own task so the result lands in the cache even if every caller gives up.
    fn start(self: &Arc<Self>, key: &QueryKey, entry: &mut Entry) -> SharedFetch {
        let generation = self.next_generation();
        let shared = match entry.fetch.clone() {
            Some(fetch) => {
                let cache = Arc::downgrade(self);
                let key = key.clone();
                async move {
                    let result = fetch().await;
                    if let Some(cache) = cache.upgrade() {
                        cache.complete(&key, generation, &result);
                    }
                    result
                }
                .boxed()
                .shared()
            }
            None => futures::future::ready(Err(ClientError::Disabled)).boxed().shared(),
        };
        trace!(%key, generation, "starting request");
        entry.in_flight = Some(InFlight {
            generation,
            shared: shared.clone(),
        });
        entry.publish();
        tokio::spawn(shared.clone());
        shared
    }

    fn complete(self: &Arc<Self>, key: &QueryKey, generation: u64, result: &AnyResult) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            trace!(%key, "entry removed, dropping result");
            return;
        };
        if entry.in_flight.as_ref().map(|in_flight| in_flight.generation) != Some(generation) {
            trace!(%key, generation, "superseded, dropping result");
            return;
        }
        entry.in_flight = None;
        match result {
            Ok(data) => {
                entry.data = Some(data.clone());
                entry.error = None;
                entry.updated_at = Some(Instant::now());
            }
            Err(err) => {
                debug!(%key, "query failed: {err}");
                entry.error = Some(err.clone());
            }
        }

        match entry.invalidated_at {
            Some(invalidated) if invalidated < generation => entry.invalidated_at = None,
            Some(_) if entry.has_active_observers() => {
                trace!(%key, "invalidated while in flight, refetching");
                self.start(key, entry);
                return;
            }
            _ => {}
        }
        entry.publish();
    }

    /// Timer tick. Skipped while a request is in flight.
    fn refetch_in_background(self: &Arc<Self>, key: &QueryKey) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            if entry.in_flight.is_none() && entry.has_active_observers() {
                self.start(key, entry);
            }
        }
    }

    fn unobserve(self: &Arc<Self>, key: &QueryKey, id: u64) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.observers.remove(&id);
            self.reschedule_timer(key, entry);
            trace!(%key, remaining = entry.observers.len(), "observer dropped");
        }
    }

    /// Keeps exactly one timer per key running at the shortest interval its observers ask for.
    fn reschedule_timer(self: &Arc<Self>, key: &QueryKey, entry: &mut Entry) {
        let interval = entry
            .observers
            .values()
            .filter_map(|slot| slot.refetch_interval)
            .filter(|interval| !interval.is_zero())
            .min();
        match (interval, &entry.timer) {
            (Some(interval), Some(timer)) if timer.interval == interval => {}
            (Some(interval), _) => entry.timer = Some(self.spawn_timer(key.clone(), interval)),
            (None, _) => entry.timer = None,
        }
    }

    fn spawn_timer(self: &Arc<Self>, key: QueryKey, interval: Duration) -> RefetchTimer {
        let cancellation_token = CancellationToken::new();
        let guard = cancellation_token.clone().drop_guard();
        let cache: Weak<Inner> = Arc::downgrade(self);
        debug!(%key, ?interval, "starting refetch timer");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        trace!(%key, "refetch interval elapsed");
                        cache.refetch_in_background(&key);
                    }
                }
            }
            trace!(%key, "refetch timer stopped");
        });

        RefetchTimer {
            interval,
            _guard: guard,
        }
    }
}

fn erase<T>(query: &Query<T>) -> ErasedFetch
where
    T: Send + Sync + 'static,
{
    let fetch = query.fetch.clone();
    Arc::new(move || {
        let fut = fetch();
        async move { fut.await.map(|data| Arc::new(data) as AnyValue) }.boxed()
    })
}

fn downcast<T: Clone + 'static>(key: &QueryKey, data: AnyValue) -> ClientResult<T> {
    data.downcast_ref::<T>().cloned().ok_or_else(|| {
        error!(%key, "cached value has an unexpected type");
        ApiError::new(
            "An error occurred",
            format!("Cached value for {key} has an unexpected type"),
            500,
        )
        .into()
    })
}
