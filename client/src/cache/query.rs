use super::QueryKey;
use crate::error::{
    ClientError,
    ClientResult,
};
use futures::{
    future::BoxFuture,
    FutureExt as _,
};
use std::{
    future::Future,
    sync::Arc,
    time::Duration,
};
use strum::Display;
use tokio::time::Instant;

pub type QueryFn<T> = Arc<dyn Fn() -> BoxFuture<'static, ClientResult<T>> + Send + Sync>;

/// How to load one cached value and when it counts as outdated.
pub struct Query<T> {
    pub key: QueryKey,
    pub fetch: QueryFn<T>,
    /// Cached data younger than this is served without a request.
    pub stale_time: Duration,
    /// Refetch on a timer while the query is observed.
    pub refetch_interval: Option<Duration>,
    /// Disabled queries never hit the network.
    pub enabled: bool,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetch: self.fetch.clone(),
            stale_time: self.stale_time,
            refetch_interval: self.refetch_interval,
            enabled: self.enabled,
        }
    }
}

impl<T> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.key.to_string())
            .field("stale_time", &self.stale_time)
            .field("refetch_interval", &self.refetch_interval)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<T: Send + 'static> Query<T> {
    pub fn new<F, Fut>(key: QueryKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        Self {
            key,
            fetch: Arc::new(move || fetch().boxed()),
            stale_time: Duration::ZERO,
            refetch_interval: None,
            enabled: true,
        }
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// A zero interval means no periodic refetch.
    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval).filter(|interval| !interval.is_zero());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum QueryStatus {
    /// Nothing cached and nothing requested, e.g. a disabled query.
    Idle,
    /// First request in flight.
    Loading,
    Success,
    Error,
}

/// What an observer sees of a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<ClientError>,
    pub status: QueryStatus,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_fetching: false,
            updated_at: None,
        }
    }
}

impl<T> QueryState<T> {
    pub(super) fn new(data: Option<T>, error: Option<ClientError>, is_fetching: bool, updated_at: Option<Instant>) -> Self {
        let status = match (&data, &error) {
            (_, Some(_)) => QueryStatus::Error,
            (Some(_), None) => QueryStatus::Success,
            (None, None) if is_fetching => QueryStatus::Loading,
            (None, None) => QueryStatus::Idle,
        };
        Self {
            data,
            error,
            status,
            is_fetching,
            updated_at,
        }
    }

    /// No request in flight and either data or an error to show.
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && matches!(self.status, QueryStatus::Success | QueryStatus::Error)
    }

    pub fn result(&self) -> Option<Result<&T, &ClientError>> {
        match (&self.data, &self.error) {
            (_, Some(err)) => Some(Err(err)),
            (Some(data), None) => Some(Ok(data)),
            (None, None) => None,
        }
    }
}
