//! Cache keys, freshness policies and mutations for every resource.

use crate::{
    api::{
        CollectorsApi,
        ContainersApi,
    },
    cache::{
        Query,
        QueryClient,
        QueryKey,
    },
    error::{
        ClientError,
        ClientResult,
    },
    models::{
        Collector,
        CollectorPatch,
        CollectorStats,
        ComparisonData,
        Container,
        ContainerAggregate,
        ContainerMetrics,
        CpuMetrics,
        DiskMetrics,
        MemoryMetrics,
        NetworkMetrics,
        Percentiles,
    },
    query_key,
};
use perf_dashboard_config::{
    MetricKind,
    TimeRange,
};
use std::{
    future::Future,
    time::Duration,
};

const LIST_STALE_TIME: Duration = Duration::from_secs(30);
const LIST_REFETCH_INTERVAL: Duration = Duration::from_secs(60);
const DETAIL_STALE_TIME: Duration = Duration::from_secs(30);
const SERIES_STALE_TIME: Duration = Duration::from_secs(60);
const SERIES_REFETCH_INTERVAL: Duration = Duration::from_secs(60);
pub(crate) const USER_STALE_TIME: Duration = Duration::from_secs(5 * 60);

pub mod collector_keys {
    use super::*;

    pub fn all() -> QueryKey {
        query_key!["collectors"]
    }

    pub fn lists() -> QueryKey {
        all().with("list")
    }

    pub fn list() -> QueryKey {
        lists()
    }

    pub fn details() -> QueryKey {
        all().with("detail")
    }

    pub fn detail(id: Option<u64>) -> QueryKey {
        details().with(id)
    }

    pub fn metrics(id: Option<u64>) -> QueryKey {
        detail(id).with("metrics")
    }

    pub fn metric(id: Option<u64>, kind: MetricKind, range: TimeRange) -> QueryKey {
        metrics(id).with(kind.path_segment()).with(range)
    }

    pub fn cpu(id: Option<u64>, range: TimeRange) -> QueryKey {
        metric(id, MetricKind::Cpu, range)
    }

    pub fn memory(id: Option<u64>, range: TimeRange) -> QueryKey {
        metric(id, MetricKind::Memory, range)
    }

    pub fn disk(id: Option<u64>, range: TimeRange) -> QueryKey {
        metric(id, MetricKind::Disk, range)
    }

    pub fn network(id: Option<u64>, range: TimeRange) -> QueryKey {
        metric(id, MetricKind::Network, range)
    }

    pub fn stats(id: Option<u64>, range: TimeRange) -> QueryKey {
        metrics(id).with("stats").with(range)
    }

    pub fn percentiles(id: Option<u64>, range: TimeRange) -> QueryKey {
        metrics(id).with("percentiles").with(range)
    }

    pub fn compare(ids: &[u64], range: TimeRange) -> QueryKey {
        all().with("compare").with(ids).with(range)
    }
}

pub mod container_keys {
    use super::*;

    pub fn all() -> QueryKey {
        query_key!["containers"]
    }

    pub fn lists() -> QueryKey {
        all().with("list")
    }

    pub fn list(collector_id: Option<u64>) -> QueryKey {
        lists().with(collector_id)
    }

    pub fn detail(collector_id: Option<u64>, container_id: Option<u64>) -> QueryKey {
        all().with("detail").with(collector_id).with(container_id)
    }

    pub fn metric(
        collector_id: Option<u64>,
        container_id: Option<u64>,
        kind: MetricKind,
        range: TimeRange,
    ) -> QueryKey {
        detail(collector_id, container_id)
            .with("metrics")
            .with(kind.path_segment())
            .with(range)
    }

    pub fn aggregate(collector_id: Option<u64>, range: TimeRange) -> QueryKey {
        all().with("aggregate").with(collector_id).with(range)
    }
}

pub mod auth_keys {
    use super::*;

    pub fn user() -> QueryKey {
        query_key!["auth", "user"]
    }
}

/// A query that is disabled until `id` is known.
fn targeted<T, A, F, Fut>(key: QueryKey, api: A, id: Option<u64>, fetch: F) -> Query<T>
where
    T: Send + 'static,
    A: Clone + Send + Sync + 'static,
    F: Fn(A, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ClientResult<T>> + Send + 'static,
{
    Query::new(key, move || {
        let request = id.map(|id| fetch(api.clone(), id));
        async move {
            match request {
                Some(request) => request.await,
                None => Err(ClientError::Disabled),
            }
        }
    })
    .enabled(id.is_some())
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Cached collector reads and the mutations that invalidate them.
#[derive(Clone, Debug)]
pub struct CollectorQueries {
    api: CollectorsApi,
    cache: QueryClient,
}

impl CollectorQueries {
    pub fn new(api: CollectorsApi, cache: QueryClient) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &QueryClient {
        &self.cache
    }

    pub fn list_query(&self) -> Query<Vec<Collector>> {
        let api = self.api.clone();
        Query::new(collector_keys::list(), move || {
            let api = api.clone();
            async move { api.list().await }
        })
        .stale_time(LIST_STALE_TIME)
        .refetch_interval(LIST_REFETCH_INTERVAL)
    }

    pub fn detail_query(&self, id: Option<u64>) -> Query<Collector> {
        targeted(collector_keys::detail(id), self.api.clone(), id, |api, id| async move {
            api.get(id).await
        })
        .stale_time(DETAIL_STALE_TIME)
    }

    pub fn cpu_query(&self, id: Option<u64>, range: TimeRange) -> Query<CpuMetrics> {
        targeted(collector_keys::cpu(id, range), self.api.clone(), id, move |api, id| async move {
            api.cpu(id, range).await
        })
        .stale_time(SERIES_STALE_TIME)
        .refetch_interval(SERIES_REFETCH_INTERVAL)
    }

    pub fn memory_query(&self, id: Option<u64>, range: TimeRange) -> Query<MemoryMetrics> {
        targeted(collector_keys::memory(id, range), self.api.clone(), id, move |api, id| async move {
            api.memory(id, range).await
        })
        .stale_time(SERIES_STALE_TIME)
        .refetch_interval(SERIES_REFETCH_INTERVAL)
    }

    pub fn disk_query(&self, id: Option<u64>, range: TimeRange) -> Query<DiskMetrics> {
        targeted(collector_keys::disk(id, range), self.api.clone(), id, move |api, id| async move {
            api.disk(id, range).await
        })
        .stale_time(SERIES_STALE_TIME)
        .refetch_interval(SERIES_REFETCH_INTERVAL)
    }

    pub fn network_query(&self, id: Option<u64>, range: TimeRange) -> Query<NetworkMetrics> {
        targeted(collector_keys::network(id, range), self.api.clone(), id, move |api, id| async move {
            api.network(id, range).await
        })
        .stale_time(SERIES_STALE_TIME)
        .refetch_interval(SERIES_REFETCH_INTERVAL)
    }

    pub fn stats_query(&self, id: Option<u64>, range: TimeRange) -> Query<CollectorStats> {
        targeted(collector_keys::stats(id, range), self.api.clone(), id, move |api, id| async move {
            api.stats(id, range).await
        })
        .stale_time(SERIES_STALE_TIME)
    }

    pub fn percentiles_query(&self, id: Option<u64>, range: TimeRange) -> Query<Percentiles> {
        targeted(collector_keys::percentiles(id, range), self.api.clone(), id, move |api, id| async move {
            api.percentiles(id, range).await
        })
        .stale_time(SERIES_STALE_TIME)
    }

    /// Disabled unless at least two collectors are given.
    pub fn compare_query(&self, ids: &[u64], range: TimeRange) -> Query<ComparisonData> {
        let api = self.api.clone();
        let ids_owned = ids.to_vec();
        Query::new(collector_keys::compare(ids, range), move || {
            let api = api.clone();
            let ids = ids_owned.clone();
            async move { api.compare(&ids, range).await }
        })
        .enabled(ids.len() >= 2)
        .stale_time(SERIES_STALE_TIME)
    }

    pub async fn list(&self) -> ClientResult<Vec<Collector>> {
        self.cache.fetch(&self.list_query()).await
    }

    pub async fn get(&self, id: u64) -> ClientResult<Collector> {
        self.cache.fetch(&self.detail_query(Some(id))).await
    }

    pub async fn create(&self, collector: &CollectorPatch) -> ClientResult<Collector> {
        let created = self.api.create(collector).await?;
        info!(id = created.id, name = %created.name, "created collector");
        self.cache.invalidate(&collector_keys::lists());
        Ok(created)
    }

    pub async fn update(&self, id: u64, patch: &CollectorPatch) -> ClientResult<Collector> {
        let updated = self.api.update(id, patch).await?;
        info!(id, "updated collector");
        self.cache.invalidate(&collector_keys::detail(Some(id)));
        self.cache.invalidate(&collector_keys::lists());
        Ok(updated)
    }

    pub async fn delete(&self, id: u64) -> ClientResult<()> {
        self.api.delete(id).await?;
        info!(id, "deleted collector");
        self.cache.invalidate(&collector_keys::lists());
        Ok(())
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Clone, Debug)]
pub struct ContainerQueries {
    api: ContainersApi,
    cache: QueryClient,
}

impl ContainerQueries {
    pub fn new(api: ContainersApi, cache: QueryClient) -> Self {
        Self { api, cache }
    }

    pub fn list_query(&self, collector_id: Option<u64>) -> Query<Vec<Container>> {
        targeted(
            container_keys::list(collector_id),
            self.api.clone(),
            collector_id,
            |api, collector_id| async move { api.list(collector_id).await },
        )
        .stale_time(LIST_STALE_TIME)
        .refetch_interval(LIST_REFETCH_INTERVAL)
    }

    pub fn detail_query(&self, collector_id: Option<u64>, container_id: Option<u64>) -> Query<Container> {
        let target = collector_id.zip(container_id);
        let api = self.api.clone();
        Query::new(container_keys::detail(collector_id, container_id), move || {
            let api = api.clone();
            async move {
                let (collector_id, container_id) = target.ok_or(ClientError::Disabled)?;
                api.get(collector_id, container_id).await
            }
        })
        .enabled(target.is_some())
        .stale_time(DETAIL_STALE_TIME)
    }

    /// Container series exist for cpu, memory and network.
    pub fn metrics_query(
        &self,
        collector_id: Option<u64>,
        container_id: Option<u64>,
        kind: MetricKind,
        range: TimeRange,
    ) -> Query<ContainerMetrics> {
        let target = collector_id.zip(container_id).filter(|_| kind != MetricKind::Disk);
        let api = self.api.clone();
        Query::new(container_keys::metric(collector_id, container_id, kind, range), move || {
            let api = api.clone();
            async move {
                let (collector_id, container_id) = target.ok_or(ClientError::Disabled)?;
                match kind {
                    MetricKind::Cpu => api.cpu(collector_id, container_id, range).await,
                    MetricKind::Memory => api.memory(collector_id, container_id, range).await,
                    MetricKind::Network => api.network(collector_id, container_id, range).await,
                    MetricKind::Disk => Err(ClientError::Disabled),
                }
            }
        })
        .enabled(target.is_some())
        .stale_time(SERIES_STALE_TIME)
        .refetch_interval(SERIES_REFETCH_INTERVAL)
    }

    pub fn aggregate_query(&self, collector_id: Option<u64>, range: TimeRange) -> Query<ContainerAggregate> {
        targeted(
            container_keys::aggregate(collector_id, range),
            self.api.clone(),
            collector_id,
            move |api, collector_id| async move { api.aggregate(collector_id, range).await },
        )
        .stale_time(SERIES_STALE_TIME)
        .refetch_interval(SERIES_REFETCH_INTERVAL)
    }

    pub async fn list(&self, collector_id: u64) -> ClientResult<Vec<Container>> {
        self.cache.fetch(&self.list_query(Some(collector_id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::ApiClient,
        navigation::Navigator,
        session::{
            tests::{
                tokens,
                user,
            },
            SessionStore,
        },
        transport::{
            mock::MockTransport,
            Method,
        },
    };
    use pretty_assertions::assert_eq;
    use serde_json::{
        json,
        Value,
    };

    fn collector(id: u64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "hostname": format!("{name}.internal"),
            "ip_address": "10.0.0.1",
            "status": "online",
            "last_seen": "2024-05-01T10:00:00Z",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        })
    }

    fn queries(transport: &MockTransport) -> CollectorQueries {
        let session = SessionStore::in_memory();
        session.login(tokens("a", "r"), user());
        let client = ApiClient::new(transport.clone(), session, Navigator::default());
        CollectorQueries::new(CollectorsApi::new(client), QueryClient::new())
    }

    #[test]
    fn keys_nest_under_their_collector() {
        assert_eq!(
            collector_keys::cpu(Some(3), TimeRange::Day).to_string(),
            r#"["collectors","detail",3,"metrics","cpu","24h"]"#
        );
        assert!(collector_keys::stats(Some(3), TimeRange::Day).starts_with(&collector_keys::detail(Some(3))));
        assert!(collector_keys::list().starts_with(&collector_keys::lists()));
        assert!(!collector_keys::compare(&[1, 2], TimeRange::Day).starts_with(&collector_keys::details()));
        assert_eq!(
            container_keys::metric(Some(1), Some(7), MetricKind::Memory, TimeRange::OneHour).to_string(),
            r#"["containers","detail",1,7,"metrics","memory","1h"]"#
        );
    }

    #[test]
    fn policies_follow_the_resource() {
        let transport = MockTransport::new();
        let queries = queries(&transport);

        let list = queries.list_query();
        assert_eq!(list.stale_time, Duration::from_secs(30));
        assert_eq!(list.refetch_interval, Some(Duration::from_secs(60)));

        let cpu = queries.cpu_query(Some(1), TimeRange::Day);
        assert_eq!((cpu.stale_time, cpu.refetch_interval), (Duration::from_secs(60), Some(Duration::from_secs(60))));
        assert!(cpu.enabled);

        let stats = queries.stats_query(Some(1), TimeRange::Day);
        assert_eq!((stats.stale_time, stats.refetch_interval), (Duration::from_secs(60), None));

        assert!(!queries.memory_query(None, TimeRange::Day).enabled);
        assert!(!queries.detail_query(None).enabled);
        assert!(!queries.compare_query(&[1], TimeRange::Day).enabled);
        assert!(queries.compare_query(&[1, 2], TimeRange::Day).enabled);
    }

    #[tokio::test]
    async fn concurrent_reads_of_one_key_make_one_request() {
        let transport = MockTransport::new().with_delay(Duration::from_millis(20));
        transport.on_seq(
            Method::Get,
            "/dashboard/api/collectors/1/cpu/?hours=24",
            vec![(200, json!({ "timestamps": [], "user": [], "system": [], "idle": [], "iowait": [] }))],
        );
        let queries = queries(&transport);
        let cache = queries.cache().clone();

        let a = queries.cpu_query(Some(1), TimeRange::Day);
        let b = queries.cpu_query(Some(1), TimeRange::Day);
        let (a, b) = tokio::join!(cache.fetch(&a), cache.fetch(&b));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/1/cpu/?hours=24"), 1);
    }

    #[tokio::test]
    async fn disabled_metrics_never_request() {
        let transport = MockTransport::new();
        let queries = queries(&transport);
        let cache = queries.cache().clone();

        assert_eq!(
            cache.fetch(&queries.network_query(None, TimeRange::Day)).await,
            Err(ClientError::Disabled)
        );
        assert_eq!(
            cache.fetch(&queries.compare_query(&[4], TimeRange::Day)).await,
            Err(ClientError::Disabled)
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn update_invalidates_detail_and_list() {
        let transport = MockTransport::new();
        transport
            .on_seq(Method::Get, "/dashboard/api/collectors/", vec![(200, json!([collector(1, "web-1")]))])
            .on_seq(Method::Get, "/dashboard/api/collectors/1/", vec![(200, collector(1, "web-1"))])
            .on_seq(Method::Get, "/dashboard/api/collectors/2/", vec![(200, collector(2, "db-1"))])
            .on_seq(Method::Patch, "/api/v1/collectors/1/", vec![(200, collector(1, "web-renamed"))]);
        let queries = queries(&transport);

        queries.list().await.unwrap();
        queries.get(1).await.unwrap();
        queries.get(2).await.unwrap();
        queries.list().await.unwrap();
        queries.get(1).await.unwrap();
        assert_eq!(transport.requests().len(), 3);

        let patch = CollectorPatch {
            name: Some("web-renamed".into()),
            ..Default::default()
        };
        let updated = queries.update(1, &patch).await.unwrap();
        assert_eq!(updated.name, "web-renamed");

        queries.list().await.unwrap();
        queries.get(1).await.unwrap();
        queries.get(2).await.unwrap();
        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/"), 2);
        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/1/"), 2);
        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/2/"), 1);
    }

    #[tokio::test]
    async fn create_and_delete_invalidate_the_list_only() {
        let transport = MockTransport::new();
        transport
            .on_seq(Method::Get, "/dashboard/api/collectors/", vec![(200, json!([]))])
            .on_seq(Method::Get, "/dashboard/api/collectors/5/", vec![(200, collector(5, "new"))])
            .on_seq(Method::Post, "/api/v1/collectors/", vec![(201, collector(5, "new"))])
            .on_seq(Method::Delete, "/api/v1/collectors/5/", vec![(204, Value::Null)]);
        let queries = queries(&transport);

        queries.list().await.unwrap();
        queries.get(5).await.unwrap();
        queries
            .create(&CollectorPatch {
                name: Some("new".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        queries.list().await.unwrap();
        queries.delete(5).await.unwrap();
        queries.list().await.unwrap();
        queries.get(5).await.unwrap();

        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/"), 3);
        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/5/"), 1);
    }

    #[tokio::test]
    async fn failed_mutations_keep_the_cache() {
        let transport = MockTransport::new();
        transport
            .on_seq(Method::Get, "/dashboard/api/collectors/", vec![(200, json!([]))])
            .on_seq(
                Method::Post,
                "/api/v1/collectors/",
                vec![(400, json!({ "error": "validation_error", "message": "hostname is required" }))],
            );
        let queries = queries(&transport);

        queries.list().await.unwrap();
        let err = queries.create(&CollectorPatch::default()).await.unwrap_err();
        assert_eq!(err.api_error().map(|err| err.message.as_str()), Some("hostname is required"));
        queries.list().await.unwrap();
        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/"), 1);
    }
}
