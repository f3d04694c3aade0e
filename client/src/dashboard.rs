use crate::{
    cache::QueryObserver,
    error::ClientResult,
    models::{
        Collector,
        Container,
        CpuMetrics,
        DiskMetrics,
        MemoryMetrics,
        NetworkMetrics,
    },
    queries::{
        CollectorQueries,
        ContainerQueries,
    },
    query_params::QueryParams,
};
use futures::future::{
    select_all,
    BoxFuture,
};
use perf_dashboard_config::{
    MetricKind,
    PreferencesStore,
    TimeRange,
};

/// Dashboard state carried in the URL query string: `?collector=<id>&range=<label>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardLocation {
    pub collector: Option<u64>,
    pub range: Option<TimeRange>,
}

impl DashboardLocation {
    /// Unknown range labels and malformed ids are ignored.
    pub fn parse(query: &str) -> Self {
        let params = QueryParams::decode(query);
        let collector = params.text("collector").and_then(|id| id.parse().ok());
        let range = params.text("range").and_then(|label| match label.parse() {
            Ok(range) => Some(range),
            Err(_) => {
                debug!(%label, "ignoring unknown time range");
                None
            }
        });
        Self { collector, range }
    }

    pub fn to_query_string(&self) -> String {
        QueryParams::new()
            .with("collector", self.collector)
            .with("range", self.range)
            .encode()
    }
}

impl std::fmt::Display for DashboardLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Observers behind the panels of the dashboard. Hidden panels are `None`.
#[derive(Debug)]
pub struct Panels {
    pub cpu: Option<QueryObserver<CpuMetrics>>,
    pub memory: Option<QueryObserver<MemoryMetrics>>,
    pub disk: Option<QueryObserver<DiskMetrics>>,
    pub network: Option<QueryObserver<NetworkMetrics>>,
    pub containers: Option<QueryObserver<Vec<Container>>>,
}

impl Panels {
    pub fn is_fetching(&self) -> bool {
        self.cpu.as_ref().is_some_and(|cpu| cpu.state().is_fetching)
            || self.memory.as_ref().is_some_and(|memory| memory.state().is_fetching)
            || self.disk.as_ref().is_some_and(|disk| disk.state().is_fetching)
            || self.network.as_ref().is_some_and(|network| network.state().is_fetching)
            || self
                .containers
                .as_ref()
                .is_some_and(|containers| containers.state().is_fetching)
    }

    /// Waits until any panel changes. `false` once every panel is gone or none is shown.
    pub async fn changed(&mut self) -> bool {
        let mut waits: Vec<BoxFuture<'_, bool>> = Vec::new();
        if let Some(cpu) = &mut self.cpu {
            waits.push(Box::pin(async move { cpu.changed().await.is_some() }));
        }
        if let Some(memory) = &mut self.memory {
            waits.push(Box::pin(async move { memory.changed().await.is_some() }));
        }
        if let Some(disk) = &mut self.disk {
            waits.push(Box::pin(async move { disk.changed().await.is_some() }));
        }
        if let Some(network) = &mut self.network {
            waits.push(Box::pin(async move { network.changed().await.is_some() }));
        }
        if let Some(containers) = &mut self.containers {
            waits.push(Box::pin(async move { containers.changed().await.is_some() }));
        }
        if waits.is_empty() {
            return false;
        }
        select_all(waits).await.0
    }
}

/// Selection and panel wiring of the dashboard page.
#[derive(Debug, Clone)]
pub struct Dashboard {
    collectors: CollectorQueries,
    containers: ContainerQueries,
    preferences: PreferencesStore,
    collector: Option<u64>,
    range: TimeRange,
}

impl Dashboard {
    /// The URL wins over the stored preferences.
    pub fn new(
        collectors: CollectorQueries,
        containers: ContainerQueries,
        preferences: PreferencesStore,
        location: DashboardLocation,
    ) -> Self {
        let prefs = preferences.get();
        Self {
            collector: location.collector.or(prefs.default_collector_id),
            range: location.range.unwrap_or(prefs.default_time_range),
            collectors,
            containers,
            preferences,
        }
    }

    pub fn collector(&self) -> Option<u64> {
        self.collector
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn location(&self) -> DashboardLocation {
        DashboardLocation {
            collector: self.collector,
            range: Some(self.range),
        }
    }

    /// Keeps the requested collector only while it still exists, otherwise falls back to the first one.
    pub async fn resolve_selection(&mut self) -> ClientResult<Option<u64>> {
        let collectors = self.collectors.list().await?;
        let requested = self.collector;
        self.collector = requested
            .filter(|id| collectors.iter().any(|collector| collector.id == *id))
            .or_else(|| collectors.first().map(|collector| collector.id));
        if self.collector != requested {
            debug!(?requested, collector = ?self.collector, "selected first collector");
        }
        Ok(self.collector)
    }

    /// Selects a collector and remembers it as the default for the next visit.
    pub fn select_collector(&mut self, id: u64) {
        self.collector = Some(id);
        if let Err(err) = self.preferences.set_default_collector(Some(id)) {
            warn!(id, "failed to remember the selected collector: {err}");
        }
    }

    pub fn observe_collectors(&self) -> QueryObserver<Vec<Collector>> {
        self.collectors.cache().observe(&self.collectors.list_query())
    }

    /// Panels of the selected collector. Metric queries stay disabled until a collector is selected.
    pub fn observe_panels(&self) -> Panels {
        let prefs = self.preferences.get();
        let cache = self.collectors.cache();
        let (id, range) = (self.collector, self.range);
        Panels {
            cpu: prefs
                .is_visible(MetricKind::Cpu)
                .then(|| cache.observe(&self.collectors.cpu_query(id, range))),
            memory: prefs
                .is_visible(MetricKind::Memory)
                .then(|| cache.observe(&self.collectors.memory_query(id, range))),
            disk: prefs
                .is_visible(MetricKind::Disk)
                .then(|| cache.observe(&self.collectors.disk_query(id, range))),
            network: prefs
                .is_visible(MetricKind::Network)
                .then(|| cache.observe(&self.collectors.network_query(id, range))),
            containers: prefs
                .show_containers
                .then(|| cache.observe(&self.containers.list_query(id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{
            CollectorsApi,
            ContainersApi,
        },
        cache::{
            QueryClient,
            QueryStatus,
        },
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
    use serde_json::json;

    fn dashboard(transport: &MockTransport, preferences: PreferencesStore, location: &str) -> Dashboard {
        let session = SessionStore::in_memory();
        session.login(tokens("a", "r"), user());
        let client = ApiClient::new(transport.clone(), session, Navigator::default());
        let cache = QueryClient::new();
        Dashboard::new(
            CollectorQueries::new(CollectorsApi::new(client.clone()), cache.clone()),
            ContainerQueries::new(ContainersApi::new(client), cache),
            preferences,
            DashboardLocation::parse(location),
        )
    }

    #[test]
    fn location_round_trips_through_the_query_string() {
        let location = DashboardLocation::parse("?collector=3&range=6h");
        assert_eq!(
            location,
            DashboardLocation {
                collector: Some(3),
                range: Some(TimeRange::SixHours),
            }
        );
        assert_eq!(location.to_query_string(), "?collector=3&range=6h");
        assert_eq!(DashboardLocation::default().to_query_string(), "");
    }

    #[test]
    fn unknown_range_is_ignored() {
        assert_eq!(
            DashboardLocation::parse("collector=abc&range=2w"),
            DashboardLocation::default()
        );
    }

    #[tokio::test]
    async fn url_wins_over_preferences() {
        let preferences = PreferencesStore::in_memory();
        preferences.set_default_collector(Some(9)).unwrap();
        preferences.set_default_time_range(TimeRange::Week).unwrap();
        let transport = MockTransport::new();

        let from_url = dashboard(&transport, preferences.clone(), "?collector=2&range=1h");
        assert_eq!((from_url.collector(), from_url.range()), (Some(2), TimeRange::OneHour));

        let from_prefs = dashboard(&transport, preferences, "");
        assert_eq!((from_prefs.collector(), from_prefs.range()), (Some(9), TimeRange::Week));
        assert_eq!(from_prefs.location().to_query_string(), "?collector=9&range=7d");
    }

    fn serve_collectors(transport: &MockTransport, ids: &[u64]) {
        let collectors = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "name": format!("web-{id}"),
                    "hostname": format!("web-{id}.internal"),
                    "ip_address": format!("10.0.0.{id}"),
                    "status": "online",
                    "last_seen": null,
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z"
                })
            })
            .collect::<Vec<_>>();
        transport.on_seq(Method::Get, "/dashboard/api/collectors/", vec![(200, json!(collectors))]);
    }

    #[tokio::test]
    async fn falls_back_to_the_first_collector() {
        let transport = MockTransport::new();
        serve_collectors(&transport, &[5]);
        let mut dashboard = dashboard(&transport, PreferencesStore::in_memory(), "");
        assert_eq!(dashboard.collector(), None);
        assert_eq!(dashboard.resolve_selection().await.unwrap(), Some(5));
        assert_eq!(dashboard.location().collector, Some(5));
    }

    #[tokio::test]
    async fn removed_collectors_are_not_selected() {
        let preferences = PreferencesStore::in_memory();
        preferences.set_default_collector(Some(99)).unwrap();
        let transport = MockTransport::new();
        serve_collectors(&transport, &[5, 7]);

        let mut from_prefs = dashboard(&transport, preferences.clone(), "");
        assert_eq!(from_prefs.resolve_selection().await.unwrap(), Some(5));
        assert_eq!(transport.count(Method::Get, "/dashboard/api/collectors/"), 1);

        let mut from_url = dashboard(&transport, preferences, "?collector=7");
        assert_eq!(from_url.resolve_selection().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn nothing_is_selected_without_collectors() {
        let transport = MockTransport::new();
        serve_collectors(&transport, &[]);
        let mut dashboard = dashboard(&transport, PreferencesStore::in_memory(), "?collector=3");
        assert_eq!(dashboard.resolve_selection().await.unwrap(), None);
    }

    #[tokio::test]
    async fn selecting_a_collector_remembers_it() {
        let preferences = PreferencesStore::in_memory();
        let mut dashboard = dashboard(&MockTransport::new(), preferences.clone(), "");
        dashboard.select_collector(4);
        assert_eq!(preferences.get().default_collector_id, Some(4));
        assert_eq!(dashboard.location().collector, Some(4));
    }

    #[tokio::test]
    async fn panels_wait_for_a_selection() {
        let transport = MockTransport::new();
        let dashboard = dashboard(&transport, PreferencesStore::in_memory(), "");

        let panels = dashboard.observe_panels();
        let cpu = panels.cpu.as_ref().unwrap();
        assert_eq!(cpu.state().status, QueryStatus::Idle);
        tokio::task::yield_now().await;
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn hidden_panels_are_not_observed() {
        let preferences = PreferencesStore::in_memory();
        preferences
            .set_visible_metrics(vec![MetricKind::Cpu, MetricKind::Network])
            .unwrap();
        preferences.set_show_containers(false).unwrap();
        let transport = MockTransport::new();
        transport.on_seq(
            Method::Get,
            "/dashboard/api/collectors/1/cpu/?hours=24",
            vec![(200, json!({ "timestamps": [], "user": [], "system": [], "idle": [], "iowait": [] }))],
        );
        let dashboard = dashboard(&transport, preferences, "?collector=1");

        let mut panels = dashboard.observe_panels();
        assert!(panels.memory.is_none() && panels.disk.is_none() && panels.containers.is_none());
        let state = panels.cpu.as_mut().unwrap().settled().await;
        assert_eq!(state.status, QueryStatus::Success);
        assert!(panels.network.is_some());
    }
}
