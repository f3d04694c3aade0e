use crate::{
    error::ClientResult,
    http::ApiClient,
    models::{
        Collector,
        CollectorPatch,
        CollectorStats,
        ComparisonData,
        CpuMetrics,
        DiskMetrics,
        MemoryMetrics,
        NetworkMetrics,
        Percentiles,
    },
    query_params::{
        hours_param,
        QueryParams,
    },
};
use perf_dashboard_config::TimeRange;
use serde::de::DeserializeOwned;

#[derive(Clone, Debug)]
pub struct CollectorsApi {
    client: ApiClient,
}

impl CollectorsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> ClientResult<Vec<Collector>> {
        self.client.get("/dashboard/api/collectors/").await
    }

    pub async fn get(&self, id: u64) -> ClientResult<Collector> {
        self.client.get(&format!("/dashboard/api/collectors/{id}/")).await
    }

    pub async fn cpu(&self, id: u64, range: TimeRange) -> ClientResult<CpuMetrics> {
        self.series(id, "cpu", range).await
    }

    pub async fn memory(&self, id: u64, range: TimeRange) -> ClientResult<MemoryMetrics> {
        self.series(id, "memory", range).await
    }

    pub async fn disk(&self, id: u64, range: TimeRange) -> ClientResult<DiskMetrics> {
        self.series(id, "disk", range).await
    }

    pub async fn network(&self, id: u64, range: TimeRange) -> ClientResult<NetworkMetrics> {
        self.series(id, "network", range).await
    }

    pub async fn stats(&self, id: u64, range: TimeRange) -> ClientResult<CollectorStats> {
        self.series(id, "stats", range).await
    }

    pub async fn percentiles(&self, id: u64, range: TimeRange) -> ClientResult<Percentiles> {
        self.series(id, "percentiles", range).await
    }

    pub async fn compare(&self, ids: &[u64], range: TimeRange) -> ClientResult<ComparisonData> {
        let params = QueryParams::new()
            .with("collectors", ids)
            .with("hours", range.hours());
        self.client.get(&format!("/dashboard/api/compare/{params}")).await
    }

    pub async fn create(&self, collector: &CollectorPatch) -> ClientResult<Collector> {
        self.client.post("/api/v1/collectors/", collector).await
    }

    pub async fn update(&self, id: u64, patch: &CollectorPatch) -> ClientResult<Collector> {
        self.client.patch(&format!("/api/v1/collectors/{id}/"), patch).await
    }

    pub async fn delete(&self, id: u64) -> ClientResult<()> {
        self.client.delete(&format!("/api/v1/collectors/{id}/")).await
    }

    async fn series<T: DeserializeOwned>(&self, id: u64, segment: &str, range: TimeRange) -> ClientResult<T> {
        let params = hours_param(range);
        self.client
            .get(&format!("/dashboard/api/collectors/{id}/{segment}/{params}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        navigation::Navigator,
        session::SessionStore,
        transport::{
            mock::MockTransport,
            Method,
        },
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn api(transport: &MockTransport) -> CollectorsApi {
        CollectorsApi::new(ApiClient::new(
            transport.clone(),
            SessionStore::in_memory(),
            Navigator::default(),
        ))
    }

    #[tokio::test]
    async fn builds_series_paths() {
        let transport = MockTransport::new();
        let empty = json!({ "timestamps": [], "devices": [] });
        transport
            .on_seq(Method::Get, "/dashboard/api/collectors/4/disk/?hours=168", vec![(200, empty.clone())])
            .on_seq(Method::Get, "/dashboard/api/collectors/4/disk/", vec![(200, empty)]);
        let api = api(&transport);

        api.disk(4, TimeRange::Week).await.unwrap();
        api.disk(4, TimeRange::All).await.unwrap();
        let paths = transport.requests().into_iter().map(|r| r.path).collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec!["/dashboard/api/collectors/4/disk/?hours=168", "/dashboard/api/collectors/4/disk/"]
        );
    }

    #[tokio::test]
    async fn compare_joins_ids() {
        let transport = MockTransport::new();
        transport.on_seq(
            Method::Get,
            "/dashboard/api/compare/?collectors=1%2C2%2C5&hours=6",
            vec![(200, json!({ "collectors": [], "metrics": {} }))],
        );
        let data = api(&transport).compare(&[1, 2, 5], TimeRange::SixHours).await.unwrap();
        assert!(data.collectors.is_empty());
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let transport = MockTransport::new();
        transport.on(Method::Delete, "/api/v1/collectors/9/", |_, _| {
            Ok(crate::transport::HttpResponse {
                status: 204,
                body: Vec::new(),
            })
        });
        api(&transport).delete(9).await.unwrap();
    }
}
