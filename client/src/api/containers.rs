use crate::{
    error::ClientResult,
    http::ApiClient,
    models::{
        Container,
        ContainerAggregate,
        ContainerMetrics,
    },
    query_params::hours_param,
};
use perf_dashboard_config::TimeRange;

#[derive(Clone, Debug)]
pub struct ContainersApi {
    client: ApiClient,
}

impl ContainersApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, collector_id: u64) -> ClientResult<Vec<Container>> {
        self.client
            .get(&format!("/dashboard/api/collectors/{collector_id}/containers/"))
            .await
    }

    pub async fn get(&self, collector_id: u64, container_id: u64) -> ClientResult<Container> {
        self.client
            .get(&format!("/dashboard/api/collectors/{collector_id}/containers/{container_id}/"))
            .await
    }

    pub async fn cpu(&self, collector_id: u64, container_id: u64, range: TimeRange) -> ClientResult<ContainerMetrics> {
        self.series(collector_id, container_id, "cpu", range).await
    }

    pub async fn memory(
        &self,
        collector_id: u64,
        container_id: u64,
        range: TimeRange,
    ) -> ClientResult<ContainerMetrics> {
        self.series(collector_id, container_id, "memory", range).await
    }

    pub async fn network(
        &self,
        collector_id: u64,
        container_id: u64,
        range: TimeRange,
    ) -> ClientResult<ContainerMetrics> {
        self.series(collector_id, container_id, "network", range).await
    }

    /// Totals over all containers of a collector.
    pub async fn aggregate(&self, collector_id: u64, range: TimeRange) -> ClientResult<ContainerAggregate> {
        let params = hours_param(range);
        self.client
            .get(&format!("/dashboard/api/collectors/{collector_id}/containers/aggregate/{params}"))
            .await
    }

    async fn series(
        &self,
        collector_id: u64,
        container_id: u64,
        segment: &str,
        range: TimeRange,
    ) -> ClientResult<ContainerMetrics> {
        let params = hours_param(range);
        self.client
            .get(&format!(
                "/dashboard/api/collectors/{collector_id}/containers/{container_id}/{segment}/{params}"
            ))
            .await
    }
}
