//! Read models returned by the dashboard API.

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use strum::{
    Display,
    EnumString,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => format!("{first} {last}"),
            (Some(first), _) if !first.is_empty() => first.to_string(),
            _ => self.username.clone(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens").finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Body of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(flatten)]
    pub(crate) tokens: AuthTokens,
    pub(crate) user: User,
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Debug, Clone, Copy, Default, Display, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CollectorStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Display, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CloudProvider {
    Azure,
    Oci,
    Aws,
    Gcp,
    OnPremise,
}

/// A monitored host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collector {
    pub id: u64,
    pub name: String,
    pub hostname: String,
    pub ip_address: String,
    #[serde(default)]
    pub status: CollectorStatus,
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub os_info: Option<String>,
    #[serde(default)]
    pub cpu_model: Option<String>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub memory_total_gb: Option<f64>,
    #[serde(default)]
    pub cloud_provider: Option<CloudProvider>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial collector used for create and update. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectorPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<CloudProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
}

impl CollectorPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub timestamps: Vec<DateTime<Utc>>,
    pub user: Vec<f64>,
    pub system: Vec<f64>,
    pub idle: Vec<f64>,
    pub iowait: Vec<f64>,
    #[serde(default)]
    pub steal: Option<Vec<f64>>,
    #[serde(default)]
    pub irq: Option<Vec<f64>>,
    #[serde(default)]
    pub softirq: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub timestamps: Vec<DateTime<Utc>>,
    pub used: Vec<f64>,
    pub available: Vec<f64>,
    pub cached: Vec<f64>,
    pub buffers: Vec<f64>,
    pub percent_used: Vec<f64>,
    pub total_gb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskDevice {
    pub name: String,
    pub read_bytes: Vec<f64>,
    pub write_bytes: Vec<f64>,
    pub read_ops: Vec<f64>,
    pub write_ops: Vec<f64>,
    #[serde(default)]
    pub utilization: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub timestamps: Vec<DateTime<Utc>>,
    pub devices: Vec<DiskDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub rx_bytes: Vec<f64>,
    pub tx_bytes: Vec<f64>,
    pub rx_packets: Vec<f64>,
    pub tx_packets: Vec<f64>,
    #[serde(default)]
    pub utilization: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub timestamps: Vec<DateTime<Utc>>,
    pub interfaces: Vec<NetworkInterface>,
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Descriptive statistics and percentiles of one series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stddev: f64,
    pub current: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p97_5: f64,
    pub p99: f64,
    pub p100: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub user: StatSummary,
    pub system: StatSummary,
    pub iowait: StatSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub percent_used: StatSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskDeviceStats {
    pub read_ops: StatSummary,
    pub write_ops: StatSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub rx_bytes: StatSummary,
    pub tx_bytes: StatSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorStats {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    #[serde(default)]
    pub disk: BTreeMap<String, DiskDeviceStats>,
    #[serde(default)]
    pub network: BTreeMap<String, InterfaceStats>,
}

/// Percentiles per metric, e.g. `{"cpu_user": {"p50": 3.1, ...}}`.
pub type Percentiles = BTreeMap<String, BTreeMap<String, f64>>;

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Debug, Clone, Copy, Display, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopped,
    Paused,
    Exited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: u64,
    pub container_id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    pub collector_id: u64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_usage_mb: f64,
    pub network_rx_bytes: f64,
    pub network_tx_bytes: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub timestamps: Vec<DateTime<Utc>>,
    pub cpu_percent: Vec<f64>,
    pub memory_percent: Vec<f64>,
    pub memory_usage_mb: Vec<f64>,
    pub network_rx_bytes: Vec<f64>,
    pub network_tx_bytes: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerAggregate {
    pub total_containers: u32,
    pub running_containers: u32,
    pub total_cpu_percent: Vec<f64>,
    pub total_memory_mb: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    #[serde(default)]
    pub cpu: BTreeMap<u64, CpuMetrics>,
    #[serde(default)]
    pub memory: BTreeMap<u64, MemoryMetrics>,
}

/// Metrics and statistics of several collectors side by side, keyed by collector id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonData {
    pub collectors: Vec<Collector>,
    pub metrics: ComparisonMetrics,
    #[serde(default)]
    pub stats: BTreeMap<u64, CollectorStats>,
}

/// Latest value of a series, if any.
pub fn last_value(series: &[f64]) -> Option<f64> {
    series.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_collector() {
        let collector: Collector = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "db-1",
            "hostname": "db-1.internal",
            "ip_address": "10.0.0.3",
            "status": "online",
            "last_seen": "2024-05-01T10:00:00Z",
            "cloud_provider": "on-premise",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(collector.status, CollectorStatus::Online);
        assert_eq!(collector.cloud_provider, Some(CloudProvider::OnPremise));
        assert_eq!(collector.cpu_count, None);
    }

    #[test]
    fn comparison_keys_are_collector_ids() {
        let data: ComparisonData = serde_json::from_value(serde_json::json!({
            "collectors": [],
            "metrics": {
                "cpu": { "1": { "timestamps": [], "user": [], "system": [], "idle": [], "iowait": [] } },
                "memory": {}
            },
            "stats": {}
        }))
        .unwrap();
        assert!(data.metrics.cpu.contains_key(&1));
    }

    #[test]
    fn patch_only_sends_set_fields() {
        let patch = CollectorPatch {
            name: Some("web-2".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), serde_json::json!({ "name": "web-2" }));
        assert!(CollectorPatch::default().is_empty());
    }
}
