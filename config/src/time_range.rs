use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
};

/// Symbolic look-back window for metric series.
#[derive(
    Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum TimeRange {
    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    OneHour,
    #[strum(serialize = "6h")]
    #[serde(rename = "6h")]
    SixHours,
    #[default]
    #[strum(serialize = "24h")]
    #[serde(rename = "24h")]
    Day,
    #[strum(serialize = "7d")]
    #[serde(rename = "7d")]
    Week,
    #[strum(serialize = "30d")]
    #[serde(rename = "30d")]
    Month,
    #[strum(serialize = "all")]
    #[serde(rename = "all")]
    All,
    #[strum(serialize = "custom")]
    #[serde(rename = "custom")]
    Custom,
}

impl TimeRange {
    /// Hour count sent as the `hours` query parameter. `None` means unbounded.
    pub fn hours(&self) -> Option<u32> {
        match self {
            TimeRange::OneHour => Some(1),
            TimeRange::SixHours => Some(6),
            TimeRange::Day => Some(24),
            TimeRange::Week => Some(168),
            TimeRange::Month => Some(720),
            TimeRange::All | TimeRange::Custom => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "Last hour",
            TimeRange::SixHours => "Last 6 hours",
            TimeRange::Day => "Last 24 hours",
            TimeRange::Week => "Last 7 days",
            TimeRange::Month => "Last 30 days",
            TimeRange::All => "All time",
            TimeRange::Custom => "Custom",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChartTheme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl MetricKind {
    /// Path segment of the per-metric series endpoint.
    pub fn path_segment(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Disk => "disk",
            MetricKind::Network => "network",
        }
    }
}
