use crate::{
    ChartTheme,
    MetricKind,
    TimeRange,
};
use eyre::{
    eyre,
    Context as _,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    sync::Arc,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
};
use tokio::sync::watch;

const PREFERENCES_FILE: &str = "preferences.yaml";

/// Display settings of the dashboard. Persisted as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub default_time_range: TimeRange,
    pub default_collector_id: Option<u64>,
    pub chart_theme: ChartTheme,
    pub refresh_interval_seconds: u32,
    pub show_containers: bool,
    pub visible_metrics: Vec<MetricKind>,
    pub sidebar_collapsed: bool,
    pub compact_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_time_range: TimeRange::Day,
            default_collector_id: None,
            chart_theme: ChartTheme::Light,
            refresh_interval_seconds: 60,
            show_containers: true,
            visible_metrics: vec![MetricKind::Cpu, MetricKind::Memory, MetricKind::Disk, MetricKind::Network],
            sidebar_collapsed: false,
            compact_mode: false,
        }
    }
}

impl Preferences {
    pub fn is_visible(&self, metric: MetricKind) -> bool {
        self.visible_metrics.contains(&metric)
    }
}

/// Field names accepted by [`PreferencesStore::set_field`].
#[derive(Debug, Clone, Copy, Display, EnumIter, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum PreferenceField {
    DefaultTimeRange,
    DefaultCollector,
    ChartTheme,
    RefreshInterval,
    ShowContainers,
    VisibleMetrics,
    SidebarCollapsed,
    CompactMode,
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Owns the current [`Preferences`] and writes them back to disk after every change.
#[derive(Clone, Debug)]
pub struct PreferencesStore {
    file: Option<PathBuf>,
    state: Arc<watch::Sender<Preferences>>,
}

impl PreferencesStore {
    /// Loads the preferences from `file`, falling back to the defaults when the file is missing or unreadable.
    pub fn load(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let preferences = read_preferences(&file).unwrap_or_default();
        let (state, _) = watch::channel(preferences);
        Self {
            file: Some(file),
            state: Arc::new(state),
        }
    }

    pub fn load_from_config_dir(config_dir: impl AsRef<Path>) -> Self {
        Self::load(config_dir.as_ref().join(PREFERENCES_FILE))
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        let (state, _) = watch::channel(Preferences::default());
        Self {
            file: None,
            state: Arc::new(state),
        }
    }

    pub fn get(&self) -> Preferences {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.state.subscribe()
    }

    pub fn set_default_time_range(&self, range: TimeRange) -> Result<()> {
        self.update(|prefs| prefs.default_time_range = range)
    }

    pub fn set_default_collector(&self, id: Option<u64>) -> Result<()> {
        self.update(|prefs| prefs.default_collector_id = id)
    }

    pub fn set_chart_theme(&self, theme: ChartTheme) -> Result<()> {
        self.update(|prefs| prefs.chart_theme = theme)
    }

    pub fn set_refresh_interval(&self, seconds: u32) -> Result<()> {
        self.update(|prefs| prefs.refresh_interval_seconds = seconds)
    }

    pub fn set_show_containers(&self, show: bool) -> Result<()> {
        self.update(|prefs| prefs.show_containers = show)
    }

    pub fn set_visible_metrics(&self, metrics: Vec<MetricKind>) -> Result<()> {
        self.update(|prefs| prefs.visible_metrics = metrics)
    }

    pub fn toggle_sidebar(&self) -> Result<()> {
        self.update(|prefs| prefs.sidebar_collapsed = !prefs.sidebar_collapsed)
    }

    pub fn set_compact_mode(&self, compact: bool) -> Result<()> {
        self.update(|prefs| prefs.compact_mode = compact)
    }

    /// Replaces every field with the baseline in one step.
    pub fn reset_to_defaults(&self) -> Result<()> {
        self.state.send_replace(Preferences::default());
        debug!("preferences reset to defaults");
        self.flush()
    }

    /// Parses `value` for `field` and stores it.
    pub fn set_field(&self, field: PreferenceField, value: &str) -> Result<()> {
        let value = value.trim();
        match field {
            PreferenceField::DefaultTimeRange => self.set_default_time_range(parse(value)?),
            PreferenceField::DefaultCollector => {
                let id = match value {
                    "" | "none" => None,
                    id => Some(parse(id)?),
                };
                self.set_default_collector(id)
            }
            PreferenceField::ChartTheme => self.set_chart_theme(parse(value)?),
            PreferenceField::RefreshInterval => self.set_refresh_interval(parse(value)?),
            PreferenceField::ShowContainers => self.set_show_containers(parse(value)?),
            PreferenceField::VisibleMetrics => {
                let metrics = value
                    .split(',')
                    .map(str::trim)
                    .filter(|metric| !metric.is_empty())
                    .map(parse)
                    .collect::<Result<Vec<MetricKind>>>()?;
                self.set_visible_metrics(metrics)
            }
            PreferenceField::SidebarCollapsed => {
                let collapsed: bool = parse(value)?;
                self.update(|prefs| prefs.sidebar_collapsed = collapsed)
            }
            PreferenceField::CompactMode => self.set_compact_mode(parse(value)?),
        }
    }

    fn update(&self, modify: impl FnOnce(&mut Preferences)) -> Result<()> {
        self.state.send_modify(modify);
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        if let Some(dir) = file.parent() {
            std::fs::create_dir_all(dir).context("Failed to create preferences directory")?;
        }
        let content = serde_yml::to_string(&*self.state.borrow()).context("Failed to serialize preferences")?;
        std::fs::write(file, content).wrap_err_with(|| format!("Failed to write preferences to {file:?}"))?;
        trace!(?file, "saved preferences");
        Ok(())
    }
}

fn read_preferences(file: &Path) -> Option<Preferences> {
    if !file.exists() {
        debug!(?file, "no stored preferences");
        return None;
    }
    let content = std::fs::read_to_string(file)
        .inspect_err(|err| warn!(?file, "failed to read preferences: {err}"))
        .ok()?;
    serde_yml::from_str(&content)
        .inspect_err(|err| warn!(?file, "ignoring malformed preferences: {err}"))
        .ok()
}

fn parse<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err| eyre!("invalid value {value:?}: {err}"))
}
