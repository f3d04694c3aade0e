use chrono::{
    DateTime,
    Utc,
};
use comfy_table::{
    presets,
    Attribute,
    Cell,
    Color,
    ContentArrangement,
    Table,
};
use perf_dashboard_client::{
    cache::{
        QueryObserver,
        QueryState,
        QueryStatus,
    },
    models::{
        last_value,
        Collector,
        CollectorStats,
        CollectorStatus,
        ComparisonData,
        Container,
        ContainerAggregate,
        ContainerMetrics,
        CpuMetrics,
        DiskMetrics,
        MemoryMetrics,
        NetworkMetrics,
        Percentiles,
        StatSummary,
        User,
    },
    DashboardLocation,
    Panels,
};
use perf_dashboard_config::{
    Config,
    Preferences,
};

fn table<'a>(header: impl IntoIterator<Item = &'a str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|title| Cell::new(title).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn key_value(title: &str, rows: impl IntoIterator<Item = (&'static str, String)>) -> Table {
    let mut table = table([title, ""]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    table
}

pub fn format_bytes(bytes: f64) -> String {
    if bytes >= 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1}GB", bytes / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024.0 * 1024.0 {
        format!("{:.1}MB", bytes / (1024.0 * 1024.0))
    } else if bytes >= 1024.0 {
        format!("{:.1}KB", bytes / 1024.0)
    } else {
        format!("{bytes:.0}B")
    }
}

fn percent(value: Option<f64>) -> String {
    value.map(|value| format!("{value:.1}%")).unwrap_or_else(|| "-".to_string())
}

fn bytes(value: Option<f64>) -> String {
    value.map(format_bytes).unwrap_or_else(|| "-".to_string())
}

fn number(value: Option<f64>) -> String {
    value.map(|value| format!("{value:.1}")).unwrap_or_else(|| "-".to_string())
}

fn timestamp(time: Option<&DateTime<Utc>>) -> String {
    time.map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn status_cell(status: CollectorStatus) -> Cell {
    let color = match status {
        CollectorStatus::Online => Color::Green,
        CollectorStatus::Offline => Color::Red,
        CollectorStatus::Unknown => Color::Yellow,
    };
    Cell::new(status).fg(color)
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

pub fn user_table(user: &User) -> Table {
    key_value(
        "USER",
        [
            ("Name", user.display_name()),
            ("Username", user.username.clone()),
            ("Email", user.email.clone()),
            ("Id", user.id.to_string()),
        ],
    )
}

pub fn collectors_table(collectors: &[Collector]) -> Table {
    let mut table = table(["Id", "Name", "Hostname", "IP", "Status", "Last seen"]);
    for collector in collectors {
        table.add_row(vec![
            Cell::new(collector.id),
            Cell::new(&collector.name).add_attribute(Attribute::Bold),
            Cell::new(&collector.hostname),
            Cell::new(&collector.ip_address),
            status_cell(collector.status),
            Cell::new(timestamp(collector.last_seen.as_ref())),
        ]);
    }
    table
}

pub fn collector_table(collector: &Collector) -> Table {
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    key_value(
        "COLLECTOR",
        [
            ("Id", collector.id.to_string()),
            ("Name", collector.name.clone()),
            ("Hostname", collector.hostname.clone()),
            ("IP address", collector.ip_address.clone()),
            ("Status", collector.status.to_string()),
            ("Last seen", timestamp(collector.last_seen.as_ref())),
            ("OS", optional(&collector.os_info)),
            ("CPU", optional(&collector.cpu_model)),
            ("CPU count", collector.cpu_count.map(|count| count.to_string()).unwrap_or_else(|| "-".to_string())),
            ("Memory", collector.memory_total_gb.map(|gb| format!("{gb:.1}GB")).unwrap_or_else(|| "-".to_string())),
            (
                "Cloud",
                collector
                    .cloud_provider
                    .map(|provider| provider.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("Region", optional(&collector.region)),
            ("Instance type", optional(&collector.instance_type)),
        ],
    )
}

pub fn cpu_table(cpu: &CpuMetrics) -> Table {
    key_value(
        "CPU",
        [
            ("User", percent(last_value(&cpu.user))),
            ("System", percent(last_value(&cpu.system))),
            ("I/O wait", percent(last_value(&cpu.iowait))),
            ("Idle", percent(last_value(&cpu.idle))),
            ("Samples", cpu.timestamps.len().to_string()),
        ],
    )
}

pub fn memory_table(memory: &MemoryMetrics) -> Table {
    let gb = |value: Option<f64>| value.map(|value| format!("{value:.2}GB")).unwrap_or_else(|| "-".to_string());
    key_value(
        "MEMORY",
        [
            ("Used", percent(last_value(&memory.percent_used))),
            ("Used (GB)", gb(last_value(&memory.used))),
            ("Available (GB)", gb(last_value(&memory.available))),
            ("Cached (GB)", gb(last_value(&memory.cached))),
            ("Total", format!("{:.1}GB", memory.total_gb)),
            ("Samples", memory.timestamps.len().to_string()),
        ],
    )
}

pub fn disk_table(disk: &DiskMetrics) -> Table {
    let mut table = table(["Device", "Read", "Write", "Read ops", "Write ops"]);
    for device in &disk.devices {
        table.add_row(vec![
            Cell::new(&device.name).add_attribute(Attribute::Bold),
            Cell::new(bytes(last_value(&device.read_bytes))),
            Cell::new(bytes(last_value(&device.write_bytes))),
            Cell::new(number(last_value(&device.read_ops))),
            Cell::new(number(last_value(&device.write_ops))),
        ]);
    }
    table
}

pub fn network_table(network: &NetworkMetrics) -> Table {
    let mut table = table(["Interface", "Received", "Sent", "Packets in", "Packets out"]);
    for interface in &network.interfaces {
        table.add_row(vec![
            Cell::new(&interface.name).add_attribute(Attribute::Bold),
            Cell::new(bytes(last_value(&interface.rx_bytes))),
            Cell::new(bytes(last_value(&interface.tx_bytes))),
            Cell::new(number(last_value(&interface.rx_packets))),
            Cell::new(number(last_value(&interface.tx_packets))),
        ]);
    }
    table
}

fn summary_row(table: &mut Table, name: String, summary: &StatSummary) {
    table.add_row(vec![
        Cell::new(name).add_attribute(Attribute::Bold),
        Cell::new(format!("{:.1}", summary.current)),
        Cell::new(format!("{:.1}", summary.avg)),
        Cell::new(format!("{:.1}", summary.min)),
        Cell::new(format!("{:.1}", summary.max)),
        Cell::new(format!("{:.1}", summary.p95)),
        Cell::new(format!("{:.1}", summary.p99)),
    ]);
}

pub fn stats_table(stats: &CollectorStats) -> Table {
    let mut table = table(["Series", "Current", "Avg", "Min", "Max", "p95", "p99"]);
    summary_row(&mut table, "cpu user".into(), &stats.cpu.user);
    summary_row(&mut table, "cpu system".into(), &stats.cpu.system);
    summary_row(&mut table, "cpu iowait".into(), &stats.cpu.iowait);
    summary_row(&mut table, "memory used %".into(), &stats.memory.percent_used);
    for (device, disk) in &stats.disk {
        summary_row(&mut table, format!("{device} read ops"), &disk.read_ops);
        summary_row(&mut table, format!("{device} write ops"), &disk.write_ops);
    }
    for (interface, net) in &stats.network {
        summary_row(&mut table, format!("{interface} rx"), &net.rx_bytes);
        summary_row(&mut table, format!("{interface} tx"), &net.tx_bytes);
    }
    table
}

pub fn percentiles_table(percentiles: &Percentiles) -> Table {
    let columns = percentiles
        .values()
        .flat_map(|values| values.keys().cloned())
        .collect::<std::collections::BTreeSet<_>>();
    let mut table = table(std::iter::once("Series").chain(columns.iter().map(String::as_str)));
    for (series, values) in percentiles {
        let mut row = vec![Cell::new(series).add_attribute(Attribute::Bold)];
        row.extend(columns.iter().map(|column| Cell::new(number(values.get(column).copied()))));
        table.add_row(row);
    }
    table
}

pub fn comparison_table(data: &ComparisonData) -> Table {
    let mut table = table(["Collector", "CPU user", "CPU system", "Memory used", "Avg CPU user", "p95 CPU user"]);
    for collector in &data.collectors {
        let cpu = data.metrics.cpu.get(&collector.id);
        let memory = data.metrics.memory.get(&collector.id);
        let stats = data.stats.get(&collector.id);
        table.add_row(vec![
            Cell::new(format!("{} ({})", collector.name, collector.id)).add_attribute(Attribute::Bold),
            Cell::new(percent(cpu.and_then(|cpu| last_value(&cpu.user)))),
            Cell::new(percent(cpu.and_then(|cpu| last_value(&cpu.system)))),
            Cell::new(percent(memory.and_then(|memory| last_value(&memory.percent_used)))),
            Cell::new(percent(stats.map(|stats| stats.cpu.user.avg))),
            Cell::new(percent(stats.map(|stats| stats.cpu.user.p95))),
        ]);
    }
    table
}

pub fn containers_table(containers: &[Container]) -> Table {
    let mut table = table(["Id", "Name", "Image", "Status", "CPU", "Memory", "Received", "Sent"]);
    for container in containers {
        table.add_row(vec![
            Cell::new(container.id),
            Cell::new(&container.name).add_attribute(Attribute::Bold),
            Cell::new(&container.image),
            Cell::new(container.status),
            Cell::new(percent(Some(container.cpu_percent))),
            Cell::new(format!("{:.0}MB", container.memory_usage_mb)),
            Cell::new(format_bytes(container.network_rx_bytes)),
            Cell::new(format_bytes(container.network_tx_bytes)),
        ]);
    }
    table
}

pub fn container_table(container: &Container) -> Table {
    key_value(
        "CONTAINER",
        [
            ("Id", container.id.to_string()),
            ("Container id", container.container_id.clone()),
            ("Name", container.name.clone()),
            ("Image", container.image.clone()),
            ("Status", container.status.to_string()),
            ("Collector", container.collector_id.to_string()),
            ("CPU", percent(Some(container.cpu_percent))),
            ("Memory", format!("{:.0}MB ({:.1}%)", container.memory_usage_mb, container.memory_percent)),
            ("Created", timestamp(Some(&container.created_at))),
        ],
    )
}

pub fn container_metrics_table(metrics: &ContainerMetrics) -> Table {
    key_value(
        "CONTAINER METRICS",
        [
            ("CPU", percent(last_value(&metrics.cpu_percent))),
            ("Memory", percent(last_value(&metrics.memory_percent))),
            ("Memory (MB)", number(last_value(&metrics.memory_usage_mb))),
            ("Received", bytes(last_value(&metrics.network_rx_bytes))),
            ("Sent", bytes(last_value(&metrics.network_tx_bytes))),
            ("Samples", metrics.timestamps.len().to_string()),
        ],
    )
}

pub fn aggregate_table(aggregate: &ContainerAggregate) -> Table {
    key_value(
        "CONTAINERS",
        [
            (
                "Running",
                format!("{} of {}", aggregate.running_containers, aggregate.total_containers),
            ),
            ("Total CPU", percent(last_value(&aggregate.total_cpu_percent))),
            ("Total memory (MB)", number(last_value(&aggregate.total_memory_mb))),
        ],
    )
}

pub fn preferences_table(preferences: &Preferences) -> Table {
    let metrics = preferences
        .visible_metrics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    key_value(
        "PREFERENCES",
        [
            ("default-time-range", preferences.default_time_range.to_string()),
            (
                "default-collector",
                preferences
                    .default_collector_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            ),
            ("chart-theme", preferences.chart_theme.to_string()),
            ("refresh-interval", format!("{}s", preferences.refresh_interval_seconds)),
            ("show-containers", preferences.show_containers.to_string()),
            ("visible-metrics", metrics),
            ("sidebar-collapsed", preferences.sidebar_collapsed.to_string()),
            ("compact-mode", preferences.compact_mode.to_string()),
        ],
    )
}

pub fn config_table(config: &Config) -> Table {
    key_value(
        "CONFIG",
        [
            ("api_url", config.api_url.to_string()),
            ("request_timeout_secs", config.request_timeout_secs.to_string()),
            ("config_dir", config.config_dir().display().to_string()),
            ("data_dir", config.data_dir().display().to_string()),
        ],
    )
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

fn panel_row<T: Clone>(
    table: &mut Table,
    name: &str,
    observer: Option<&QueryObserver<T>>,
    summarize: impl Fn(&T) -> String,
) {
    let Some(observer) = observer else {
        return;
    };
    let state: QueryState<T> = observer.state();
    let (status, color) = match state.status {
        QueryStatus::Idle => ("idle", Color::DarkGrey),
        QueryStatus::Loading => ("loading", Color::Yellow),
        QueryStatus::Success if state.is_fetching => ("refreshing", Color::Cyan),
        QueryStatus::Success => ("ok", Color::Green),
        QueryStatus::Error => ("error", Color::Red),
    };
    let detail = match (&state.data, &state.error) {
        (_, Some(err)) => err.to_string(),
        (Some(data), None) => summarize(data),
        (None, None) => String::new(),
    };
    table.add_row(vec![
        Cell::new(name).add_attribute(Attribute::Bold),
        Cell::new(status).fg(color),
        Cell::new(detail),
    ]);
}

/// One line per visible panel of the live dashboard.
pub fn panels_table(location: &DashboardLocation, panels: &Panels) -> Table {
    let title = format!("DASHBOARD {}", location.to_query_string());
    let mut table = table([title.as_str(), "Status", "Latest"]);
    panel_row(&mut table, "cpu", panels.cpu.as_ref(), |cpu| {
        format!(
            "user {} system {}",
            percent(last_value(&cpu.user)),
            percent(last_value(&cpu.system))
        )
    });
    panel_row(&mut table, "memory", panels.memory.as_ref(), |memory| {
        format!("used {} of {:.1}GB", percent(last_value(&memory.percent_used)), memory.total_gb)
    });
    panel_row(&mut table, "disk", panels.disk.as_ref(), |disk| {
        let read = disk.devices.iter().filter_map(|device| last_value(&device.read_bytes)).sum::<f64>();
        let write = disk.devices.iter().filter_map(|device| last_value(&device.write_bytes)).sum::<f64>();
        format!("read {} write {}", format_bytes(read), format_bytes(write))
    });
    panel_row(&mut table, "network", panels.network.as_ref(), |network| {
        let rx = network.interfaces.iter().filter_map(|interface| last_value(&interface.rx_bytes)).sum::<f64>();
        let tx = network.interfaces.iter().filter_map(|interface| last_value(&interface.tx_bytes)).sum::<f64>();
        format!("in {} out {}", format_bytes(rx), format_bytes(tx))
    });
    panel_row(&mut table, "containers", panels.containers.as_ref(), |containers| {
        let running = containers
            .iter()
            .filter(|container| container.status == perf_dashboard_client::models::ContainerStatus::Running)
            .count();
        format!("{running} of {} running", containers.len())
    });
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_bytes_with_binary_units() {
        assert_eq!(format_bytes(512.0), "512B");
        assert_eq!(format_bytes(2048.0), "2.0KB");
        assert_eq!(format_bytes(5.5 * 1024.0 * 1024.0), "5.5MB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0 * 1024.0), "3.0GB");
    }

    #[test]
    fn cpu_summary_shows_the_latest_sample() {
        let cpu = CpuMetrics {
            user: vec![10.0, 12.5],
            system: vec![3.0, 4.3],
            ..Default::default()
        };
        let rendered = cpu_table(&cpu).to_string();
        assert!(rendered.contains("12.5%"));
        assert!(rendered.contains("4.3%"));
        assert!(rendered.contains("I/O wait"));
    }

    #[test]
    fn percentiles_share_one_column_per_level() {
        let percentiles: Percentiles = serde_json::from_value(serde_json::json!({
            "cpu_user": { "p50": 3.0, "p99": 9.0 },
            "memory": { "p50": 40.0 }
        }))
        .unwrap();
        let rendered = percentiles_table(&percentiles).to_string();
        assert!(rendered.contains("p50") && rendered.contains("p99"));
        assert!(rendered.contains("40.0"));
        assert!(rendered.contains('-'));
    }

    #[test]
    fn preferences_use_cli_field_names() {
        let rendered = preferences_table(&Preferences::default()).to_string();
        for field in ["default-time-range", "chart-theme", "visible-metrics"] {
            assert!(rendered.contains(field), "missing {field}");
        }
        assert!(rendered.contains("cpu,memory,disk,network"));
    }
}
