use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use perf_dashboard_client::models::{
    CloudProvider,
    CollectorPatch,
};
use perf_dashboard_config::{
    version,
    Args,
    MetricKind,
    PreferenceField,
    TimeRange,
};
use url::Url;

/// Command line client for the performance dashboard.
#[derive(Parser, Debug)]
#[command(author, version = version(), about, long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    pub config: Args,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(long, short)]
        username: String,
        #[arg(long, env = "PERFDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the session.
    Logout,
    /// Show the signed in user.
    Whoami,
    #[command(subcommand)]
    Password(PasswordCommand),
    #[command(subcommand)]
    Collectors(CollectorsCommand),
    /// Show one metric series or statistic of a collector.
    Metrics {
        #[arg(value_enum)]
        kind: SeriesKind,
        #[arg(long)]
        collector: u64,
        /// Time range, e.g. `1h`, `24h`, `7d` or `all`.
        #[arg(long)]
        range: Option<TimeRange>,
    },
    /// Compare two or more collectors side by side.
    Compare {
        #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
        collectors: Vec<u64>,
        #[arg(long)]
        range: Option<TimeRange>,
    },
    #[command(subcommand)]
    Containers(ContainersCommand),
    #[command(subcommand)]
    Prefs(PrefsCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Live dashboard that refreshes until interrupted.
    Watch {
        /// Dashboard location, e.g. `?collector=1&range=6h`.
        #[arg(long)]
        location: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PasswordCommand {
    /// Change the password of the signed in user.
    Change {
        #[arg(long, env = "PERFDASH_OLD_PASSWORD", hide_env_values = true)]
        old: String,
        #[arg(long, env = "PERFDASH_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
    /// Ask for a password reset mail.
    Reset {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CollectorsCommand {
    List,
    Show {
        id: u64,
    },
    Create {
        #[clap(flatten)]
        fields: CollectorFields,
    },
    Update {
        id: u64,
        #[clap(flatten)]
        fields: CollectorFields,
    },
    Delete {
        id: u64,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CollectorFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub hostname: Option<String>,
    #[arg(long)]
    pub ip_address: Option<String>,
    #[arg(long)]
    pub os_info: Option<String>,
    #[arg(long)]
    pub cloud_provider: Option<CloudProvider>,
    #[arg(long)]
    pub region: Option<String>,
    #[arg(long)]
    pub instance_type: Option<String>,
}

impl From<CollectorFields> for CollectorPatch {
    fn from(fields: CollectorFields) -> Self {
        CollectorPatch {
            name: fields.name,
            hostname: fields.hostname,
            ip_address: fields.ip_address,
            os_info: fields.os_info,
            cloud_provider: fields.cloud_provider,
            region: fields.region,
            instance_type: fields.instance_type,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Cpu,
    Memory,
    Disk,
    Network,
    Stats,
    Percentiles,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ContainersCommand {
    List {
        #[arg(long)]
        collector: u64,
    },
    Show {
        #[arg(long)]
        collector: u64,
        id: u64,
    },
    Metrics {
        #[arg(long)]
        collector: u64,
        id: u64,
        /// One of `cpu`, `memory` or `network`.
        #[arg(long, default_value = "cpu")]
        kind: MetricKind,
        #[arg(long)]
        range: Option<TimeRange>,
    },
    Aggregate {
        #[arg(long)]
        collector: u64,
        #[arg(long)]
        range: Option<TimeRange>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PrefsCommand {
    Show,
    /// Set one field, e.g. `chart-theme dark` or `visible-metrics cpu,memory`.
    Set {
        field: PreferenceField,
        value: String,
    },
    Reset,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    Show,
    SetApiUrl {
        url: Url,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_compare_ids() {
        let cli = Cli::try_parse_from(["perfdash", "compare", "--collectors", "1,2,5", "--range", "6h"]).unwrap();
        let Command::Compare { collectors, range } = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(collectors, vec![1, 2, 5]);
        assert_eq!(range, Some(TimeRange::SixHours));
    }

    #[test]
    fn global_connection_flags() {
        let cli = Cli::try_parse_from(["perfdash", "collectors", "list", "--api-url", "https://perf.example.com", "-v"])
            .unwrap();
        assert_eq!(cli.config.api_url.as_deref(), Some("https://perf.example.com"));
        assert!(cli.config.verbose);
    }

    #[test]
    fn rejects_unknown_ranges() {
        assert!(Cli::try_parse_from(["perfdash", "metrics", "cpu", "--collector", "1", "--range", "2w"]).is_err());
    }
}
