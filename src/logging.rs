use eyre::{
    Context as _,
    Result,
};
use std::{
    fs::OpenOptions,
    path::Path,
    sync::Arc,
};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

const LOG_FILE: &str = "perfdash.log";

const CRATES: [&str; 3] = ["perf_dashboard", "perf_dashboard_client", "perf_dashboard_config"];

/// `RUST_LOG` wins. Otherwise warnings only, or debug output of our crates when `verbose` is set.
fn stderr_filter(verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if verbose { "debug" } else { "warn" };
    let directives = std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|krate| format!("{krate}={level}")))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

fn file_filter() -> EnvFilter {
    let directives = std::iter::once("info".to_string())
        .chain(CRATES.iter().map(|krate| format!("{krate}=debug")))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

pub fn log_init(data_dir: &Path, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(data_dir).context("Failed to create directory")?;
    let log_path = data_dir.join(LOG_FILE);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .wrap_err_with(|| format!("Failed to open log file {log_path:?}"))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_filter(stderr_filter(verbose)),
        )
        .with(
            fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false)
                .with_filter(file_filter()),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("Failed to initialize tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_debug_for_our_crates() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let verbose = stderr_filter(true).to_string();
        for krate in CRATES {
            assert!(verbose.contains(&format!("{krate}=debug")), "{verbose}");
        }
        let quiet = stderr_filter(false).to_string();
        assert!(!quiet.contains("debug"), "{quiet}");
    }
}
