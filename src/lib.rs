#[macro_use]
extern crate tracing;

mod app;
pub mod cli;
pub mod logging;
mod output;

pub use app::App;
pub use cli::{
    Cli,
    Command,
};
use color_eyre::Result;
use perf_dashboard_config::{
    Args,
    Config,
};

/// Installs the error report and panic hooks. Release builds write a crash report instead of a backtrace.
pub fn init_errors() -> Result<()> {
    color_eyre::install()?;
    #[cfg(not(debug_assertions))]
    {
        human_panic::setup_panic!();
    }
    #[cfg(debug_assertions)]
    {
        better_panic::Settings::auto()
            .most_recent_first(false)
            .lineno_suffix(true)
            .install();
    }
    Ok(())
}

/// Loads the layered configuration and persists connection overrides given on the command line.
pub fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::new(Args {
        verbose: args.verbose,
        ..Default::default()
    })?;
    config.update_from_args(args)?;
    Ok(config)
}
