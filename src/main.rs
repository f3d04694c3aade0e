use clap::Parser;
use color_eyre::Result;
use perf_dashboard::{
    init_errors,
    load_config,
    logging,
    App,
    Cli,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::log_init(config.data_dir(), config.verbose)?;

    App::new(config)?.run(cli.command).await
}
