use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use httplog::cli::Cli;
use httplog::logging;
use httplog::orchestrator::Monitor;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "httplog starting");

    let monitor = Monitor::open(config).await?;
    monitor.run().await
}
