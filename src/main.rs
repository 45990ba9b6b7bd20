use clap::Parser;
use tracing_subscriber::EnvFilter;

use dredd_kill_driver::cli::Cli;
use dredd_kill_driver::driver::{self, Config};

/// Single-threaded on purpose: the oracle must never race two children
/// over the shared scratch filenames.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.default_log_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from(cli);
    driver::run(config).await?;
    Ok(())
}
