//! Client entry point.

use chord_cli::CliConfig;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    chord_cli::logging::init(&config.log_level)?;
    config.run().await
}
