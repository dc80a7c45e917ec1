use clap::Parser;
use color_eyre::Result;

use quire::cli::{self, Cli};
use quire::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse();

  // Load configuration, letting --api-url stand in for a config file
  let config = Config::resolve(cli.config.as_deref(), cli.api_url.as_deref())?;
  let _guard = quire::logging::init(&config.log)?;

  cli::run(cli, config).await
}
