mod cli;

use clap::Parser;
use cli::{Cli, Commands, ServerArgs};
use herald::config::Config;
use herald::{api, observability};

fn load_config(args: &ServerArgs) -> Result<Config, herald::config::ConfigError> {
    match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::dotenv();
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Downloads(args) => {
            let config = load_config(&args)?;
            api::run_downloads(config, args.address).await?
        }
        Commands::Events(args) => {
            let config = load_config(&args)?;
            api::run_events(config, args.address).await?
        }
    }

    Ok(())
}
