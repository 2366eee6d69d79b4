use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Serialized batch downloads and platform event broadcast", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the downloads service
    Downloads(ServerArgs),
    /// Run the platform events service
    Events(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind to, overriding the configured one
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file (defaults to $HERALD_CONFIG or config/herald.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
