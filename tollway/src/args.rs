use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Tollway LLM reverse proxy
#[derive(Debug, Parser)]
#[command(
    name = "tollway",
    about = "Failover reverse proxy for OpenAI-style deployments with usage chargeback"
)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tollway.toml", env = "TOLLWAY_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "TOLLWAY_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Load routes from this JSON document instead of the configured source
    #[arg(long, env = "TOLLWAY_ROUTES")]
    pub routes: Option<PathBuf>,

    /// Log filter directive
    #[arg(long, default_value = "info", env = "TOLLWAY_LOG")]
    pub log: String,
}
