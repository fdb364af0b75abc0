//! burrow: the private-side tunnel client.
//!
//! Run this next to a local service to forward allowed requests from a
//! burrow-relay to it.

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use burrow::config::ClientConfig;
use burrow::tunnel;

#[derive(Parser)]
#[command(name = "burrow")]
#[command(version)]
#[command(about = "Reverse HTTP tunnel client", long_about = None)]
struct Cli {
    /// Relay WebSocket URL (defaults to $TUN_SERVER)
    #[arg(long)]
    server: Option<String>,

    /// Local service base URL (defaults to $TUN_LOCAL)
    #[arg(long)]
    local: Option<String>,

    /// Allow list as METHOD /path pairs (defaults to $TUN_ALLOW)
    #[arg(long)]
    allow: Option<String>,

    /// Shared bearer secret (defaults to $TUN_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Env file to seed TUN_* variables from
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    if let Err(e) = burrow_shared::env::load(&cli.env_file) {
        warn!("env: {e}");
    }

    // Flags override whatever the environment provided.
    for (key, value) in [
        ("TUN_SERVER", &cli.server),
        ("TUN_LOCAL", &cli.local),
        ("TUN_ALLOW", &cli.allow),
        ("TUN_TOKEN", &cli.token),
    ] {
        if let Some(value) = value {
            std::env::set_var(key, value);
        }
    }

    let config = ClientConfig::from_env()?;
    tunnel::run(config).await
}
