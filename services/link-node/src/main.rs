//! `link-node`: the binary wiring a [`link_transport::LinkServer`] and its
//! configured channels into a running process.
//!
//! CLI parsing, TOML config loading, and tracing initialization are the
//! only concerns here — everything else is delegated to `link_node::start`
//! and the library crates it composes.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "link-node", version, about = "Bidirectional ordered message bridge node")]
struct Cli {
    /// Path to the node's TOML configuration file.
    #[arg(long, default_value = "/etc/link/node.toml")]
    config: PathBuf,

    /// Overrides the `RUST_LOG` default of `info`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = cli
        .log_level
        .clone()
        .map(tracing_subscriber::EnvFilter::new)
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "link-node starting");

    let config = match link_node::config::load_config_from_path(&cli.config) {
        Ok(config) => {
            info!(
                id = %config.id,
                host = %config.host,
                channels = config.channels.len(),
                "config loaded"
            );
            config
        }
        Err(error) => {
            eprintln!("FATAL: failed to load config: {error}");
            std::process::exit(1);
        }
    };

    let (server, served) = match link_node::start(&config).await {
        Ok(started) => started,
        Err(error) => {
            eprintln!("FATAL: failed to start link server: {error}");
            std::process::exit(1);
        }
    };

    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
    server.shutdown();
    let _ = served.await;
}
