//! Aggregation server CLI entry point.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use weather_aggregation::config::{DEFAULT_PORT, SNAPSHOT_FILE_NAME, TTL};
use weather_aggregation::AggregationServer;

#[derive(Parser, Debug)]
#[command(name = "server", about = "Weather aggregation server", version)]
struct Args {
    /// Port to listen on.
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    let args = Args::parse();
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let snapshot_path = PathBuf::from(SNAPSHOT_FILE_NAME);

    let server = Arc::new(AggregationServer::new(addr, TTL, snapshot_path));

    let shutdown_trigger = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, stopping server");
            shutdown_trigger.stop();
        }
    });

    server.run().await?;
    Ok(())
}
