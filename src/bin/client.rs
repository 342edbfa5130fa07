//! Query client CLI entry point.

use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};
use weather_aggregation::client::QueryClient;
use weather_aggregation::errors::AggregationError;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let client = match QueryClient::from_args(&args) {
        Ok(c) => c,
        Err(AggregationError::Usage(msg)) => {
            eprintln!("usage: client <server-url> [station-id]");
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("failed to start client: {e}");
            return ExitCode::FAILURE;
        }
    };

    match client.run().await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("request failed: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
