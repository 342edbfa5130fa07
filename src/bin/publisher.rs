//! Content publisher CLI entry point.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};
use weather_aggregation::errors::AggregationError;
use weather_aggregation::publisher::ContentPublisher;

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
    let publisher = match ContentPublisher::from_args(&args) {
        Ok(p) => p,
        Err(AggregationError::Usage(msg)) => {
            eprintln!("usage: publisher <server-url> <file-path>");
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("failed to start publisher: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_trigger.store(true, Ordering::SeqCst);
        }
    });

    publisher.run_periodic(shutdown).await;
    ExitCode::SUCCESS
}
