//! The aggregation server: accept loop, bounded worker pool, background
//! sweeper, and the GET/PUT dispatch that ties the clock and store
//! together.

pub mod handlers;
pub mod state;

use crate::config::{
    ACCEPT_POLL_TIMEOUT, SWEEP_INTERVAL, WEATHER_PATH, WORKER_POOL_SIZE, WORKER_READ_TIMEOUT,
};
use crate::errors::AggregationResult;
use crate::http::{parse_request, HttpResponse};
use state::SharedState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, instrument, warn};

/// `Created -> Starting -> Running -> Stopping -> Stopped`, matching the
/// lifecycle a test harness drives the server through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycle {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// The aggregation server. Built once with [`AggregationServer::new`] and
/// driven with [`AggregationServer::run`]; `stop()` may be called from
/// another task or thread to request a graceful shutdown.
pub struct AggregationServer {
    bind_addr: SocketAddr,
    state: Arc<SharedState>,
    shutdown: Arc<AtomicBool>,
    ready_flag: Arc<AtomicBool>,
    ready: Arc<Notify>,
    lifecycle: std::sync::Mutex<ServerLifecycle>,
    bound_addr: std::sync::Mutex<Option<SocketAddr>>,
}

impl AggregationServer {
    pub fn new(bind_addr: SocketAddr, ttl: Duration, snapshot_path: PathBuf) -> Self {
        Self {
            bind_addr,
            state: Arc::new(SharedState::new(ttl, snapshot_path)),
            shutdown: Arc::new(AtomicBool::new(false)),
            ready_flag: Arc::new(AtomicBool::new(false)),
            ready: Arc::new(Notify::new()),
            lifecycle: std::sync::Mutex::new(ServerLifecycle::Created),
            bound_addr: std::sync::Mutex::new(None),
        }
    }

    /// The address the listener actually bound to; only set once `run()`
    /// has reached `Running`. Primarily useful in tests that bind to
    /// port 0 and need to discover the chosen port.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock().unwrap()
    }

    pub fn lifecycle(&self) -> ServerLifecycle {
        *self.lifecycle.lock().unwrap()
    }

    fn set_lifecycle(&self, value: ServerLifecycle) {
        *self.lifecycle.lock().unwrap() = value;
    }

    /// Request a graceful shutdown: the listener stops accepting new
    /// connections, in-flight workers are given a grace period to finish,
    /// and a final snapshot flush happens before `run` returns.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Wait until the listener is bound and the accept loop is running.
    ///
    /// Checked against the flag both before and after registering as a
    /// waiter: `Notify::notify_waiters` only wakes tasks already parked on
    /// `notified()`, so a caller that starts waiting after the signal has
    /// already fired would otherwise hang forever.
    pub async fn wait_until_ready(&self) {
        if self.ready_flag.load(Ordering::Acquire) {
            return;
        }
        let notified = self.ready.notified();
        if self.ready_flag.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    pub fn local_state(&self) -> Arc<SharedState> {
        self.state.clone()
    }

    /// Bind the listener, restore any prior snapshot, and run the accept
    /// loop plus background sweeper until `stop()` is called.
    #[instrument(skip(self))]
    pub async fn run(&self) -> AggregationResult<()> {
        self.set_lifecycle(ServerLifecycle::Starting);
        self.state.load_snapshot().await?;

        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("aggregation server listening on {local_addr}");
        *self.bound_addr.lock().unwrap() = Some(local_addr);

        self.set_lifecycle(ServerLifecycle::Running);
        self.ready_flag.store(true, Ordering::Release);
        self.ready.notify_waiters();

        let semaphore = Arc::new(Semaphore::new(WORKER_POOL_SIZE));
        let sweeper = tokio::spawn(run_sweeper(self.state.clone(), self.shutdown.clone()));

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match tokio::time::timeout(ACCEPT_POLL_TIMEOUT, listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = handle_connection(stream, &state).await {
                            debug!("connection from {peer} ended with error: {e}");
                        }
                    });
                }
                Ok(Err(e)) => {
                    warn!("accept() failed: {e}");
                }
                Err(_timeout) => {
                    // Just a polling interval for the shutdown flag.
                }
            }
        }

        self.set_lifecycle(ServerLifecycle::Stopping);
        info!("stopping: draining workers");
        // Bound the grace period so a stuck worker can't hang shutdown forever.
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            let _ = semaphore.acquire_many(WORKER_POOL_SIZE as u32).await;
        })
        .await;
        if drained.is_err() {
            warn!("shutdown grace period elapsed with workers still in flight");
        }

        sweeper.abort();
        self.state.flush().await?;
        self.set_lifecycle(ServerLifecycle::Stopped);
        info!("aggregation server stopped");
        Ok(())
    }
}

async fn run_sweeper(state: Arc<SharedState>, shutdown: Arc<AtomicBool>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        match state.sweep(SystemTime::now()).await {
            Ok(evicted) if !evicted.is_empty() => {
                info!(count = evicted.len(), "sweeper evicted expired stations");
            }
            Ok(_) => {}
            Err(e) => warn!("sweep failed: {e}"),
        }
    }
}

/// Parse one request off `stream`, dispatch it, write the response, then
/// close the connection — the server is one-request-per-connection, as
/// specified.
async fn handle_connection(stream: TcpStream, state: &SharedState) -> AggregationResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(read_half);

    let request = tokio::time::timeout(WORKER_READ_TIMEOUT, parse_request(&mut reader)).await;
    let request = match request {
        Ok(result) => result?,
        Err(_timeout) => {
            debug!("worker read timed out, dropping connection");
            return Ok(());
        }
    };

    let response: HttpResponse = if request.path == WEATHER_PATH && request.method == "GET" {
        handlers::handle_get(&request, state).await
    } else if request.path == WEATHER_PATH && request.method == "PUT" {
        handlers::handle_put(&request, state).await
    } else {
        handlers::handle_unroutable(state)
    };

    if let Err(e) = response.write_to(&mut write_half).await {
        error!("failed writing response: {e}");
    }

    Ok(())
}
