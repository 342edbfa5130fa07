//! State shared by every connection-handling worker and the sweeper.

use crate::clock::LamportClock;
use crate::config::MAX_STATIONS;
use crate::errors::AggregationResult;
use crate::persistence;
use crate::store::ObservationStore;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::debug;

/// Everything mutated by request handlers, held behind one coarse lock on
/// the store. The clock is independently lock-free (see [`LamportClock`]);
/// serializing it through the same mutex isn't required for correctness
/// since `observe`/`tick` already commute safely under concurrency.
pub struct SharedState {
    pub clock: LamportClock,
    store: Mutex<ObservationStore>,
    snapshot_path: PathBuf,
}

impl SharedState {
    pub fn new(ttl: Duration, snapshot_path: PathBuf) -> Self {
        Self {
            clock: LamportClock::new(),
            store: Mutex::new(ObservationStore::new(MAX_STATIONS, ttl)),
            snapshot_path,
        }
    }

    /// Load a prior snapshot from disk, if one exists, repopulating the
    /// store before the server starts accepting connections.
    pub async fn load_snapshot(&self) -> AggregationResult<()> {
        if let Some(snapshot) = persistence::load_snapshot(&self.snapshot_path)? {
            let mut store = self.store.lock().await;
            let count = snapshot.len();
            store.restore(snapshot);
            debug!(stations = count, "restored store from snapshot");
        }
        Ok(())
    }

    pub async fn with_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ObservationStore) -> R,
    {
        let mut store = self.store.lock().await;
        f(&mut store)
    }

    /// Flush the current store contents to disk. Called after every
    /// accepted mutation, before the response goes out, so a client that
    /// sees success can assume durability.
    pub async fn flush(&self) -> AggregationResult<()> {
        let store = self.store.lock().await;
        persistence::save_snapshot(&self.snapshot_path, &store.snapshot())?;
        Ok(())
    }

    /// Run the TTL sweep, flushing to disk if anything was evicted.
    pub async fn sweep(&self, now: SystemTime) -> AggregationResult<Vec<String>> {
        let evicted = {
            let mut store = self.store.lock().await;
            store.expire(now)
        };
        if !evicted.is_empty() {
            self.flush().await?;
        }
        Ok(evicted)
    }
}
