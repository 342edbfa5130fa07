//! Tunables shared by the server, publisher, and client.
//!
//! All of these mirror the fixed constants of the weather aggregation
//! protocol; CLI flags on the individual binaries may override the ones
//! that are legitimately per-deployment (port, server URL, file path).

use std::time::Duration;

/// Maximum number of stations retained in the store at once.
pub const MAX_STATIONS: usize = 20;

/// How long a station may go without a PUT before it is evicted.
pub const TTL: Duration = Duration::from_secs(30);

/// How often the background sweeper checks for expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// How often a content publisher re-sends its record.
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(3);

/// Maximum attempts for publisher uploads and client requests.
pub const MAX_RETRIES: u32 = 3;

/// Delay between retry attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Number of workers in the server's bounded connection pool.
pub const WORKER_POOL_SIZE: usize = 5;

/// Per-socket read timeout enforced by each worker.
pub const WORKER_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout used when polling `accept()` so shutdown can be noticed promptly.
pub const ACCEPT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default TCP port the aggregation server listens on.
pub const DEFAULT_PORT: u16 = 4567;

/// Path the server exposes; publisher and client both use this same
/// constant so they can never drift from the server's route.
pub const WEATHER_PATH: &str = "/weatherInfo.json";

/// File name used for the on-disk snapshot, relative to the server's
/// working directory.
pub const SNAPSHOT_FILE_NAME: &str = "weatherInfo.json";

/// `User-Agent` header sent by the content publisher.
pub const PUBLISHER_USER_AGENT: &str = "ATOMClient/1/0";
