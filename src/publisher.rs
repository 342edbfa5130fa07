//! Content publisher: reads a local station record and periodically PUTs
//! it to the aggregation server, retrying with backoff on failure.

use crate::clock::LamportClock;
use crate::config::{
    MAX_RETRIES, PUBLISHER_USER_AGENT, PUBLISH_INTERVAL, RETRY_DELAY, WEATHER_PATH,
};
use crate::errors::{AggregationError, AggregationResult};
use crate::observation::Observation;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reads `file_path` and pushes its contents to `server_url` every
/// [`PUBLISH_INTERVAL`] until stopped.
pub struct ContentPublisher {
    server_url: String,
    file_path: PathBuf,
    clock: LamportClock,
    http: reqwest::Client,
}

impl ContentPublisher {
    pub fn new(server_url: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            server_url: server_url.into(),
            file_path: file_path.into(),
            clock: LamportClock::new(),
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), WEATHER_PATH)
    }

    /// Build from raw CLI arguments (`server-url file-path`), parsed
    /// directly so a missing argument surfaces as
    /// [`AggregationError::Usage`], matching the query client's approach.
    pub fn from_args(args: &[String]) -> AggregationResult<Self> {
        let mut it = args.iter();
        let server_url = it
            .next()
            .cloned()
            .ok_or_else(|| AggregationError::Usage("server-url is required".to_string()))?;
        let file_path = it
            .next()
            .cloned()
            .ok_or_else(|| AggregationError::Usage("file-path is required".to_string()))?;
        Ok(Self::new(server_url, PathBuf::from(file_path)))
    }

    /// Read the file, parse it, and PUT it, retrying up to [`MAX_RETRIES`]
    /// times with [`RETRY_DELAY`] between attempts.
    pub async fn publish_once(&self) -> AggregationResult<()> {
        self.clock.tick(); // (1) start

        let contents = tokio::fs::read_to_string(&self.file_path).await?;
        let observation = parse_record_file(&contents)?;
        self.clock.tick(); // (2) parse

        let body = observation.to_json_vec()?;
        self.clock.tick(); // (3) serialize

        let mut last_error = None;
        for attempt in 1..=MAX_RETRIES {
            let lamport_header = self.clock.read();
            self.clock.tick(); // immediately before writing the body

            let outcome = self
                .http
                .put(self.endpoint())
                .header(CONTENT_TYPE, "application/json")
                .header(USER_AGENT, PUBLISHER_USER_AGENT)
                .header("Lamport-Clock", lamport_header.to_string())
                .body(body.clone())
                .send()
                .await;

            match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let server_clock = response
                        .headers()
                        .get("Lamport-Clock")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());
                    match server_clock {
                        Some(v) => {
                            self.clock.observe(v);
                        }
                        None => {
                            self.clock.tick();
                        }
                    }

                    if matches!(status, 200 | 201 | 204) {
                        debug!("publish attempt {attempt} accepted with status {status}");
                        if let Ok(id) = observation.id() {
                            self.verify(&observation, &id).await;
                        }
                        return Ok(());
                    }
                    last_error = Some(format!("server returned status {status}"));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }

            if attempt < MAX_RETRIES {
                warn!(
                    "publish attempt {attempt}/{MAX_RETRIES} failed ({}), retrying in {:?}",
                    last_error.as_deref().unwrap_or("unknown error"),
                    RETRY_DELAY
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        Err(AggregationError::RetryExhausted {
            attempts: MAX_RETRIES,
            message: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Best-effort post-PUT verification: GET the same station back and
    /// compare it field-by-field against what was just sent. A mismatch
    /// is only logged and not retried, since the next periodic upload
    /// will re-publish anyway.
    async fn verify(&self, sent: &Observation, id: &str) {
        let url = format!("{}?id={id}", self.endpoint());
        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("verification GET failed: {e}");
                return;
            }
        };
        if !response.status().is_success() {
            warn!("verification GET returned status {}", response.status());
            return;
        }
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("verification GET body read failed: {e}");
                return;
            }
        };
        match Observation::from_json_bytes(&body) {
            Ok(received) if &received == sent => {
                debug!("verification succeeded for station {id}");
            }
            Ok(_) => {
                warn!("verification mismatch for station {id}: server record differs from what was sent");
            }
            Err(e) => {
                warn!("verification GET body did not parse: {e}");
            }
        }
    }

    /// Run the publish cycle forever, sleeping [`PUBLISH_INTERVAL`]
    /// between attempts, until `shutdown` is set. A failed cycle (file
    /// error, retries exhausted) is logged and skipped; it never aborts
    /// the publisher.
    pub async fn run_periodic(&self, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("publisher stopping");
                return;
            }
            if let Err(e) = self.publish_once().await {
                error!("publish cycle failed, will retry next period: {e}");
            }
            tokio::time::sleep(PUBLISH_INTERVAL).await;
        }
    }
}

/// Parse a `key:value`-per-line record file into an [`Observation`].
/// Blank lines are ignored; an empty key or value is an
/// [`AggregationError::InvalidFormat`]; a parsed record with no `id` is
/// [`AggregationError::MissingId`]. The file is always read in full before
/// any emptiness check, fixing the reference implementation's latent
/// never-read-before-checking bug (see SPEC_FULL.md REDESIGN FLAGS).
pub fn parse_record_file(contents: &str) -> AggregationResult<Observation> {
    let mut map = serde_json::Map::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(AggregationError::InvalidFormat(format!(
                "line has no ':' separator: {line:?}"
            )));
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Err(AggregationError::InvalidFormat(format!(
                "empty key or value in line: {line:?}"
            )));
        }
        map.insert(key.to_string(), coerce_value(value));
    }

    let observation = Observation::from(map);
    if observation.id().is_err() {
        return Err(AggregationError::MissingId);
    }
    Ok(observation)
}

/// Load and parse the file this publisher was configured with.
pub async fn load_record(path: &Path) -> AggregationResult<Observation> {
    let contents = tokio::fs::read_to_string(path).await?;
    parse_record_file(&contents)
}

fn coerce_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::from(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::from(f)
    } else {
        Value::String(raw.to_string())
    }
}
