//! Query client: sends a GET to the aggregation server and pretty-prints
//! the result.

use crate::clock::LamportClock;
use crate::config::{MAX_RETRIES, RETRY_DELAY, WEATHER_PATH};
use crate::errors::{AggregationError, AggregationResult};
use serde_json::Value;
use tracing::warn;

pub struct QueryClient {
    server_url: String,
    station_id: Option<String>,
    clock: LamportClock,
    http: reqwest::Client,
}

impl QueryClient {
    pub fn new(server_url: impl Into<String>, station_id: Option<String>) -> Self {
        Self {
            server_url: server_url.into(),
            station_id,
            clock: LamportClock::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Build from raw CLI arguments (`server-url [station-id]`), parsed
    /// directly rather than through the CLI-parsing crate so a missing
    /// URL reliably surfaces as [`AggregationError::Usage`] independent of
    /// any particular argument-parsing library's own exit behavior.
    pub fn from_args(args: &[String]) -> AggregationResult<Self> {
        let mut it = args.iter();
        let server_url = it
            .next()
            .cloned()
            .ok_or_else(|| AggregationError::Usage("server-url is required".to_string()))?;
        let station_id = it.next().cloned();
        Ok(Self::new(server_url, station_id))
    }

    fn endpoint(&self) -> String {
        let base = format!("{}{}", self.server_url.trim_end_matches('/'), WEATHER_PATH);
        match &self.station_id {
            Some(id) => format!("{base}?id={id}"),
            None => base,
        }
    }

    /// Send the GET, retrying up to [`MAX_RETRIES`] times on transport
    /// failure with [`RETRY_DELAY`] between attempts. A non-200 response
    /// is reported directly and is not retried.
    pub async fn run(&self) -> AggregationResult<String> {
        let mut last_error = None;
        for attempt in 1..=MAX_RETRIES {
            self.clock.tick();

            let result = self
                .http
                .get(self.endpoint())
                .header("Lamport-Clock", self.clock.read().to_string())
                .send()
                .await;

            match result {
                Ok(response) => {
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

                    let status = response.status().as_u16();
                    if status != 200 {
                        return Ok(format!("Error: Server returned status code {status}"));
                    }
                    let body = response.text().await?;
                    return Ok(format_response_body(&body));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < MAX_RETRIES {
                        warn!(
                            "request attempt {attempt}/{MAX_RETRIES} failed ({}), retrying in {:?}",
                            last_error.as_deref().unwrap_or("unknown error"),
                            RETRY_DELAY
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(AggregationError::RetryExhausted {
            attempts: MAX_RETRIES,
            message: last_error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// Pretty-print a response body: a JSON array becomes one `key: value`
/// block per element separated by blank lines; a single object becomes
/// one block; anything else is reported as an error line.
pub fn format_response_body(body: &str) -> String {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return "Error: response body is not valid JSON".to_string(),
    };

    match &value {
        Value::Array(items) => {
            let mut blocks = Vec::with_capacity(items.len());
            for item in items {
                match format_record(item) {
                    Some(block) => blocks.push(block),
                    None => return "Error: unexpected response shape".to_string(),
                }
            }
            blocks.join("\n\n")
        }
        Value::Object(_) => {
            format_record(&value).unwrap_or_else(|| "Error: unexpected response shape".to_string())
        }
        _ => "Error: unexpected response shape".to_string(),
    }
}

fn format_record(value: &Value) -> Option<String> {
    let Value::Object(map) = value else {
        return None;
    };
    let lines: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{k}: {}", format_scalar(v)))
        .collect();
    Some(lines.join("\n"))
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
