//! GET and PUT handlers for `/weatherInfo.json`.

use crate::errors::AggregationError;
use crate::http::{HttpRequest, HttpResponse};
use crate::observation::Observation;
use crate::server::state::SharedState;
use crate::store::PutOutcome;
use serde_json::Value;
use std::time::SystemTime;
use tracing::{debug, warn};

/// `GET /weatherInfo.json[?id=...]`.
pub async fn handle_get(req: &HttpRequest, state: &SharedState) -> HttpResponse {
    state.clock.tick();

    let now = SystemTime::now();
    if let Err(e) = state.sweep(now).await {
        warn!("sweep failed during GET: {e}");
    }

    let id = req.query_param("id");

    let body_and_status: (u16, &'static str, Vec<u8>) = match id {
        Some(id) => match state.with_store(|s| s.get_one(&id, now)).await {
            Some(obs) => {
                let bytes = obs.to_json_vec().unwrap_or_default();
                (200, "OK", bytes)
            }
            None => (404, "Not Found", Vec::new()),
        },
        None => {
            let all = state.with_store(|s| s.get_all(now)).await;
            if all.is_empty() {
                (404, "Not Found", Vec::new())
            } else {
                let values: Vec<Value> = all
                    .into_iter()
                    .map(|o| Value::Object(o.into_json()))
                    .collect();
                let bytes = serde_json::to_vec(&Value::Array(values)).unwrap_or_default();
                (200, "OK", bytes)
            }
        }
    };

    let lamport_clock = state.clock.tick();
    HttpResponse::new(body_and_status.0, body_and_status.1, body_and_status.2, lamport_clock)
}

/// `PUT /weatherInfo.json`.
pub async fn handle_put(req: &HttpRequest, state: &SharedState) -> HttpResponse {
    if req.body.is_empty() {
        // Empty body is a local event only: no store mutation, no flush.
        let lamport_clock = state.clock.tick();
        return HttpResponse::empty(204, "No Content", lamport_clock);
    }

    state.clock.observe(req.headers.lamport_clock());

    let observation = match Observation::from_json_bytes(&req.body) {
        Ok(obs) => obs,
        Err(AggregationError::Parse(msg)) => {
            warn!("rejecting PUT body: {msg}");
            let lamport_clock = state.clock.tick();
            return HttpResponse::new(500, "Internal Server Error", msg.into_bytes(), lamport_clock);
        }
        Err(other) => {
            warn!("unexpected error parsing PUT body: {other}");
            let lamport_clock = state.clock.tick();
            return HttpResponse::new(500, "Internal Server Error", other.to_string().into_bytes(), lamport_clock);
        }
    };

    let id = match observation.id() {
        Ok(id) => id,
        Err(e) => {
            debug!("rejecting PUT: {e}");
            let lamport_clock = state.clock.tick();
            return HttpResponse::new(400, "Bad Request", e.to_string().into_bytes(), lamport_clock);
        }
    };

    let now = SystemTime::now();
    let outcome = state
        .with_store(|s| s.put_or_replace(id, observation, now).0)
        .await;

    if let Err(e) = state.flush().await {
        warn!("failed to flush snapshot after PUT: {e}");
    }

    let (status, reason) = match outcome {
        PutOutcome::Created => (201, "Created"),
        PutOutcome::Updated => (200, "OK"),
    };

    let lamport_clock = state.clock.tick();
    HttpResponse::empty(status, reason, lamport_clock)
}

/// Anything that isn't `GET`/`PUT /weatherInfo.json`.
pub fn handle_unroutable(state: &SharedState) -> HttpResponse {
    let lamport_clock = state.clock.tick();
    HttpResponse::empty(400, "Bad Request", lamport_clock)
}
