//! End-to-end coverage of the aggregation server driven over real TCP
//! connections, exercising the scenarios and invariants the observation
//! store and handlers are designed around.

use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use weather_aggregation::server::AggregationServer;

/// Spin up a server on an ephemeral port with a fresh snapshot directory,
/// wait for it to be ready, and hand back its base URL alongside handles
/// needed to shut it down and clean up.
async fn start_server(ttl: Duration) -> (Arc<AggregationServer>, String, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot_path: PathBuf = dir.path().join("weatherInfo.json");
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = Arc::new(AggregationServer::new(addr, ttl, snapshot_path));

    let runner = server.clone();
    tokio::spawn(async move {
        let _ = runner.run().await;
    });
    server.wait_until_ready().await;
    let bound = server.bound_addr().expect("bound_addr set once running");
    (server, format!("http://{bound}"), dir)
}

fn default_ttl() -> Duration {
    Duration::from_secs(30)
}

#[tokio::test(flavor = "multi_thread")]
async fn s1_first_publish_then_read() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let put_resp = client
        .put(format!("{base}/weatherInfo.json"))
        .header("Lamport-Clock", "0")
        .body(r#"{"id":"IDS60901","name":"Adelaide","air_temp":13.3}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(put_resp.status(), 201);

    let get_resp = client
        .get(format!("{base}/weatherInfo.json?id=IDS60901"))
        .send()
        .await
        .unwrap();
    assert_eq!(get_resp.status(), 200);
    let body: serde_json::Value = get_resp.json().await.unwrap();
    assert_eq!(body["id"], "IDS60901");
    assert_eq!(body["air_temp"], 13.3);

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn s2_overwrite_same_id_updates_in_place() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let first = client
        .put(format!("{base}/weatherInfo.json"))
        .body(r#"{"id":"IDS60901","air_temp":10.0}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);

    let second = client
        .put(format!("{base}/weatherInfo.json"))
        .body(r#"{"id":"IDS60901","air_temp":20.0}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);

    let all = client
        .get(format!("{base}/weatherInfo.json"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = all.json().await.unwrap();
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["air_temp"], 20.0);

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn s3_capacity_eviction_keeps_at_most_twenty() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    for i in 0..25 {
        let id = format!("IDS609{i:02}");
        let resp = client
            .put(format!("{base}/weatherInfo.json"))
            .body(json!({"id": id, "air_temp": i}).to_string())
            .send()
            .await
            .unwrap();
        assert!(resp.status() == 201 || resp.status() == 200);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let all = client
        .get(format!("{base}/weatherInfo.json"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = all.json().await.unwrap();
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 20, "store must never exceed its bound");

    let ids: HashSet<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    for i in 5..25 {
        let expected = format!("IDS609{i:02}");
        assert!(ids.contains(expected.as_str()), "most recent stations should survive eviction");
    }

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn s4_expired_station_is_not_visible_after_ttl() {
    let (server, base, _dir) = start_server(Duration::from_millis(200)).await;
    let client = reqwest::Client::new();

    let put_resp = client
        .put(format!("{base}/weatherInfo.json"))
        .body(r#"{"id":"IDS60901","air_temp":13.3}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(put_resp.status(), 201);

    let immediate = client
        .get(format!("{base}/weatherInfo.json?id=IDS60901"))
        .send()
        .await
        .unwrap();
    assert_eq!(immediate.status(), 200);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let after_ttl = client
        .get(format!("{base}/weatherInfo.json?id=IDS60901"))
        .send()
        .await
        .unwrap();
    assert_eq!(after_ttl.status(), 404, "expired entries must not be visible to GET");

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn s5_clock_advances_by_two_per_put() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let first = client
        .put(format!("{base}/weatherInfo.json"))
        .header("Lamport-Clock", "0")
        .body(r#"{"id":"IDS60901"}"#)
        .send()
        .await
        .unwrap();
    let c1: u64 = first
        .headers()
        .get("Lamport-Clock")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    for i in 0..5 {
        let resp = client
            .put(format!("{base}/weatherInfo.json"))
            .header("Lamport-Clock", "0")
            .body(json!({"id": format!("IDS6090{i}")}).to_string())
            .send()
            .await
            .unwrap();
        assert!(resp.status() == 200 || resp.status() == 201);
    }

    let last = client
        .put(format!("{base}/weatherInfo.json"))
        .header("Lamport-Clock", "0")
        .body(r#"{"id":"IDS60907"}"#)
        .send()
        .await
        .unwrap();
    let c2: u64 = last
        .headers()
        .get("Lamport-Clock")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    assert!(c2 > c1, "clock must strictly advance across successive requests");

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn s6_concurrent_puts_observe_distinct_clocks() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let base = Arc::new(base);

    let mut handles = Vec::new();
    for i in 0..10 {
        let base = base.clone();
        handles.push(tokio::spawn(async move {
            let client = reqwest::Client::new();
            let resp = client
                .put(format!("{base}/weatherInfo.json"))
                .body(json!({"id": format!("CONC{i}")}).to_string())
                .send()
                .await
                .unwrap();
            resp.headers()
                .get("Lamport-Clock")
                .unwrap()
                .to_str()
                .unwrap()
                .parse::<u64>()
                .unwrap()
        }));
    }

    let mut clocks = Vec::new();
    for h in handles {
        clocks.push(h.await.unwrap());
    }
    let distinct: HashSet<u64> = clocks.iter().copied().collect();
    assert_eq!(distinct.len(), clocks.len(), "every concurrent PUT observes a distinct clock value");

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_body_put_is_local_only_and_does_not_create_a_record() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{base}/weatherInfo.json"))
        .body(Vec::new())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let all = client
        .get(format!("{base}/weatherInfo.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(all.status(), 404, "an empty-body PUT must not create any record");

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_id_put_is_rejected() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{base}/weatherInfo.json"))
        .body(r#"{"air_temp":13.3}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_json_put_is_a_server_error() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{base}/weatherInfo.json"))
        .body("not json at all")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn unrouted_method_is_rejected() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let resp = client
        .delete(format!("{base}/weatherInfo.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_station_id_is_not_found() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/weatherInfo.json?id=NOSUCHSTATION"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    server.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn store_survives_restart_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("weatherInfo.json");
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

    let server = Arc::new(AggregationServer::new(addr, default_ttl(), snapshot_path.clone()));
    let runner = server.clone();
    let handle = tokio::spawn(async move {
        let _ = runner.run().await;
    });
    server.wait_until_ready().await;
    let base = format!("http://{}", server.bound_addr().unwrap());

    let client = reqwest::Client::new();
    let resp = client
        .put(format!("{base}/weatherInfo.json"))
        .body(r#"{"id":"IDS60901","air_temp":13.3}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    server.stop();
    handle.await.unwrap();

    let addr2: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server2 = Arc::new(AggregationServer::new(addr2, default_ttl(), snapshot_path));
    let runner2 = server2.clone();
    tokio::spawn(async move {
        let _ = runner2.run().await;
    });
    server2.wait_until_ready().await;
    let base2 = format!("http://{}", server2.bound_addr().unwrap());

    let reloaded = client
        .get(format!("{base2}/weatherInfo.json?id=IDS60901"))
        .send()
        .await
        .unwrap();
    assert_eq!(reloaded.status(), 200);
    let body: serde_json::Value = reloaded.json().await.unwrap();
    assert_eq!(body["air_temp"], 13.3);

    server2.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn query_client_round_trips_against_a_live_server() {
    let (server, base, _dir) = start_server(default_ttl()).await;
    let client = reqwest::Client::new();
    client
        .put(format!("{base}/weatherInfo.json"))
        .body(r#"{"id":"IDS60901","name":"Adelaide"}"#)
        .send()
        .await
        .unwrap();

    let query = weather_aggregation::client::QueryClient::new(base.clone(), Some("IDS60901".to_string()));
    let output = query.run().await.unwrap();
    assert!(output.contains("id: IDS60901"));
    assert!(output.contains("name: Adelaide"));

    server.stop();
}
