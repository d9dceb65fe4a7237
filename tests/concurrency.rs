//! Concurrent traffic against a route table that is replaced mid-flight.

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

const ROUTES: &str = r#"[{"method": "GET", "path": "/slow", "response_template": "a.json", "delay": 100}]"#;
const TEMPLATES: &[(&str, &str)] = &[("a.json", r#"{"v":"a"}"#), ("b.json", r#"{"v":"b"}"#)];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_see_one_table_version_each() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let requests = (0..100).map(|i| {
        let client = server.client.clone();
        let url = server.url("/slow");
        async move {
            // Spread arrivals across the replace.
            tokio::time::sleep(Duration::from_millis(i % 20 * 5)).await;
            let res = client.get(url).send().await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            let version = res.headers()["x-mock-table-version"].to_str().unwrap().to_string();
            let body: Value = res.json().await.unwrap();
            (version, body["v"].as_str().unwrap().to_string())
        }
    });
    let traffic = tokio::spawn(join_all(requests));

    tokio::time::sleep(Duration::from_millis(40)).await;
    let res = server
        .client
        .post(server.url("/api/routes"))
        .json(&json!([{"method": "GET", "path": "/slow", "response_template": "b.json", "delay": 100}]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let results = traffic.await.unwrap();
    assert_eq!(results.len(), 100);
    for (version, served) in &results {
        match version.as_str() {
            "1" => assert_eq!(served, "a"),
            "2" => assert_eq!(served, "b"),
            other => panic!("unexpected table version {other}"),
        }
    }
    assert!(results.iter().any(|(v, _)| v == "1"));
}

#[tokio::test]
async fn test_delayed_requests_run_concurrently() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let start = std::time::Instant::now();
    let requests = (0..20).map(|_| server.client.get(server.url("/slow")).send());
    let responses = join_all(requests).await;
    for res in responses {
        assert_eq!(res.unwrap().status(), StatusCode::OK);
    }
    // Twenty 100ms delays overlap instead of queueing.
    assert!(start.elapsed() < Duration::from_millis(1500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_leave_file_matching_table() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    for round in 0..5 {
        let saves = (0..16).map(|i| {
            let client = server.client.clone();
            let url = server.url("/api/routes");
            async move {
                client
                    .post(url)
                    .json(&json!([{"method": "GET", "path": format!("/r{round}/{i}"), "response_template": "a.json"}]))
                    .send()
                    .await
                    .unwrap()
                    .status()
            }
        });
        for status in join_all(saves).await {
            assert_eq!(status, StatusCode::OK);
        }

        let active: Value = server
            .client
            .get(server.url("/api/routes"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let saved: Value = serde_json::from_slice(&std::fs::read(server.routes_file()).unwrap()).unwrap();
        assert_eq!(saved, active, "round {round}");
    }
}
