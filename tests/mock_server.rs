//! End-to-end tests for mocked traffic over a real socket.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::Value;

mod common;

const ROUTES: &str = r#"[
  {
    "method": "GET",
    "path": "/greet",
    "response_template": "hello_default.json",
    "match": {
      "source": "query",
      "field": "lang",
      "cases": {"en": "hello_en.json", "fr": "hello_fr.json"},
      "default": "hello_default.json"
    }
  },
  {"method": "GET", "path": "/users/:id", "response_template": "user_{id}.json"},
  {"method": "GET", "path": "/slow", "response_template": "hello_default.json", "delay": 100},
  {"method": "GET", "path": "/secret", "response_template": "secret.json", "auth": true},
  {
    "method": "POST",
    "path": "/login",
    "responseTemplate": "login_guest.json",
    "match": {"source": "body", "field": "user", "cases": {"admin": "login_admin.json"}}
  },
  {"method": "GET", "path": "/gone", "response_template": "missing.json"}
]"#;

const TEMPLATES: &[(&str, &str)] = &[
    ("hello_en.json", r#"{"msg":"hello"}"#),
    ("hello_fr.json", r#"{"msg":"bonjour"}"#),
    ("hello_default.json", r#"{"msg":"hi"}"#),
    ("user_42.json", r#"{"id":42}"#),
    ("secret.json", r#"{"secret":true}"#),
    ("login_admin.json", r#"{"role":"admin"}"#),
    ("login_guest.json", r#"{"role":"guest"}"#),
];

async fn get_json(server: &common::TestServer, path: &str) -> (StatusCode, Value) {
    let res = server.client.get(server.url(path)).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_query_match_selects_template() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let (status, body) = get_json(&server, "/greet?lang=fr").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "bonjour");

    let (_, body) = get_json(&server, "/greet?lang=de").await;
    assert_eq!(body["msg"], "hi");

    let (_, body) = get_json(&server, "/greet").await;
    assert_eq!(body["msg"], "hi");
}

#[tokio::test]
async fn test_path_parameter_in_template_name() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let res = server.client.get(server.url("/users/42")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-mock-template"], "user_42.json");
    assert_eq!(res.headers()["content-type"], "application/json");

    let (status, body) = get_json(&server, "/users/7").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["template"], "user_7.json");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = common::start_server(ROUTES, TEMPLATES).await;
    let (status, body) = get_json(&server, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let res = server.client.delete(server.url("/greet")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_template_is_server_error() {
    let server = common::start_server(ROUTES, TEMPLATES).await;
    let (status, body) = get_json(&server, "/gone").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "template_error");
    assert_eq!(body["template"], "missing.json");
}

#[tokio::test]
async fn test_delay_is_applied() {
    let server = common::start_server(ROUTES, TEMPLATES).await;
    let start = Instant::now();
    let (status, _) = get_json(&server, "/slow").await;
    assert_eq!(status, StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_body_match() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let res = server
        .client
        .post(server.url("/login"))
        .json(&serde_json::json!({"user": "admin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["role"], "admin");

    let res = server
        .client
        .post(server.url("/login"))
        .form(&[("user", "admin")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["role"], "admin");

    let res = server.client.post(server.url("/login")).send().await.unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["role"], "guest");

    let res = server
        .client
        .post(server.url("/login"))
        .body("{broken")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json::<Value>().await.unwrap()["field"], "user");
}

#[tokio::test]
async fn test_auth_with_issued_token() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let res = server.client.get(server.url("/secret")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .get(server.url("/secret"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let token: Value = server
        .client
        .post(server.url("/token"))
        .json(&serde_json::json!({"sub": "alice"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = token["token"].as_str().unwrap();

    let res = server
        .client
        .get(server.url("/secret"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["secret"], true);
}

#[tokio::test]
async fn test_cors_preflight() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let res = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/greet"))
        .header("origin", "http://app.example")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://app.example"
    );
    assert_eq!(res.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let server = common::start_server(ROUTES, TEMPLATES).await;

    let res = server
        .client
        .get(server.url("/greet"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "req-123");

    let res = server.client.get(server.url("/greet")).send().await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}
