//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, body limit, request ID, CORS)
//! - Bind server to listener (plain or TLS)
//! - Hand mocked traffic to the dispatcher
//! - Apply route and template reloads while serving

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{ReloadEvent, ServerConfig, TlsConfig};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::http::request::{into_mock_request, request_id, BodyReadError};
use crate::observability::metrics;
use crate::observability::tracing::RequestSpan;
use crate::security::{cors, jwt};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<ServerConfig>,
    /// Where admin saves are persisted; `None` keeps them in memory only.
    pub routes_file: Option<PathBuf>,
    /// Held across swap and persist so the file always ends up matching the
    /// last applied table.
    pub save_lock: Arc<tokio::sync::Mutex<()>>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        let routes_file = config
            .routes
            .persist
            .then(|| PathBuf::from(&config.routes.file));
        Self {
            dispatcher,
            config: Arc::new(config),
            routes_file,
            save_lock: Arc::new(tokio::sync::Mutex::new(())),
            started: Instant::now(),
        }
    }
}

/// HTTP server for the mock endpoints, token issuer and admin API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        let state = AppState::new(config, dispatcher);
        let router = Self::build_router(&state);
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let config = &state.config;

        let mut router = Router::new();
        if config.auth.token_endpoint {
            router = router.route("/token", any(issue_token));
        }
        if config.admin.enabled {
            router = router.merge(admin::setup_admin_router(state.clone()));
        }

        let origins = cors::resolve_origins(&config.cors.allowed_origins);

        router
            .fallback(mock_handler)
            .with_state(state.clone())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(cors::cors_layer(&origins))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on a bound listener until `shutdown` fires.
    ///
    /// Reload events are applied in the background for as long as the
    /// server runs.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: mpsc::UnboundedReceiver<ReloadEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloads = tokio::spawn(apply_updates(self.state.clone(), updates));
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        reloads.abort();
        tracing::info!("HTTP server stopped");
        result
    }

    /// Run with TLS termination on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        updates: mpsc::UnboundedReceiver<ReloadEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let reloads = tokio::spawn(apply_updates(self.state.clone(), updates));
        let handle = axum_server::Handle::new();
        let signal = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            signal.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(app)
            .await;

        reloads.abort();
        tracing::info!("HTTPS server stopped");
        result
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

async fn apply_updates(state: AppState, mut updates: mpsc::UnboundedReceiver<ReloadEvent>) {
    while let Some(event) = updates.recv().await {
        apply_reload(&state, event).await;
    }
}

/// Apply one reload event. Failures are logged and leave the current
/// table or catalog in place.
pub async fn apply_reload(state: &AppState, event: ReloadEvent) {
    match event {
        ReloadEvent::Routes(definitions) => {
            let _save = state.save_lock.lock().await;
            let routes = state.dispatcher.routes();
            if routes.snapshot().definitions() == definitions {
                tracing::debug!("Routes unchanged, skipping reload");
                return;
            }
            match routes.replace(definitions) {
                Ok(version) => metrics::record_table_version(version),
                Err(e) => {
                    for error in e.errors() {
                        tracing::error!(error = %error, "Rejected route on reload");
                    }
                    tracing::error!("Route reload failed. Keeping current table.");
                }
            }
        }
        ReloadEvent::Templates => {
            let templates = Arc::clone(state.dispatcher.templates());
            match tokio::task::spawn_blocking(move || templates.reload()).await {
                Ok(Ok(report)) => tracing::info!(
                    generation = report.generation,
                    loaded = report.loaded,
                    failed = report.failed.len(),
                    "Templates reloaded"
                ),
                Ok(Err(e)) => tracing::error!(error = %e, "Template reload failed. Keeping current catalog."),
                Err(e) => tracing::error!(error = %e, "Template reload task failed"),
            }
        }
    }
}

/// Fallback handler: every request not claimed by the token or admin
/// routes goes through the dispatcher.
async fn mock_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).unwrap_or("unknown").to_string();

    let mock = match into_mock_request(request, state.config.listener.max_body_bytes).await {
        Ok(mock) => mock,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return body_error_response(e, start);
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %mock.method,
        path = %mock.path,
        "Dispatching request"
    );

    match state.dispatcher.dispatch(&mock).await {
        Ok(rendered) => {
            tracing::debug!(
                request_id = %request_id,
                route = rendered.route_index,
                template = rendered.template.name(),
                table_version = rendered.table_version,
                "Serving template"
            );
            let response = rendered.into_response();
            metrics::record_request(response.status().as_u16(), "served", start);
            response
        }
        Err(e) => {
            match &e {
                DispatchError::NotFound { .. } => {
                    tracing::debug!(request_id = %request_id, error = %e, "No route matched")
                }
                DispatchError::Unauthorized(_) => {
                    tracing::info!(request_id = %request_id, error = %e, "Request rejected")
                }
                _ => tracing::error!(request_id = %request_id, error = %e, "Dispatch failed"),
            }
            metrics::record_request(e.status().as_u16(), e.kind(), start);
            e.into_response()
        }
    }
}

fn body_error_response(error: BodyReadError, start: Instant) -> Response {
    match error {
        BodyReadError::TooLarge { .. } => {
            metrics::record_request(413, "body_error", start);
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({"error": "body_error", "message": error.to_string()})),
            )
                .into_response()
        }
        BodyReadError::Read(_) => {
            let e = DispatchError::Internal(error.to_string());
            metrics::record_request(e.status().as_u16(), e.kind(), start);
            e.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    sub: String,
}

/// `POST /token`: sign an HS256 token for `sub`.
async fn issue_token(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST")],
            Json(json!({"error": "method_not_allowed", "message": "use POST"})),
        )
            .into_response();
    }

    let sub = match serde_json::from_slice::<TokenRequest>(&body) {
        Ok(req) if !req.sub.trim().is_empty() => req.sub,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_request", "message": "body must be {\"sub\": \"...\"}"})),
            )
                .into_response()
        }
    };

    let auth = &state.config.auth;
    let ttl = chrono::Duration::seconds(auth.token_ttl_secs as i64);
    let issued = jwt::issue(auth.secret.as_bytes(), &sub, ttl, chrono::Utc::now());
    tracing::info!(sub = %sub, expires_at = %issued.expires_at, "Token issued");

    Json(issued).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RouteDefinition, RouteTable};
    use crate::security::BearerJwtGate;
    use crate::templates::{MemorySource, TemplateStore};
    use tower::ServiceExt;

    fn server(mut config: ServerConfig) -> HttpServer {
        config.routes.persist = false;
        let routes = RouteTable::from_definitions(vec![
            RouteDefinition::new("GET", "/hello", "hello.json"),
            RouteDefinition::new("GET", "/private", "hello.json").with_auth(),
        ])
        .unwrap();
        let source = MemorySource::new().with("hello.json", r#"{"msg":"hi"}"#);
        let templates = TemplateStore::load(source, "application/json").unwrap();
        let gate = BearerJwtGate::new(config.auth.secret.clone());
        let dispatcher = Dispatcher::new(Arc::new(routes), Arc::new(templates), Arc::new(gate));
        HttpServer::new(config, dispatcher)
    }

    async fn send(server: &HttpServer, request: Request<Body>) -> Response {
        server.router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_serves_template_with_diagnostics() {
        let server = server(ServerConfig::default());
        let response = send(&server, Request::get("/hello").body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-mock-template"], "hello.json");
        assert_eq!(response.headers()["x-mock-table-version"], "1");
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["msg"], "hi");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = server(ServerConfig::default());
        let response = send(&server, Request::get("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "not_found");
    }

    #[tokio::test]
    async fn test_token_then_private_route() {
        let server = server(ServerConfig::default());

        let denied = send(&server, Request::get("/private").body(Body::empty()).unwrap()).await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let issued = send(
            &server,
            Request::post("/token")
                .body(Body::from(r#"{"sub":"tester"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(issued.status(), StatusCode::OK);
        let body = json_body(issued).await;
        let token = body["token"].as_str().unwrap().to_string();
        assert!(body["expires_at"].is_string());

        let allowed = send(
            &server,
            Request::get("/private")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_token_rejects_bad_requests() {
        let server = server(ServerConfig::default());

        let empty_sub = send(
            &server,
            Request::post("/token").body(Body::from(r#"{"sub":""}"#)).unwrap(),
        )
        .await;
        assert_eq!(empty_sub.status(), StatusCode::BAD_REQUEST);

        let get = send(&server, Request::get("/token").body(Body::empty()).unwrap()).await;
        assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_body_errors_map_to_status() {
        let too_large = body_error_response(BodyReadError::TooLarge { limit: 16 }, Instant::now());
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(too_large).await["error"], "body_error");

        let broken = body_error_response(
            BodyReadError::Read(axum::Error::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))),
            Instant::now(),
        );
        assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(broken).await["error"], "internal_error");
    }

    #[tokio::test]
    async fn test_oversized_streamed_body_is_413() {
        let mut config = ServerConfig::default();
        config.listener.max_body_bytes = 16;
        let server = server(config);

        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("0123456789"), Ok("0123456789")];
        let response = send(
            &server,
            Request::post("/hello")
                .body(Body::from_stream(futures_util::stream::iter(chunks)))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_routes_reload_skips_identical_table() {
        let server = server(ServerConfig::default());
        let state = server.state().clone();
        let current = state.dispatcher.routes().snapshot().definitions();

        apply_reload(&state, ReloadEvent::Routes(current)).await;
        assert_eq!(state.dispatcher.routes().version(), 1);

        apply_reload(
            &state,
            ReloadEvent::Routes(vec![RouteDefinition::new("GET", "/other", "hello.json")]),
        )
        .await;
        assert_eq!(state.dispatcher.routes().version(), 2);

        // Invalid definitions leave the table alone.
        apply_reload(&state, ReloadEvent::Routes(vec![RouteDefinition::new("", "x", "")])).await;
        assert_eq!(state.dispatcher.routes().version(), 2);
    }
}
