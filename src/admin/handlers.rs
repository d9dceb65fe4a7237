use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::config::loader::save_routes;
use crate::http::response::X_MOCK_TABLE_VERSION;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{RouteDefinition, RouteTableError};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub route_table_version: u64,
    pub routes: usize,
    pub templates: usize,
    pub template_failures: usize,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct TemplateListing {
    pub generation: u64,
    pub templates: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct RejectedRoute {
    pub index: usize,
    pub method: String,
    pub path: String,
    pub message: String,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let snapshot = state.dispatcher.routes().snapshot();
    let templates = state.dispatcher.templates();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        route_table_version: snapshot.version(),
        routes: snapshot.len(),
        templates: templates.len(),
        template_failures: templates.failures().len(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

/// `GET /api/routes`: the active definitions, in stored order.
pub async fn get_routes(State(state): State<AppState>) -> Response {
    let snapshot = state.dispatcher.routes().snapshot();
    (
        [(X_MOCK_TABLE_VERSION, snapshot.version().to_string())],
        Json(snapshot.definitions()),
    )
        .into_response()
}

/// `POST|PUT /api/routes`: validate, swap in, then persist.
///
/// 400 when the body is not a route list, 422 with every rejected route when
/// validation fails. A persist failure after a successful swap is a 500; the
/// new table stays active.
pub async fn put_routes(State(state): State<AppState>, body: Bytes) -> Response {
    let definitions: Vec<RouteDefinition> = match serde_json::from_slice(&body) {
        Ok(defs) => defs,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_json", "message": e.to_string()})),
            )
                .into_response()
        }
    };

    // Concurrent saves queue here; each one's file write lands before the
    // next swap, so the file on disk always matches the active table.
    let _save = state.save_lock.lock().await;
    let applied = match state.dispatcher.routes().apply(definitions) {
        Ok(snapshot) => snapshot,
        Err(RouteTableError::Invalid(errors)) => {
            tracing::warn!(errors = errors.len(), "Rejected route table update");
            let rejected: Vec<RejectedRoute> = errors
                .iter()
                .map(|e| RejectedRoute {
                    index: e.index,
                    method: e.method.clone(),
                    path: e.path.clone(),
                    message: e.issue.to_string(),
                })
                .collect();
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": "invalid_routes", "errors": rejected})),
            )
                .into_response();
        }
    };
    let version = applied.version();
    metrics::record_table_version(version);

    if let Some(path) = state.routes_file.clone() {
        let saved = applied.definitions();
        let result = tokio::task::spawn_blocking(move || save_routes(&path, &saved)).await;
        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = failure {
            tracing::error!(error = %message, version, "Failed to persist routes");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "persist_failed", "message": message, "version": version})),
            )
                .into_response();
        }
    }

    Json(json!({"version": version, "routes": applied.len()})).into_response()
}

pub async fn get_templates(State(state): State<AppState>) -> Json<TemplateListing> {
    let templates = state.dispatcher.templates();
    Json(TemplateListing {
        generation: templates.generation(),
        templates: templates.names(),
        failed: templates.failures(),
    })
}

pub async fn reload_templates(State(state): State<AppState>) -> Response {
    let templates = Arc::clone(state.dispatcher.templates());
    match tokio::task::spawn_blocking(move || templates.reload()).await {
        Ok(Ok(report)) => Json(json!({
            "generation": report.generation,
            "loaded": report.loaded,
            "failed": report.failed,
        }))
        .into_response(),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "reload_failed", "message": e.to_string()})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "reload_failed", "message": e.to_string()})),
        )
            .into_response(),
    }
}
