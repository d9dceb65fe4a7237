//! Admin API: route table and template management, status.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/api/routes", get(get_routes).post(put_routes).put(put_routes))
        .route("/api/templates", get(get_templates))
        .route("/api/templates/reload", post(reload_templates))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
