//! Dispatch failures and their HTTP mapping.
//!
//! Every failure resolves to a status inside the dispatcher; nothing here
//! terminates the process or affects other requests.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::security::AuthError;
use crate::templates::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No route matches method and path.
    #[error("no route for {method} {path}")]
    NotFound { method: String, path: String },

    /// The auth gate rejected the request.
    #[error("unauthorized: {0}")]
    Unauthorized(AuthError),

    /// The body could not be parsed for a body-sourced match rule.
    #[error("cannot read match field(s) {fields} from body: {reason}")]
    Input { fields: String, reason: String },

    /// The selected template does not resolve.
    #[error("{0}")]
    Template(#[from] TemplateError),

    /// No case fired and the route names no fallback template.
    #[error("route #{route} ({method} {path}) selected no template")]
    NoTemplate {
        route: usize,
        method: String,
        path: String,
    },

    /// Unexpected failure in the request or render path.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DispatchError::Input { .. }
            | DispatchError::Template(_)
            | DispatchError::NoTemplate { .. }
            | DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, used in responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::Unauthorized(_) => "unauthorized",
            DispatchError::Input { .. } => "input_error",
            DispatchError::Template(_) | DispatchError::NoTemplate { .. } => "template_error",
            DispatchError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        match &self {
            DispatchError::Template(e) => {
                body["template"] = json!(e.name());
            }
            DispatchError::Input { fields, .. } => {
                body["field"] = json!(fields);
            }
            _ => {}
        }
        (self.status(), Json(body)).into_response()
    }
}
