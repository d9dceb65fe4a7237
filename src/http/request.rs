//! Inbound request handling.
//!
//! Request ids are assigned as early as possible by the server's layers
//! (`x-request-id`, UUID v4, propagated to the response). This module turns
//! an axum request into the dispatcher's [`MockRequest`] by buffering the
//! body up to the configured limit.

use std::error::Error as StdError;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use http_body_util::LengthLimitError;
use thiserror::Error;

use crate::dispatch::MockRequest;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request id header value, if present and printable.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(&X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Failure while buffering a request body.
#[derive(Debug, Error)]
pub enum BodyReadError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The stream failed for another reason, e.g. the client went away.
    #[error("failed to read request body: {0}")]
    Read(axum::Error),
}

impl BodyReadError {
    fn classify(error: axum::Error, limit: usize) -> Self {
        let mut current: Option<&(dyn StdError + 'static)> = Some(&error);
        while let Some(e) = current {
            if e.is::<LengthLimitError>() {
                return BodyReadError::TooLarge { limit };
            }
            current = e.source();
        }
        BodyReadError::Read(error)
    }
}

/// Buffer the body and split the target into path and query.
///
/// More than `limit` bytes is [`BodyReadError::TooLarge`]; any other stream
/// failure is [`BodyReadError::Read`].
pub async fn into_mock_request(request: Request<Body>, limit: usize) -> Result<MockRequest, BodyReadError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| BodyReadError::classify(e, limit))?;
    Ok(MockRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    })
}
