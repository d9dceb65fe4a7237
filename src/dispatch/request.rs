//! The dispatcher's view of an inbound request and attribute extraction.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;

use crate::routing::definition::MatchSource;
use crate::routing::selection::Attributes;

/// Method, path, query, headers and fully buffered body of one request.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockRequest {
    /// Build from a method and a `path?query` target.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attributes for a match rule reading from `source`.
    pub fn attributes(&self, source: MatchSource) -> Result<Attributes, BodyError> {
        match source {
            MatchSource::Query => Ok(query_attributes(self.query.as_deref())),
            MatchSource::Body => body_attributes(&self.headers, &self.body),
        }
    }
}

/// The request body could not be read as structured data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BodyError(pub String);

/// Parse a query string. Repeated keys keep their first value.
pub fn query_attributes(query: Option<&str>) -> Attributes {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a JSON object or form-encoded body into string attributes.
///
/// An empty body has no fields. JSON scalars keep their JSON text (`1`,
/// `true`), `null` becomes the empty string and nested values are kept as
/// compact JSON.
pub fn body_attributes(headers: &HeaderMap, body: &[u8]) -> Result<Attributes, BodyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Attributes::new());
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        return Ok(url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| BodyError(format!("body is not valid JSON: {e}")))?;
    let Value::Object(map) = value else {
        return Err(BodyError("body is not a JSON object".to_string()));
    };

    Ok(map
        .into_iter()
        .map(|(k, v)| (k, value_to_string(v)))
        .collect())
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
