//! Response construction for served templates.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::dispatch::Rendered;

/// Version of the route table that served the response.
pub const X_MOCK_TABLE_VERSION: HeaderName = HeaderName::from_static("x-mock-table-version");

/// Name of the template that was served.
pub const X_MOCK_TEMPLATE: HeaderName = HeaderName::from_static("x-mock-template");

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        let template = &self.template;
        let mut response = Response::new(Body::from(template.body().clone()));
        *response.status_mut() = template.status();

        let headers = response.headers_mut();
        for (name, value) in template.headers() {
            headers.append(name.clone(), value.clone());
        }
        headers.insert(X_MOCK_TABLE_VERSION, HeaderValue::from(self.table_version));
        if let Ok(name) = HeaderValue::from_str(template.name()) {
            headers.insert(X_MOCK_TEMPLATE, name);
        }
        response
    }
}
