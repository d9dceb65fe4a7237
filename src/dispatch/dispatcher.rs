//! Per-request pipeline.
//!
//! ```text
//! Received → AuthChecked → Delayed → Matched → Rendered → Responded
//!     └──────────┴────────────┴──────────┴─────────┴──→ Failed(kind)
//! ```
//!
//! The route table snapshot is taken once on entry and held until the
//! request completes, so one request never mixes two table versions.
//! Dropping the returned future (client gone) abandons the pipeline at
//! whatever await point it reached; no template work happens after that.

use std::sync::Arc;

use crate::dispatch::error::DispatchError;
use crate::dispatch::request::MockRequest;
use crate::routing::router::RouteTable;
use crate::routing::selection::{self, Attributes, Selection};
use crate::security::AuthGate;
use crate::templates::{Template, TemplateStore};

/// Pipeline stage reached by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    AuthChecked,
    Delayed,
    Matched,
    Rendered,
    Responded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::AuthChecked => "auth_checked",
            Stage::Delayed => "delayed",
            Stage::Matched => "matched",
            Stage::Rendered => "rendered",
            Stage::Responded => "responded",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully resolved response.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub template: Arc<Template>,
    pub selection: Selection,
    /// Index of the serving route in its table.
    pub route_index: usize,
    /// Version of the table snapshot the request was resolved against.
    pub table_version: u64,
}

/// Resolves requests against the route table and template store.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    templates: Arc<TemplateStore>,
    auth: Arc<dyn AuthGate>,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, templates: Arc<TemplateStore>, auth: Arc<dyn AuthGate>) -> Self {
        Self {
            routes,
            templates,
            auth,
        }
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Run the full pipeline for one request.
    pub async fn dispatch(&self, request: &MockRequest) -> Result<Rendered, DispatchError> {
        let snapshot = self.routes.snapshot();
        let version = snapshot.version();
        trace_stage(Stage::Received, version, request);

        // Route resolution
        let Some(hit) = snapshot.find(request.method.as_str(), &request.path) else {
            return Err(DispatchError::NotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            });
        };
        let route = hit.route;

        // Auth, before any delay or template work
        if route.requires_auth() {
            if let Err(e) = self.auth.check(&request.headers) {
                tracing::debug!(route = route.index(), reason = %e, "Auth gate rejected request");
                return Err(DispatchError::Unauthorized(e));
            }
        }
        trace_stage(Stage::AuthChecked, version, request);

        // Delay: a timer suspension of this task only
        let delay = route.delay();
        if !delay.is_zero() {
            tracing::debug!(route = route.index(), delay_ms = delay.as_millis() as u64, "Applying delay");
            tokio::time::sleep(delay).await;
        }
        trace_stage(Stage::Delayed, version, request);

        // Matching
        let attrs = match route.rule() {
            Some(rule) => request.attributes(rule.source).map_err(|e| DispatchError::Input {
                fields: rule.field_names().join(","),
                reason: e.to_string(),
            })?,
            None => Attributes::new(),
        };
        let selection = selection::select(route.rule(), route.response_template(), &attrs, &hit.params)
            .ok_or_else(|| DispatchError::NoTemplate {
                route: route.index(),
                method: route.method().to_string(),
                path: route.path().to_string(),
            })?;
        tracing::debug!(
            route = route.index(),
            template = %selection.template,
            by = selection.by.as_str(),
            discriminator = ?selection.discriminator,
            "Template selected"
        );
        trace_stage(Stage::Matched, version, request);

        // Render
        let template = self.templates.resolve(&selection.template)?;
        trace_stage(Stage::Rendered, version, request);

        Ok(Rendered {
            template,
            selection,
            route_index: route.index(),
            table_version: version,
        })
    }
}

fn trace_stage(stage: Stage, version: u64, request: &MockRequest) {
    tracing::trace!(
        stage = %stage,
        table_version = version,
        method = %request.method,
        path = %request.path,
        "Dispatch stage"
    );
}
