//! Versioned route table and lookup.
//!
//! # Responsibilities
//! - Store compiled routes behind an atomically swappable snapshot
//! - Replace the whole table at once, bumping the version
//! - Look up the first route matching method and path
//!
//! # Design Decisions
//! - Readers never lock: `snapshot()` is a single atomic load
//! - Writers serialize on a mutex; a published snapshot is never mutated
//! - Explicit no-match rather than silent default

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::routing::definition::RouteDefinition;
use crate::routing::matcher::{method_matches, PathParams, PathPattern};
use crate::routing::selection::MatchRule;
use crate::routing::validation::{compile_routes_bounded, ValidationError};

/// Error returned when a table cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteTableError {
    #[error("invalid route table: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

impl RouteTableError {
    /// Individual validation failures.
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            RouteTableError::Invalid(errors) => errors,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A compiled, validated route.
#[derive(Debug, Clone)]
pub struct Route {
    index: usize,
    pattern: PathPattern,
    rule: Option<MatchRule>,
    delay: Duration,
    definition: RouteDefinition,
}

impl Route {
    pub(crate) fn new(
        index: usize,
        pattern: PathPattern,
        rule: Option<MatchRule>,
        delay: Duration,
        definition: RouteDefinition,
    ) -> Self {
        Self {
            index,
            pattern,
            rule,
            delay,
            definition,
        }
    }

    /// Position in the table; earlier routes win.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn method(&self) -> &str {
        &self.definition.method
    }

    pub fn path(&self) -> &str {
        &self.definition.path
    }

    pub fn requires_auth(&self) -> bool {
        self.definition.auth
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn rule(&self) -> Option<&MatchRule> {
        self.rule.as_ref()
    }

    pub fn response_template(&self) -> Option<&str> {
        self.definition.response_template.as_deref()
    }

    /// The normalized definition this route was compiled from.
    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    /// Structural match against a request method and path.
    pub fn matches(&self, method: &str, path: &str) -> Option<PathParams> {
        if !method_matches(&self.definition.method, method) {
            return None;
        }
        self.pattern.matches(path)
    }
}

/// A matched route together with its captured path parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: PathParams,
}

/// An immutable point-in-time view of the table.
#[derive(Debug, Default)]
pub struct RouteSnapshot {
    version: u64,
    routes: Vec<Route>,
}

impl RouteSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The table as definitions, in stored order.
    pub fn definitions(&self) -> Vec<RouteDefinition> {
        self.routes.iter().map(|r| r.definition.clone()).collect()
    }

    /// First route in stored order matching method and path.
    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route
                .matches(method, path)
                .map(|params| RouteMatch { route, params })
        })
    }
}

/// The active route table.
#[derive(Debug)]
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
    write_lock: Mutex<()>,
    /// Upper bound (exclusive) for a route's delay, if any.
    max_delay: Option<Duration>,
}

impl RouteTable {
    /// An empty table at version 0.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RouteSnapshot::default()),
            write_lock: Mutex::new(()),
            max_delay: None,
        }
    }

    /// An empty table that rejects routes delayed by `max_delay` or more.
    ///
    /// The server passes its request timeout here so a delayed route can
    /// always answer before the timeout fires.
    pub fn with_max_delay(max_delay: Duration) -> Self {
        Self {
            max_delay: Some(max_delay),
            ..Self::new()
        }
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Build a table from initial definitions (version 1).
    pub fn from_definitions(definitions: Vec<RouteDefinition>) -> Result<Self, RouteTableError> {
        let table = Self::new();
        table.replace(definitions)?;
        Ok(table)
    }

    /// Validate and atomically swap in a new table. Returns the new version.
    ///
    /// On failure the previous table stays active.
    pub fn replace(&self, definitions: Vec<RouteDefinition>) -> Result<u64, RouteTableError> {
        self.apply(definitions).map(|snapshot| snapshot.version)
    }

    /// Like [`RouteTable::replace`], but hands back the snapshot this call
    /// published, even if another writer has replaced it since.
    pub fn apply(&self, definitions: Vec<RouteDefinition>) -> Result<Arc<RouteSnapshot>, RouteTableError> {
        let routes = compile_routes_bounded(definitions, self.max_delay).map_err(RouteTableError::Invalid)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let version = self.current.load().version + 1;
        let snapshot = Arc::new(RouteSnapshot { version, routes });
        self.current.store(Arc::clone(&snapshot));

        tracing::info!(version, routes = snapshot.len(), "Route table replaced");
        Ok(snapshot)
    }

    /// Current snapshot; holds the table alive for as long as it is kept.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}
