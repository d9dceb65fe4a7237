//! Route table validation.
//!
//! # Responsibilities
//! - Check every definition for structural well-formedness
//! - Normalize methods to uppercase
//! - Compile path patterns and match rules for the serving path
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Duplicate (method, path) pairs are allowed; lookup is first-match
//! - Pure function: definitions in, compiled routes or errors out

use axum::http::Method;
use std::time::Duration;
use thiserror::Error;

use crate::routing::definition::{MatchDefinition, RouteDefinition};
use crate::routing::matcher::{PathPattern, PatternError};
use crate::routing::router::Route;
use crate::routing::selection::{MatchRule, Selector};

/// A single problem with one route definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route #{index} ({method} {path}): {issue}")]
pub struct ValidationError {
    /// Position of the route in the submitted list.
    pub index: usize,
    pub method: String,
    pub path: String,
    pub issue: ValidationIssue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("missing method")]
    MissingMethod,
    #[error("invalid method {0:?}")]
    InvalidMethod(String),
    #[error("missing path")]
    MissingPath,
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PatternError),
    #[error("neither response_template nor match.default is set")]
    NoTemplate,
    #[error("match needs `field` or `fields`")]
    MissingSelector,
    #[error("match sets both `field` and `fields`")]
    AmbiguousSelector,
    #[error("match `fields` is empty or names an empty field")]
    EmptyFields,
    #[error("match has no cases and no default")]
    EmptyCases,
    #[error("delay of {delay_ms}ms must be below the request timeout ({limit_ms}ms)")]
    DelayTooLong { delay_ms: u64, limit_ms: u64 },
}

/// Validate and compile a full set of definitions.
pub fn compile_routes(definitions: Vec<RouteDefinition>) -> Result<Vec<Route>, Vec<ValidationError>> {
    compile_routes_bounded(definitions, None)
}

/// Like [`compile_routes`], also rejecting any delay of `max_delay` or more.
pub fn compile_routes_bounded(
    definitions: Vec<RouteDefinition>,
    max_delay: Option<Duration>,
) -> Result<Vec<Route>, Vec<ValidationError>> {
    let mut routes = Vec::with_capacity(definitions.len());
    let mut errors = Vec::new();

    for (index, definition) in definitions.into_iter().enumerate() {
        match compile_route(index, definition, max_delay) {
            Ok(route) => routes.push(route),
            Err(mut route_errors) => errors.append(&mut route_errors),
        }
    }

    if errors.is_empty() {
        Ok(routes)
    } else {
        Err(errors)
    }
}

fn compile_route(
    index: usize,
    mut definition: RouteDefinition,
    max_delay: Option<Duration>,
) -> Result<Route, Vec<ValidationError>> {
    let mut issues = Vec::new();

    definition.method = definition.method.trim().to_ascii_uppercase();
    if definition.method.is_empty() {
        issues.push(ValidationIssue::MissingMethod);
    } else if Method::from_bytes(definition.method.as_bytes()).is_err() {
        issues.push(ValidationIssue::InvalidMethod(definition.method.clone()));
    }

    let pattern = if definition.path.is_empty() {
        issues.push(ValidationIssue::MissingPath);
        None
    } else {
        match PathPattern::parse(&definition.path) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                issues.push(e.into());
                None
            }
        }
    };

    let has_route_template = definition
        .response_template
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    let has_match_default = definition
        .match_rule
        .as_ref()
        .and_then(|m| m.default.as_deref())
        .is_some_and(|t| !t.is_empty());
    if !has_route_template && !has_match_default {
        issues.push(ValidationIssue::NoTemplate);
    }

    let delay = Duration::from_millis(definition.delay);
    if let Some(limit) = max_delay.filter(|limit| delay >= *limit) {
        issues.push(ValidationIssue::DelayTooLong {
            delay_ms: definition.delay,
            limit_ms: limit.as_millis() as u64,
        });
    }

    let rule = match definition.match_rule.as_ref().map(compile_rule).transpose() {
        Ok(rule) => rule,
        Err(mut rule_issues) => {
            issues.append(&mut rule_issues);
            None
        }
    };

    match pattern {
        Some(pattern) if issues.is_empty() => Ok(Route::new(
            index,
            pattern,
            rule,
            delay,
            definition,
        )),
        _ => Err(issues
            .into_iter()
            .map(|issue| ValidationError {
                index,
                method: definition.method.clone(),
                path: definition.path.clone(),
                issue,
            })
            .collect()),
    }
}

fn compile_rule(def: &MatchDefinition) -> Result<MatchRule, Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let selector = match (&def.field, &def.fields) {
        (Some(_), Some(_)) => {
            issues.push(ValidationIssue::AmbiguousSelector);
            None
        }
        (Some(field), None) if !field.is_empty() => Some(Selector::Field(field.clone())),
        (None, Some(fields)) if !fields.is_empty() && fields.iter().all(|f| !f.is_empty()) => {
            Some(Selector::Fields(fields.clone()))
        }
        (None, Some(_)) => {
            issues.push(ValidationIssue::EmptyFields);
            None
        }
        _ => {
            issues.push(ValidationIssue::MissingSelector);
            None
        }
    };

    let has_default = def.default.as_deref().is_some_and(|d| !d.is_empty());
    if def.cases.is_empty() && !has_default {
        issues.push(ValidationIssue::EmptyCases);
    }

    match selector {
        Some(selector) if issues.is_empty() => Ok(MatchRule {
            source: def.source,
            selector,
            cases: def.cases.clone(),
            default: def.default.clone().filter(|d| !d.is_empty()),
        }),
        _ => Err(issues),
    }
}
