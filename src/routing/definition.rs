//! Route definitions as persisted and exchanged with the admin API.
//!
//! These are the loosely-typed wire shapes. They are checked and compiled
//! into [`crate::routing::router::Route`] when a table is replaced, so the
//! serving path never sees a half-valid definition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One configured endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteDefinition {
    /// HTTP verb. Stored uppercase once accepted into a table.
    #[serde(default)]
    pub method: String,

    /// Path pattern, e.g. `/users/:id` or `/users/{id}`.
    #[serde(default)]
    pub path: String,

    /// Template served when no match rule selects one.
    #[serde(
        default,
        alias = "responseTemplate",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_template: Option<String>,

    /// Require the auth gate to accept the request.
    #[serde(default, skip_serializing_if = "is_false")]
    pub auth: bool,

    /// Artificial latency in milliseconds.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub delay: u64,

    /// Conditional template selection.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_rule: Option<MatchDefinition>,
}

impl RouteDefinition {
    /// A plain route serving one template.
    pub fn new(method: impl Into<String>, path: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            response_template: Some(template.into()),
            auth: false,
            delay: 0,
            match_rule: None,
        }
    }

    pub fn with_auth(mut self) -> Self {
        self.auth = true;
        self
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = millis;
        self
    }

    pub fn with_match(mut self, rule: MatchDefinition) -> Self {
        self.match_rule = Some(rule);
        self
    }
}

/// Where the discriminating value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    #[default]
    Query,
    Body,
}

impl std::fmt::Display for MatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchSource::Query => f.write_str("query"),
            MatchSource::Body => f.write_str("body"),
        }
    }
}

/// Conditional response selection as written in the routes file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct MatchDefinition {
    #[serde(default)]
    pub source: MatchSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    /// Discriminator value → template name.
    #[serde(default)]
    pub cases: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl MatchDefinition {
    /// Select on a single field.
    pub fn field(source: MatchSource, field: impl Into<String>) -> Self {
        Self {
            source,
            field: Some(field.into()),
            ..Self::default()
        }
    }

    /// Select on several fields joined in order.
    pub fn fields<I, S>(source: MatchSource, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source,
            fields: Some(fields.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn case(mut self, value: impl Into<String>, template: impl Into<String>) -> Self {
        self.cases.insert(value.into(), template.into());
        self
    }

    pub fn or_default(mut self, template: impl Into<String>) -> Self {
        self.default = Some(template.into());
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}
