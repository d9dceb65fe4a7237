//! Template selection for a matched route.
//!
//! Given the request attributes named by a match rule, compute the
//! discriminator and pick a template: `cases[discriminator]`, then the
//! rule's `default`, then the route's own `response_template`.
//!
//! Comparisons are exact and case-sensitive on string values. Attribute
//! extraction turns every request value into its string form first, so a
//! JSON `1` and a query `1` select the same case.

use std::collections::{BTreeMap, HashMap};

use crate::routing::definition::MatchSource;
use crate::routing::matcher::PathParams;

/// Separator placed between values when a rule lists several `fields`.
///
/// Values are concatenated in listed order; a missing field contributes
/// the empty string. `a=1, b=2` under `fields = ["a", "b"]` yields `"12"`.
pub const FIELD_JOIN_SEPARATOR: &str = "";

/// Which request values feed the discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Field(String),
    Fields(Vec<String>),
}

/// A validated match rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub source: MatchSource,
    pub selector: Selector,
    pub cases: BTreeMap<String, String>,
    pub default: Option<String>,
}

impl MatchRule {
    /// Compute the discriminator for a set of attributes.
    pub fn discriminator(&self, attrs: &Attributes) -> String {
        match &self.selector {
            Selector::Field(name) => attrs.get(name).unwrap_or_default().to_string(),
            Selector::Fields(names) => names
                .iter()
                .map(|name| attrs.get(name).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(FIELD_JOIN_SEPARATOR),
        }
    }

    /// Names of the fields this rule reads, in order.
    pub fn field_names(&self) -> Vec<&str> {
        match &self.selector {
            Selector::Field(name) => vec![name.as_str()],
            Selector::Fields(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Request attributes keyed by field name, already in string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(HashMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Insert unless the field is already present; the first value wins.
    pub fn insert_first(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert_first(k, v);
        }
        attrs
    }
}

/// How the template was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedBy {
    Case,
    MatchDefault,
    RouteTemplate,
}

impl SelectedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectedBy::Case => "case",
            SelectedBy::MatchDefault => "match_default",
            SelectedBy::RouteTemplate => "route_template",
        }
    }
}

/// Outcome of template selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Template name with path parameters substituted.
    pub template: String,
    pub by: SelectedBy,
    /// Discriminator computed from the request, when a rule ran.
    pub discriminator: Option<String>,
}

/// Run selection. `None` means nothing resolves: no case fired and neither
/// the rule nor the route names a fallback template.
pub fn select(
    rule: Option<&MatchRule>,
    route_template: Option<&str>,
    attrs: &Attributes,
    params: &PathParams,
) -> Option<Selection> {
    let Some(rule) = rule else {
        return route_template.map(|name| Selection {
            template: expand_params(name, params),
            by: SelectedBy::RouteTemplate,
            discriminator: None,
        });
    };

    let discriminator = rule.discriminator(attrs);

    let (name, by) = if let Some(name) = rule.cases.get(&discriminator) {
        (name.as_str(), SelectedBy::Case)
    } else if let Some(name) = rule.default.as_deref().filter(|n| !n.is_empty()) {
        (name, SelectedBy::MatchDefault)
    } else {
        (route_template.filter(|n| !n.is_empty())?, SelectedBy::RouteTemplate)
    };

    Some(Selection {
        template: expand_params(name, params),
        by,
        discriminator: Some(discriminator),
    })
}

/// Substitute `{name}` placeholders with captured path parameters.
pub fn expand_params(template: &str, params: &PathParams) -> String {
    if params.is_empty() || !template.contains('{') {
        return template.to_string();
    }
    params.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}
