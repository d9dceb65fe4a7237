//! Structural route matching: method and path pattern.
//!
//! # Responsibilities
//! - Parse path patterns (`/users/:id`, `/users/{id}`)
//! - Match request paths segment by segment, capturing parameters
//!
//! # Design Decisions
//! - Path matching is case-sensitive, method matching is not
//! - A parameter spans exactly one non-empty segment
//! - No regex: patterns compile to a segment list once per table

use std::collections::BTreeMap;
use thiserror::Error;

/// Path parameters captured while matching, by name.
pub type PathParams = BTreeMap<String, String>;

/// Reason a path pattern was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("path must start with '/'")]
    MissingLeadingSlash,
    #[error("segment {0:?} declares a parameter without a name")]
    EmptyParam(String),
    #[error("segment {0:?} mixes a parameter with literal text")]
    MixedSegment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern. Both `:name` and `{name}` declare a parameter.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let rest = pattern
            .strip_prefix('/')
            .ok_or(PatternError::MissingLeadingSlash)?;

        let segments = rest
            .split('/')
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    /// Match a request path, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = PathParams::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        // Pattern exhausted; the path must be too.
        if parts.next().is_some() {
            return None;
        }

        Some(params)
    }

    /// Number of parameters declared by this pattern.
    pub fn param_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count()
    }
}

fn parse_segment(segment: &str) -> Result<Segment, PatternError> {
    if let Some(name) = segment.strip_prefix(':') {
        if name.is_empty() {
            return Err(PatternError::EmptyParam(segment.to_string()));
        }
        return Ok(Segment::Param(name.to_string()));
    }

    if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if inner.is_empty() {
            return Err(PatternError::EmptyParam(segment.to_string()));
        }
        if inner.contains(['{', '}']) {
            return Err(PatternError::MixedSegment(segment.to_string()));
        }
        return Ok(Segment::Param(inner.to_string()));
    }

    if segment.contains(['{', '}']) {
        return Err(PatternError::MixedSegment(segment.to_string()));
    }

    Ok(Segment::Literal(segment.to_string()))
}

/// Case-insensitive method comparison against a stored uppercase method.
pub fn method_matches(stored: &str, requested: &str) -> bool {
    stored.eq_ignore_ascii_case(requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let pattern = PathPattern::parse("/greet").unwrap();
        assert_eq!(pattern.matches("/greet"), Some(PathParams::new()));
        assert_eq!(pattern.matches("/greet/"), None);
        assert_eq!(pattern.matches("/Greet"), None); // Case sensitive
        assert_eq!(pattern.matches("/greet/extra"), None);
    }

    #[test]
    fn test_param_capture_both_syntaxes() {
        for raw in ["/users/:id/posts/:post", "/users/{id}/posts/{post}"] {
            let pattern = PathPattern::parse(raw).unwrap();
            assert_eq!(pattern.param_count(), 2);

            let params = pattern.matches("/users/42/posts/7").unwrap();
            assert_eq!(params.get("id").map(String::as_str), Some("42"));
            assert_eq!(params.get("post").map(String::as_str), Some("7"));

            assert!(pattern.matches("/users//posts/7").is_none());
            assert!(pattern.matches("/users/42/posts").is_none());
        }
    }

    #[test]
    fn test_root_path() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/a").is_none());
    }

    #[test]
    fn test_rejects_malformed_patterns() {
        assert_eq!(PathPattern::parse("users"), Err(PatternError::MissingLeadingSlash));
        assert!(matches!(PathPattern::parse("/users/:"), Err(PatternError::EmptyParam(_))));
        assert!(matches!(PathPattern::parse("/users/{}"), Err(PatternError::EmptyParam(_))));
        assert!(matches!(
            PathPattern::parse("/files/{name}.json"),
            Err(PatternError::MixedSegment(_))
        ));
    }

    #[test]
    fn test_method_matching() {
        assert!(method_matches("GET", "get"));
        assert!(method_matches("GET", "GET"));
        assert!(!method_matches("GET", "POST"));
    }
}
