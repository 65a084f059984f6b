//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile route patterns once, at registration time
//! - Match the full request path (never a prefix)
//!
//! # Design Decisions
//! - Patterns use the `regex` crate dialect
//! - Every pattern is implicitly anchored at both ends, so `^`/`$` are optional
//! - Matching is case-sensitive
//! - Named groups are accepted but their captures are not exposed

use regex::Regex;
use std::fmt;

/// A compiled path pattern.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `expr` into a full-path matcher.
    pub fn new(expr: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", expr))?;
        Ok(Self {
            source: expr.to_string(),
            regex,
        })
    }

    /// Compile `expr`, panicking if it is not a valid pattern.
    ///
    /// Intended for route tables assembled at startup, where a malformed
    /// pattern must stop the process before it starts serving.
    pub fn build(expr: &str) -> Self {
        match Self::new(expr) {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::error!(pattern = %expr, error = %e, "Invalid route pattern");
                panic!("invalid route pattern {:?}: {}", expr, e);
            }
        }
    }

    /// Returns true if the whole of `path` matches.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The expression this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Pattern {
    type Err = regex::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_match() {
        let pattern = Pattern::new(r"/v1/jobs/[^/]+").unwrap();
        assert!(pattern.matches("/v1/jobs/42"));
        assert!(!pattern.matches("/v1/jobs/42/events")); // Not a prefix match
        assert!(!pattern.matches("/api/v1/jobs/42"));
        assert!(!pattern.matches("/v1/jobs/"));
    }

    #[test]
    fn test_explicit_anchors_accepted() {
        let pattern = Pattern::new(r"^/v1/jobs/(?P<Id>[^\s/]+)$").unwrap();
        assert!(pattern.matches("/v1/jobs/job_123"));
        assert!(!pattern.matches("/v1/jobs/job 123"));
    }

    #[test]
    fn test_alternation_is_anchored() {
        // Without the group wrapper this would match any path containing "/b".
        let pattern = Pattern::new("/a|/b").unwrap();
        assert!(pattern.matches("/a"));
        assert!(pattern.matches("/b"));
        assert!(!pattern.matches("/a/b"));
    }

    #[test]
    fn test_case_sensitive() {
        let pattern = Pattern::new("/v1").unwrap();
        assert!(pattern.matches("/v1"));
        assert!(!pattern.matches("/V1"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Pattern::new("/v1/(unclosed").is_err());
    }

    #[test]
    #[should_panic(expected = "invalid route pattern")]
    fn test_build_panics_on_invalid() {
        Pattern::build("[");
    }

    #[test]
    fn test_source_preserved() {
        let pattern: Pattern = "/health".parse().unwrap();
        assert_eq!(pattern.as_str(), "/health");
        assert_eq!(pattern.to_string(), "/health");
    }
}
