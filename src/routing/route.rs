//! A single routing rule: pattern, allowed methods and handler.

use axum::http::Method;
use std::fmt;

use crate::routing::handler::BoxHandler;
use crate::routing::matcher::Pattern;

/// Error raised while registering a route.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("route {pattern:?} must allow at least one method")]
    NoMethods { pattern: String },

    #[error("route {pattern:?}: OPTIONS is answered automatically and cannot be registered")]
    ExplicitOptions { pattern: String },

    #[error("route {pattern:?}: invalid method {method:?}")]
    InvalidMethod { pattern: String, method: String },
}

/// A registered rule. Immutable once built.
#[derive(Clone)]
pub struct Route {
    pattern: Pattern,
    methods: Vec<Method>,
    handler: BoxHandler,
}

impl Route {
    pub(crate) fn new<M>(pattern: Pattern, methods: M, handler: BoxHandler) -> Result<Self, RouteError>
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let methods = normalize_methods(pattern.as_str(), methods)?;
        Ok(Self {
            pattern,
            methods,
            handler,
        })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Allowed methods, uppercase, in registration order.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub(crate) fn handler(&self) -> &BoxHandler {
        &self.handler
    }

    /// Returns true if `method` (already uppercase) is allowed.
    pub(crate) fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.as_str() == method)
    }

    /// Value of the `Allow` header for this route, e.g. `GET, POST, OPTIONS`.
    pub fn allow_header(&self) -> String {
        let mut allow: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        allow.push(Method::OPTIONS.as_str());
        allow.join(", ")
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// Uppercase, validate and de-duplicate a method list, keeping its order.
fn normalize_methods<M>(pattern: &str, methods: M) -> Result<Vec<Method>, RouteError>
where
    M: IntoIterator,
    M::Item: AsRef<str>,
{
    let mut normalized: Vec<Method> = Vec::new();
    for raw in methods {
        let upper = raw.as_ref().trim().to_ascii_uppercase();
        let method = Method::from_bytes(upper.as_bytes()).map_err(|_| RouteError::InvalidMethod {
            pattern: pattern.to_string(),
            method: raw.as_ref().to_string(),
        })?;
        if method == Method::OPTIONS {
            return Err(RouteError::ExplicitOptions {
                pattern: pattern.to_string(),
            });
        }
        if !normalized.contains(&method) {
            normalized.push(method);
        }
    }

    if normalized.is_empty() {
        return Err(RouteError::NoMethods {
            pattern: pattern.to_string(),
        });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Request;
    use std::sync::Arc;

    fn noop() -> BoxHandler {
        Arc::new(|_req: Request| async {})
    }

    #[test]
    fn test_methods_uppercased_and_deduplicated() {
        let route = Route::new(Pattern::build("/v1"), ["get", "Post", "GET"], noop()).unwrap();
        assert_eq!(route.methods(), &[Method::GET, Method::POST]);
        assert!(route.allows("GET"));
        assert!(!route.allows("DELETE"));
    }

    #[test]
    fn test_allow_header() {
        let route = Route::new(Pattern::build("/v1"), ["GET", "POST"], noop()).unwrap();
        assert_eq!(route.allow_header(), "GET, POST, OPTIONS");
    }

    #[test]
    fn test_empty_methods_rejected() {
        let err = Route::new(Pattern::build("/v1"), Vec::<String>::new(), noop()).unwrap_err();
        assert!(matches!(err, RouteError::NoMethods { .. }));
    }

    #[test]
    fn test_explicit_options_rejected() {
        let err = Route::new(Pattern::build("/v1"), ["GET", "options"], noop()).unwrap_err();
        assert!(matches!(err, RouteError::ExplicitOptions { .. }));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let err = Route::new(Pattern::build("/v1"), ["GE T"], noop()).unwrap_err();
        assert!(matches!(err, RouteError::InvalidMethod { .. }));
    }
}
