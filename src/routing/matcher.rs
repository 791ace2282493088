//! Claim conditions for requests and upgrades.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive, plain string prefix)
//! - Match the `Upgrade` header against a protocol token (exact)
//! - Wrap injected predicates
//! - Combine conditions with OR semantics, first match wins
//!
//! # Design Decisions
//! - No normalisation beyond what URI parsing already did
//! - No regex, no wildcards
//! - Prefix stripping touches the path only; scheme, authority and query
//!   are carried over untouched

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{header, HeaderValue, Request, Uri};
use std::fmt;
use thiserror::Error;

/// Failure to rebuild a request URI after stripping the route prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("malformed URL `{uri}`: {reason}")]
    MalformedUrl { uri: String, reason: String },
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Rewrite `uri` with the prefix removed from the front of its path.
    ///
    /// `Ok(None)` if the path does not start with the prefix. Matching is
    /// textual, so the remainder is rooted when it does not already start
    /// with `/`: `/app` strips `/apple` to `/le` and `/app` to `/`.
    pub fn strip(&self, uri: &Uri) -> Result<Option<Uri>, RewriteError> {
        let Some(rest) = uri.path().strip_prefix(self.prefix.as_str()) else {
            return Ok(None);
        };

        let malformed = |reason: String| RewriteError::MalformedUrl {
            uri: uri.to_string(),
            reason,
        };

        let root = if rest.starts_with('/') { "" } else { "/" };
        let path_and_query = match uri.query() {
            Some(query) => format!("{root}{rest}?{query}"),
            None => format!("{root}{rest}"),
        };

        let mut parts = uri.clone().into_parts();
        parts.path_and_query =
            Some(PathAndQuery::try_from(path_and_query).map_err(|e| malformed(e.to_string()))?);

        Uri::from_parts(parts)
            .map(Some)
            .map_err(|e| malformed(e.to_string()))
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path().starts_with(&self.prefix)
    }
}

/// Matches the `Upgrade` header against a protocol token, byte for byte.
#[derive(Debug, Clone)]
pub struct UpgradeTokenMatcher {
    token: HeaderValue,
}

impl UpgradeTokenMatcher {
    pub fn new(token: HeaderValue) -> Self {
        Self { token }
    }
}

impl Matcher for UpgradeTokenMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(header::UPGRADE)
            .map(|value| value == self.token)
            .unwrap_or(false)
    }
}

/// Wraps an injected predicate.
pub struct PredicateMatcher {
    name: String,
    predicate: Box<dyn Fn(&Request<Body>) -> bool + Send + Sync>,
}

impl PredicateMatcher {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Request<Body>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl fmt::Debug for PredicateMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateMatcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Matcher for PredicateMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        (self.predicate)(req)
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        // Short-circuits on the first match
        self.matchers.iter().any(|m| m.matches(req))
    }
}
