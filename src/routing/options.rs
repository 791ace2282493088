//! Route options supplied once at attach time.

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use thiserror::Error;

use crate::config::RouteConfig;
use crate::routing::matcher::{Matcher, PredicateMatcher};

/// Path prefix claimed when none is configured.
pub const DEFAULT_ROUTE: &str = "/yeti";

/// `Upgrade` header value identifying the hub's native protocol.
pub const DEFAULT_UPGRADE_TOKEN: &str = "Blizzard-Yeti";

/// Upgrade paths claimed on behalf of the embedded socket library.
pub const DEFAULT_RESERVED_UPGRADE_PREFIXES: &[&str] = &["/socket.io"];

/// Invalid route options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route prefix `{0}` must be non-empty and start with `/`")]
    InvalidPrefix(String),

    #[error("upgrade token `{0}` is not a valid header value")]
    InvalidToken(String),
}

/// What a router claims.
#[derive(Debug)]
pub struct RouteOptions {
    route: String,
    upgrade_token: String,
    reserved_upgrade_prefixes: Vec<String>,
    upgrade_predicates: Vec<Box<dyn Matcher>>,
}

impl RouteOptions {
    /// Options claiming `route`, with the default upgrade rules.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    /// Replace the upgrade protocol token.
    pub fn upgrade_token(mut self, token: impl Into<String>) -> Self {
        self.upgrade_token = token.into();
        self
    }

    /// Replace the list of reserved upgrade path prefixes. An empty list
    /// turns the path-based upgrade claim off.
    pub fn reserved_upgrade_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_upgrade_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Also claim upgrades for which `predicate` returns true. Checked after
    /// the reserved prefixes and the token.
    pub fn claim_upgrades_when<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Request<Body>) -> bool + Send + Sync + 'static,
    {
        self.upgrade_predicates
            .push(Box::new(PredicateMatcher::new(name, predicate)));
        self
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn token(&self) -> &str {
        &self.upgrade_token
    }

    pub fn reserved_prefixes(&self) -> &[String] {
        &self.reserved_upgrade_prefixes
    }

    /// Check the options, returning the parsed token header value.
    pub fn validate(&self) -> Result<HeaderValue, RouteError> {
        check_prefix(&self.route)?;
        for prefix in &self.reserved_upgrade_prefixes {
            check_prefix(prefix)?;
        }
        if self.upgrade_token.is_empty() {
            return Err(RouteError::InvalidToken(self.upgrade_token.clone()));
        }
        HeaderValue::from_str(&self.upgrade_token)
            .map_err(|_| RouteError::InvalidToken(self.upgrade_token.clone()))
    }

    pub(crate) fn into_parts(self) -> (String, Vec<String>, Vec<Box<dyn Matcher>>) {
        (
            self.route,
            self.reserved_upgrade_prefixes,
            self.upgrade_predicates,
        )
    }
}

fn check_prefix(prefix: &str) -> Result<(), RouteError> {
    if prefix.starts_with('/') {
        Ok(())
    } else {
        Err(RouteError::InvalidPrefix(prefix.to_string()))
    }
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            route: DEFAULT_ROUTE.to_string(),
            upgrade_token: DEFAULT_UPGRADE_TOKEN.to_string(),
            reserved_upgrade_prefixes: DEFAULT_RESERVED_UPGRADE_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            upgrade_predicates: Vec::new(),
        }
    }
}

impl From<&RouteConfig> for RouteOptions {
    fn from(config: &RouteConfig) -> Self {
        RouteOptions::new(config.prefix.clone())
            .upgrade_token(config.upgrade_token.clone())
            .reserved_upgrade_prefixes(config.reserved_upgrade_prefixes.iter().cloned())
    }
}
