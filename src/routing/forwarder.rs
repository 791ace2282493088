//! Claim-or-passthrough decision and forwarding to the sub-application.
//!
//! # Responsibilities
//! - Requests: prefix test, URI rewrite, re-emit to the sub-application
//! - Upgrades: reserved prefix / token / predicate test, re-emit unmodified
//! - Report `Dispatch` so the caller knows whether to replay
//!
//! # Design Decisions
//! - A request is only mutated once it is certain to be claimed
//! - A URL that cannot be rebuilt falls through to the host instead of
//!   failing the request
//! - The upgrade socket is never read, written, taken or closed here

use axum::body::{Body, Bytes};
use axum::http::Request;
use std::fmt;
use std::sync::Arc;

use crate::http::{ResponseSink, UpgradeSocket};
use crate::observability::metrics;
use crate::routing::matcher::{AnyMatcher, Matcher, PathPrefixMatcher, UpgradeTokenMatcher};
use crate::routing::options::{RouteError, RouteOptions};
use crate::server::{EventKind, HostServer};

/// Outcome of a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the sub-application; the original chain must not run.
    Claimed,
    /// Not ours; the original chain must run.
    Passthrough,
}

impl Dispatch {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Dispatch::Claimed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dispatch::Claimed => "claimed",
            Dispatch::Passthrough => "passthrough",
        }
    }
}

/// Consumer of claimed traffic.
///
/// Receives requests with the route prefix already stripped, and upgrades
/// exactly as the host runtime delivered them.
pub trait SubApplication: Send + Sync {
    fn request(&self, req: &mut Request<Body>, res: &ResponseSink);

    fn upgrade(&self, req: &Request<Body>, socket: &UpgradeSocket, head: &Bytes);
}

impl SubApplication for HostServer {
    fn request(&self, req: &mut Request<Body>, res: &ResponseSink) {
        self.emit_request(req, res);
    }

    fn upgrade(&self, req: &Request<Body>, socket: &UpgradeSocket, head: &Bytes) {
        self.emit_upgrade(req, socket, head);
    }
}

/// Decides and forwards claimed traffic.
pub struct RouteForwarder {
    route: PathPrefixMatcher,
    upgrades: AnyMatcher,
    app: Arc<dyn SubApplication>,
}

impl RouteForwarder {
    /// Build a forwarder. Upgrade conditions are evaluated in order:
    /// reserved prefixes, then the token, then injected predicates.
    pub fn new(options: RouteOptions, app: Arc<dyn SubApplication>) -> Result<Self, RouteError> {
        let token = options.validate()?;
        let (route, reserved, predicates) = options.into_parts();

        let mut upgrades: Vec<Box<dyn Matcher>> = reserved
            .into_iter()
            .map(|prefix| Box::new(PathPrefixMatcher::new(prefix)) as Box<dyn Matcher>)
            .collect();
        upgrades.push(Box::new(UpgradeTokenMatcher::new(token)));
        upgrades.extend(predicates);

        Ok(Self {
            route: PathPrefixMatcher::new(route),
            upgrades: AnyMatcher::new(upgrades),
            app,
        })
    }

    pub fn route(&self) -> &str {
        self.route.prefix()
    }

    /// Claim the request if its path starts with the route prefix.
    pub fn forward_request(&self, req: &mut Request<Body>, res: &ResponseSink) -> Dispatch {
        let rewritten = match self.route.strip(req.uri()) {
            Ok(Some(uri)) => uri,
            Ok(None) => return self.record(EventKind::Request, Dispatch::Passthrough),
            Err(e) => {
                tracing::warn!(route = %self.route(), error = %e, "Unroutable URL, passing through");
                return self.record(EventKind::Request, Dispatch::Passthrough);
            }
        };

        tracing::debug!(
            route = %self.route(),
            method = %req.method(),
            from = %req.uri(),
            to = %rewritten,
            "Request claimed"
        );

        *req.uri_mut() = rewritten;
        self.app.request(req, res);
        self.record(EventKind::Request, Dispatch::Claimed)
    }

    /// Claim the upgrade if it matches any upgrade condition.
    pub fn forward_upgrade(&self, req: &Request<Body>, socket: &UpgradeSocket, head: &Bytes) -> Dispatch {
        if !self.upgrades.matches(req) {
            return self.record(EventKind::Upgrade, Dispatch::Passthrough);
        }

        tracing::debug!(
            path = %req.uri().path(),
            upgrade = ?req.headers().get(axum::http::header::UPGRADE),
            head_len = head.len(),
            "Upgrade claimed"
        );

        self.app.upgrade(req, socket, head);
        self.record(EventKind::Upgrade, Dispatch::Claimed)
    }

    fn record(&self, event: EventKind, outcome: Dispatch) -> Dispatch {
        metrics::record_dispatch(event, outcome);
        outcome
    }
}

impl fmt::Debug for RouteForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteForwarder")
            .field("route", &self.route)
            .field("upgrades", &self.upgrades)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records what reached it.
    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<String>>,
        upgrades: Mutex<Vec<String>>,
    }

    impl SubApplication for Recorder {
        fn request(&self, req: &mut Request<Body>, _res: &ResponseSink) {
            self.requests.lock().unwrap().push(req.uri().to_string());
        }

        fn upgrade(&self, req: &Request<Body>, _socket: &UpgradeSocket, _head: &Bytes) {
            self.upgrades.lock().unwrap().push(req.uri().to_string());
        }
    }

    fn forwarder(options: RouteOptions) -> (RouteForwarder, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let forwarder = RouteForwarder::new(options, recorder.clone()).unwrap();
        (forwarder, recorder)
    }

    fn socket() -> UpgradeSocket {
        let (sink, _rx) = ResponseSink::channel();
        UpgradeSocket::new(sink, hyper::upgrade::on(&mut Request::new(())))
    }

    fn upgrade_request(uri: &str, protocol: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Connection", "Upgrade")
            .header("Upgrade", protocol)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn claims_and_rewrites_prefixed_request() {
        let (forwarder, app) = forwarder(RouteOptions::new("/app"));
        let (sink, _rx) = ResponseSink::channel();
        let mut req = Request::builder()
            .uri("/app/widgets?id=5")
            .body(Body::empty())
            .unwrap();

        assert_eq!(forwarder.forward_request(&mut req, &sink), Dispatch::Claimed);
        assert_eq!(req.uri(), "/widgets?id=5");
        assert_eq!(*app.requests.lock().unwrap(), ["/widgets?id=5"]);
    }

    #[test]
    fn claims_textual_prefix_match_with_rooted_path() {
        let (forwarder, app) = forwarder(RouteOptions::new("/app"));
        let (sink, _rx) = ResponseSink::channel();
        let mut req = Request::builder()
            .uri("/apple?q=1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(forwarder.forward_request(&mut req, &sink), Dispatch::Claimed);
        assert_eq!(req.uri(), "/le?q=1");
        assert_eq!(*app.requests.lock().unwrap(), ["/le?q=1"]);
    }

    #[test]
    fn leaves_other_requests_alone() {
        let (forwarder, app) = forwarder(RouteOptions::new("/app"));
        let (sink, _rx) = ResponseSink::channel();
        let mut req = Request::builder()
            .uri("/other?app=1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(forwarder.forward_request(&mut req, &sink), Dispatch::Passthrough);
        assert_eq!(req.uri(), "/other?app=1");
        assert!(app.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn token_claims_regardless_of_path() {
        let (forwarder, app) = forwarder(RouteOptions::default());
        let req = upgrade_request("/anything/at/all", "Blizzard-Yeti");
        let socket = socket();

        assert_eq!(
            forwarder.forward_upgrade(&req, &socket, &Bytes::new()),
            Dispatch::Claimed
        );
        assert!(socket.is_available());
        assert_eq!(app.upgrades.lock().unwrap().len(), 1);
    }

    #[test]
    fn reserved_prefix_claims_upgrade() {
        let (forwarder, _app) = forwarder(RouteOptions::default());
        let req = upgrade_request("/socket.io/?transport=websocket", "websocket");
        assert!(forwarder
            .forward_upgrade(&req, &socket(), &Bytes::new())
            .is_claimed());
    }

    #[test]
    fn foreign_upgrade_passes_through() {
        let (forwarder, app) = forwarder(RouteOptions::default());
        let req = upgrade_request("/chat", "websocket");
        let socket = socket();

        assert_eq!(
            forwarder.forward_upgrade(&req, &socket, &Bytes::from_static(b"early")),
            Dispatch::Passthrough
        );
        assert!(socket.is_available());
        assert!(app.upgrades.lock().unwrap().is_empty());
    }

    #[test]
    fn reserved_prefixes_can_be_disabled() {
        let (forwarder, _app) =
            forwarder(RouteOptions::default().reserved_upgrade_prefixes(Vec::<String>::new()));
        let req = upgrade_request("/socket.io/", "websocket");
        assert!(!forwarder
            .forward_upgrade(&req, &socket(), &Bytes::new())
            .is_claimed());
    }

    #[test]
    fn injected_predicate_claims_upgrade() {
        let (forwarder, _app) = forwarder(
            RouteOptions::default().claim_upgrades_when("graphql-ws", |req| {
                req.headers()
                    .get("sec-websocket-protocol")
                    .map(|v| v == "graphql-ws")
                    .unwrap_or(false)
            }),
        );
        let mut req = upgrade_request("/graphql", "websocket");
        req.headers_mut()
            .insert("sec-websocket-protocol", "graphql-ws".parse().unwrap());

        assert!(forwarder
            .forward_upgrade(&req, &socket(), &Bytes::new())
            .is_claimed());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let app: Arc<dyn SubApplication> = Arc::new(Recorder::default());
        assert!(RouteForwarder::new(RouteOptions::new("nope"), app).is_err());
    }
}
