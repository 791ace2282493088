//! Tower services as request listeners.
//!
//! Lets an `axum::Router` (or any `tower::Service`) sit in a listener chain,
//! either on the host server or on the sub-application.

use axum::body::Body;
use axum::http::{Request, Response};
use std::convert::Infallible;
use tower::{Service, ServiceExt};

use crate::http::ResponseSink;
use crate::server::{HostServer, RequestListener};

/// Runs a service for every request event and answers through the sink.
///
/// The request's method, URI, version and headers are copied; the body is
/// moved out, so listeners registered after this one see an empty body.
#[derive(Debug, Clone)]
pub struct ServiceListener<S> {
    service: S,
}

impl<S> ServiceListener<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> RequestListener for ServiceListener<S>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    fn on_request(&self, server: &HostServer, req: &mut Request<Body>, res: &ResponseSink) {
        let mut forwarded = Request::new(std::mem::take(req.body_mut()));
        *forwarded.method_mut() = req.method().clone();
        *forwarded.uri_mut() = req.uri().clone();
        *forwarded.version_mut() = req.version();
        *forwarded.headers_mut() = req.headers().clone();

        let service = self.service.clone();
        let res = res.clone();
        let server = server.name().to_string();

        tokio::spawn(async move {
            let response = match service.oneshot(forwarded).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if !res.send(response) {
                tracing::debug!(server = %server, "Response already sent, dropping service response");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    #[tokio::test]
    async fn answers_through_sink() {
        let server = HostServer::new("host");
        let router = Router::new().route("/widgets", get(|| async { "widgets" }));
        server.on_request(ServiceListener::new(router));

        let (sink, rx) = ResponseSink::channel();
        let mut req = Request::builder()
            .uri("/widgets?id=5")
            .body(Body::empty())
            .unwrap();
        server.emit_request(&mut req, &sink);

        let response = rx.await.unwrap();
        assert_eq!(response.status(), 200);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"widgets");
        assert_eq!(req.uri(), "/widgets?id=5");
    }
}
