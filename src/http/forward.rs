//! The forwarding handler: one inbound request in, one upstream exchange out.

use super::{
    GatewayBody, RelayBody, response,
    transform::{compose_target_url, transform_request},
};
use crate::{
    connector::TunnelConnector,
    error::{BoxError, ErrorExt},
};
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;
use http_body_util::BodyExt;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use std::{fmt, sync::Arc};

#[derive(Debug, Clone)]
/// Re-issues inbound requests against the upstream base url.
///
/// Every failure is turned into a response:
/// `500` when the outbound request cannot be built,
/// `502` when it cannot be delivered or answered.
pub struct Forwarder {
    target_base_url: Arc<str>,
    client: Client<TunnelConnector, GatewayBody>,
}

impl Forwarder {
    /// Create a new [`Forwarder`] dispatching through the given connector.
    pub fn new(target_base_url: impl AsRef<str>, connector: TunnelConnector) -> Self {
        Self {
            target_base_url: Arc::from(target_base_url.as_ref()),
            client: Client::builder(TokioExecutor::new()).build(connector),
        }
    }

    /// Forward `req` upstream and relay the answer.
    ///
    /// The request body is streamed upstream, and the upstream response
    /// is streamed back frame by frame, with its status and headers as-is.
    pub async fn forward<B>(&self, req: Request<B>) -> Response<GatewayBody>
    where
        B: Body<Data = Bytes, Error: Into<BoxError>> + Send + 'static,
    {
        let target_url =
            compose_target_url(&self.target_base_url, req.uri().path(), req.uri().query());
        tracing::info!(method = %req.method(), %target_url, "forwarding request");

        let req = req.map(|body| body.map_err(Into::into).boxed_unsync());
        let outbound = match transform_request(req, &target_url) {
            Ok(outbound) => outbound,
            Err(err) => {
                tracing::error!(error = %err.display_chain(), "request construction failed");
                return response::construction_failed(&err);
            }
        };

        let upstream = match self.client.request(outbound).await {
            Ok(upstream) => upstream,
            Err(err) => {
                let err = DispatchError { source: err };
                tracing::warn!(
                    %target_url,
                    connect = err.is_connect(),
                    error = %err.display_chain(),
                    "proxy request failed",
                );
                return response::dispatch_failed(&err);
            }
        };

        let (parts, body) = upstream.into_parts();
        tracing::debug!(%target_url, status = %parts.status, "upstream responded");

        let mut response = Response::new(RelayBody::new(body).map_err(Into::into).boxed_unsync());
        *response.status_mut() = parts.status;
        *response.headers_mut() = parts.headers;
        response
    }
}

#[derive(Debug)]
/// The upstream request could not be delivered or answered:
/// proxy unreachable, handshake refused, tls failure or broken upstream.
pub struct DispatchError {
    source: hyper_util::client::legacy::Error,
}

impl DispatchError {
    /// Returns `true` if no connection to the upstream could be established.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        self.source.is_connect()
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send request upstream")
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::TunnelDialer;
    use http::{StatusCode, header};
    use http_body_util::Full;
    use tokio::net::TcpListener;

    fn forwarder(proxy_address: &str, target_base_url: &str) -> Forwarder {
        let dialer = TunnelDialer::try_new(proxy_address).unwrap();
        Forwarder::new(target_base_url, TunnelConnector::try_new(dialer).unwrap())
    }

    async fn unreachable_proxy_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_forward_invalid_target_url() {
        let forwarder = forwarder("127.0.0.1:1", "http://exa mple.com");

        let req = Request::builder()
            .uri("/v1")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = forwarder.forward(req).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("request construction failed: "), "{body}");
        assert!(body.ends_with('\n'), "{body}");
    }

    #[tokio::test]
    async fn test_forward_proxy_unreachable() {
        let proxy_address = unreachable_proxy_address().await;
        let forwarder = forwarder(&proxy_address, "http://upstream.internal");

        let req = Request::builder()
            .uri("/health")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = forwarder.forward(req).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("proxy request failed: "), "{body}");
        assert!(body.contains("connect to socks5 proxy"), "{body}");
    }
}
