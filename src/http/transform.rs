//! Turning an inbound request into the request sent upstream.

use http::{Request, Uri, header::HOST};
use std::fmt;

/// Compose the upstream url for an inbound `path` and raw `query`.
///
/// The path is appended to `base` verbatim, dropping a single leading `/`
/// when `base` already ends with one. The query is appended as-is,
/// without re-encoding, and only when non-empty.
///
/// ```
/// use socks_gateway::http::transform::compose_target_url;
///
/// assert_eq!(
///     compose_target_url("https://api.example.com/v1/", "/models", Some("a=%20b")),
///     "https://api.example.com/v1/models?a=%20b",
/// );
/// assert_eq!(
///     compose_target_url("https://api.example.com", "/models", Some("")),
///     "https://api.example.com/models",
/// );
/// ```
#[must_use]
pub fn compose_target_url(base: &str, path: &str, query: Option<&str>) -> String {
    let path = if base.ends_with('/') {
        path.strip_prefix('/').unwrap_or(path)
    } else {
        path
    };

    let query = query.filter(|q| !q.is_empty());
    let mut url = String::with_capacity(
        base.len() + path.len() + query.map(|q| q.len() + 1).unwrap_or_default(),
    );
    url.push_str(base);
    url.push_str(path);
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Build the outbound request for `target_url`.
///
/// Method, headers and body are carried over from the inbound request,
/// minus the `Host` header. The body is moved, not buffered.
/// The outbound request is always `HTTP/1.1`, whatever the inbound version.
pub fn transform_request<B>(
    req: Request<B>,
    target_url: &str,
) -> Result<Request<B>, ConstructionError> {
    let uri: Uri = target_url.parse().map_err(|err| ConstructionError {
        target_url: target_url.to_owned(),
        source: err,
    })?;

    let (parts, body) = req.into_parts();
    let mut headers = parts.headers;
    headers.remove(HOST);

    let mut outbound = Request::new(body);
    *outbound.method_mut() = parts.method;
    *outbound.uri_mut() = uri;
    *outbound.headers_mut() = headers;

    Ok(outbound)
}

#[derive(Debug)]
/// The outbound request could not be constructed.
pub struct ConstructionError {
    target_url: String,
    source: http::uri::InvalidUri,
}

impl ConstructionError {
    /// The url the request was aimed at.
    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid target url {:?}", self.target_url)
    }
}

impl std::error::Error for ConstructionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
