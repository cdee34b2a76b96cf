//! Responses generated by the gateway itself.

use super::GatewayBody;
use crate::error::ErrorExt;
use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header};
use http_body_util::{BodyExt, Full};

/// Plain-text error response: the message followed by a newline.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response<GatewayBody> {
    let mut body = message.into();
    body.push('\n');

    let mut response = Response::new(
        Full::new(Bytes::from(body))
            .map_err(|never| match never {})
            .boxed_unsync(),
    );
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// `500` for a request that could not be built.
pub fn construction_failed(err: &super::ConstructionError) -> Response<GatewayBody> {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("request construction failed: {}", err.display_chain()),
    )
}

/// `502` for a request that could not be dispatched.
pub fn dispatch_failed(err: &super::DispatchError) -> Response<GatewayBody> {
    error_response(
        StatusCode::BAD_GATEWAY,
        format!("proxy request failed: {}", err.display_chain()),
    )
}
