//! The http side of the gateway: request transformation,
//! upstream dispatch and response relay.

use crate::error::BoxError;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;

pub mod body;
pub mod forward;
pub mod response;
pub mod transform;

#[doc(inline)]
pub use body::{RelayBody, StreamRelayError};
#[doc(inline)]
pub use forward::{DispatchError, Forwarder};
#[doc(inline)]
pub use transform::ConstructionError;

/// Body type of every response served by the gateway,
/// as well as of every request sent upstream.
pub type GatewayBody = UnsyncBoxBody<Bytes, BoxError>;
