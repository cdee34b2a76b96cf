//! SOCKS5 client support.
//!
//! - The [`Socks5Client`] performs the client side of the handshake
//!   on an already established stream to the proxy;
//! - the [`proto`] module holds the wire messages, for both sides.

pub mod proto;

mod client;
pub use client::{HandshakeError, Socks5Client};
