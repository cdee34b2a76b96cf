//! 🧦 socks-gateway is a transparent http forwarding gateway.
//!
//! Every inbound http request is re-issued against a fixed upstream base url,
//! with the outbound connection tunneled through a SOCKS5 proxy rather than
//! dialed directly. Method, headers (minus `Host`), raw query and body are
//! passed through as-is, and the upstream response is streamed back
//! frame by frame, which keeps long-lived event streams (SSE) working.
//!
//! The building blocks:
//!
//! - [`dialer::TunnelDialer`]: opens tcp connections through the SOCKS5 proxy;
//! - [`connector::TunnelConnector`]: the transport the http client dials with,
//!   layering tls on top of the tunnel for `https` upstreams;
//! - [`http::transform`]: turns an inbound request into the outbound one;
//! - [`http::forward::Forwarder`]: dispatches and relays, translating failures
//!   into gateway responses;
//! - [`server::Gateway`]: the accept loop serving the [`http::forward::Forwarder`].
//!
//! ```no_run
//! use socks_gateway::{config::ProxyConfig, server::Gateway};
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> Result<(), socks_gateway::error::BoxError> {
//! let config = ProxyConfig::new("127.0.0.1:1080", "https://api.example.com")?;
//! let gateway = Gateway::try_new(config)?;
//! let listener = TcpListener::bind("127.0.0.1:11434").await?;
//! gateway.serve(listener).await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

#[macro_use]
mod macros;

pub mod address;
pub mod config;
pub mod connector;
pub mod dialer;
pub mod error;
pub mod http;
pub mod server;
pub mod socks5;
pub mod tls;
