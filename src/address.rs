//! Destination addresses, as they are handed to the SOCKS5 proxy.
//!
//! Host names are kept as names: resolution happens at the proxy,
//! never locally.

use crate::error::{ErrorContext, OpaqueError};
use http::Uri;
use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

/// Default port of the `http` scheme.
pub const HTTP_DEFAULT_PORT: u16 = 80;
/// Default port of the `https` scheme.
pub const HTTPS_DEFAULT_PORT: u16 = 443;

/// Longest domain name that fits the SOCKS5 DOMAINNAME address type.
pub const MAX_DOMAIN_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Either a name or an ip address.
pub enum Host {
    /// A host name, resolved by the proxy.
    Name(String),
    /// An ip literal.
    Address(IpAddr),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Address(ip) => ip.fmt(f),
        }
    }
}

impl From<IpAddr> for Host {
    fn from(ip: IpAddr) -> Self {
        Self::Address(ip)
    }
}

impl From<Ipv4Addr> for Host {
    fn from(ip: Ipv4Addr) -> Self {
        Self::Address(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for Host {
    fn from(ip: Ipv6Addr) -> Self {
        Self::Address(IpAddr::V6(ip))
    }
}

impl TryFrom<&str> for Host {
    type Error = OpaqueError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Err(OpaqueError::from_display("empty host"));
        }

        let unbracketed = s
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(s);
        if let Ok(ip) = unbracketed.parse::<IpAddr>() {
            return Ok(Self::Address(ip));
        }
        if unbracketed.len() != s.len() {
            return Err(OpaqueError::from_display(
                "brackets are only allowed around an IPv6 address",
            ));
        }

        if s.len() > MAX_DOMAIN_LEN {
            return Err(OpaqueError::from_display(format!(
                "domain name exceeds {MAX_DOMAIN_LEN} bytes"
            )));
        }
        if s.bytes()
            .any(|b| b.is_ascii_whitespace() || b.is_ascii_control() || b == b'/' || b == b':')
        {
            return Err(OpaqueError::from_display("invalid character in domain name"));
        }

        Ok(Self::Name(s.to_owned()))
    }
}

/// A [`Host`] with an associated port.
///
/// ## Examples
///
/// - `example.com:80`
/// - `127.0.0.1:80`
/// - `[::1]:80`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostWithPort {
    pub host: Host,
    pub port: u16,
}

impl HostWithPort {
    /// Creates a new [`HostWithPort`].
    #[must_use]
    pub const fn new(host: Host, port: u16) -> Self {
        Self { host, port }
    }

    /// Derive the destination of an absolute `http` or `https` [`Uri`],
    /// using the default port of the scheme when none is given.
    pub fn try_from_uri(uri: &Uri) -> Result<Self, OpaqueError> {
        let default_port = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("http") => HTTP_DEFAULT_PORT,
            Some(s) if s.eq_ignore_ascii_case("https") => HTTPS_DEFAULT_PORT,
            Some(s) => {
                return Err(OpaqueError::from_display(format!(
                    "unsupported scheme: {s}"
                )));
            }
            None => return Err(OpaqueError::from_display("missing scheme in uri")),
        };
        let host = uri.host().context("missing host in uri")?;
        let host = Host::try_from(host).context("parse host from uri")?;
        Ok(Self {
            host,
            port: uri.port_u16().unwrap_or(default_port),
        })
    }
}

impl From<std::net::SocketAddr> for HostWithPort {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(Host::Address(addr.ip()), addr.port())
    }
}

impl fmt::Display for HostWithPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Name(name) => write!(f, "{}:{}", name, self.port),
            Host::Address(IpAddr::V4(ip)) => write!(f, "{}:{}", ip, self.port),
            Host::Address(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

impl std::str::FromStr for HostWithPort {
    type Err = OpaqueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl TryFrom<&str> for HostWithPort {
    type Error = OpaqueError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let (host, port) = s
            .rsplit_once(':')
            .context("missing port in host-with-port")?;
        let port = port.parse::<u16>().context("parse port from host-with-port")?;
        let host = Host::try_from(host).context("parse host from host-with-port")?;
        match host {
            Host::Address(IpAddr::V6(_)) if !s.starts_with('[') => Err(OpaqueError::from_display(
                "missing brackets for IPv6 address with port (in host-with-port)",
            )),
            _ => Ok(Self { host, port }),
        }
    }
}
