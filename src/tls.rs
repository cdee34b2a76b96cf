//! Tls on top of a tunnel, for `https` upstreams.
//!
//! Server certificates are verified against the Mozilla root store
//! shipped by `webpki-roots`.

use crate::address::Host;
use rustls::{
    ClientConfig, RootCertStore,
    pki_types::{InvalidDnsNameError, ServerName},
};
use std::{fmt, sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{TlsConnector, client::TlsStream};

#[derive(Clone)]
/// Performs the client side of a tls handshake within a bounded time.
pub struct TlsClient {
    connector: TlsConnector,
    handshake_timeout: Duration,
}

impl fmt::Debug for TlsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsClient")
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

impl TlsClient {
    /// Create a new [`TlsClient`] using the webpki root store,
    /// advertising `http/1.1` over alpn.
    pub fn try_new(handshake_timeout: Duration) -> Result<Self, rustls::Error> {
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let mut config =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()?
                .with_root_certificates(root_store)
                .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            handshake_timeout,
        })
    }

    /// Run the tls handshake for `host` over `stream`.
    pub async fn handshake<S>(&self, host: &Host, stream: S) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = server_name(host).map_err(TlsError::InvalidServerName)?;
        tracing::trace!(?server_name, "tls handshake started");

        match tokio::time::timeout(
            self.handshake_timeout,
            self.connector.connect(server_name, stream),
        )
        .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(err)) => Err(TlsError::Handshake(err)),
            Err(_) => Err(TlsError::Timeout(self.handshake_timeout)),
        }
    }
}

fn server_name(host: &Host) -> Result<ServerName<'static>, InvalidDnsNameError> {
    match host {
        Host::Address(ip) => Ok(ServerName::from(*ip)),
        Host::Name(name) => ServerName::try_from(name.clone()),
    }
}

#[derive(Debug)]
/// Failure to establish tls with the upstream.
pub enum TlsError {
    /// The host is not usable as tls server name.
    InvalidServerName(InvalidDnsNameError),
    /// The handshake failed.
    Handshake(std::io::Error),
    /// The handshake did not complete in time.
    Timeout(Duration),
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidServerName(_) => write!(f, "invalid tls server name"),
            Self::Handshake(_) => write!(f, "tls handshake"),
            Self::Timeout(timeout) => write!(f, "tls handshake timed out after {timeout:?}"),
        }
    }
}

impl std::error::Error for TlsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidServerName(err) => Some(err),
            Self::Handshake(err) => Some(err),
            Self::Timeout(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv6Addr};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn test_server_name() {
        assert!(matches!(
            server_name(&Host::Name("api.example.com".to_owned())).unwrap(),
            ServerName::DnsName(_)
        ));
        assert!(matches!(
            server_name(&Host::Address(IpAddr::V6(Ipv6Addr::LOCALHOST))).unwrap(),
            ServerName::IpAddress(_)
        ));
        assert!(server_name(&Host::Name("exa mple.com".to_owned())).is_err());
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // accept and stay silent
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let client = TlsClient::try_new(Duration::from_millis(100)).unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();
        let err = client
            .handshake(&Host::Name("localhost".to_owned()), stream)
            .await
            .unwrap_err();
        assert!(matches!(err, TlsError::Timeout(_)), "{err:?}");

        server.abort();
    }
}
