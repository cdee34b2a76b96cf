//! Tcp connections tunneled through the SOCKS5 proxy.

use crate::{
    address::HostWithPort,
    error::{ErrorContext, OpaqueError},
    socks5::{HandshakeError, Socks5Client},
};
use std::{fmt, sync::Arc};
use tokio::net::TcpStream;
use tracing::Instrument;

#[derive(Debug, Clone)]
/// Opens tcp connections to arbitrary destinations by way of a SOCKS5 proxy.
///
/// Every dial is a fresh connection to the proxy, followed by a
/// `CONNECT` handshake. The returned stream is the tunnel itself.
pub struct TunnelDialer {
    proxy_address: Arc<str>,
    client: Socks5Client,
}

impl TunnelDialer {
    /// Create a new [`TunnelDialer`] for the proxy at the given `host:port`.
    ///
    /// Fails if the address is not of that form. A proxy host name is
    /// resolved locally on every dial; destination names never are.
    pub fn try_new(proxy_address: impl AsRef<str>) -> Result<Self, OpaqueError> {
        let proxy_address = proxy_address.as_ref();
        let _: HostWithPort = proxy_address
            .parse()
            .with_context(|| format!("invalid socks5 proxy address {proxy_address:?}"))?;
        Ok(Self {
            proxy_address: Arc::from(proxy_address),
            client: Socks5Client::new(),
        })
    }

    /// Open a tunnel to `destination`.
    ///
    /// Cancelled when the returned future is dropped,
    /// see [`Self::dial_detached`] for a dial that is not.
    pub async fn dial(&self, destination: &HostWithPort) -> Result<TcpStream, DialError> {
        let mut stream = TcpStream::connect(&*self.proxy_address)
            .await
            .map_err(|err| DialError::ProxyConnect {
                proxy_address: self.proxy_address.clone(),
                source: err,
            })?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("failed to set TCP_NODELAY on proxy connection: {err}");
        }

        tracing::trace!(proxy_address = %self.proxy_address, "connected to socks5 proxy");

        self.client
            .handshake_connect(&mut stream, destination)
            .await
            .map_err(|err| DialError::Handshake {
                destination: destination.clone(),
                source: err,
            })?;

        Ok(stream)
    }

    /// Open a tunnel to `destination` on a task of its own.
    ///
    /// The dial starts right away and runs to completion even when
    /// the returned future is dropped before it resolves: cancellation
    /// of the caller never interrupts a dial in flight. A tunnel
    /// nobody waits for anymore is closed once established.
    pub fn dial_detached(
        &self,
        destination: HostWithPort,
    ) -> impl Future<Output = Result<TcpStream, DialError>> + Send + 'static {
        let dialer = self.clone();
        let span = tracing::trace_span!("socks5_dial", %destination);
        let handle = tokio::spawn(
            async move { dialer.dial(&destination).await }.instrument(span),
        );
        async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(DialError::Aborted(err)),
            }
        }
    }
}

#[derive(Debug)]
/// Failure to open a tunnel.
pub enum DialError {
    /// The proxy itself could not be reached.
    ProxyConnect {
        proxy_address: Arc<str>,
        source: std::io::Error,
    },
    /// The proxy refused or failed the `CONNECT` request.
    Handshake {
        destination: HostWithPort,
        source: HandshakeError,
    },
    /// The dial task did not run to completion.
    Aborted(tokio::task::JoinError),
}

impl fmt::Display for DialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProxyConnect { proxy_address, .. } => {
                write!(f, "connect to socks5 proxy {proxy_address}")
            }
            Self::Handshake { destination, .. } => {
                write!(f, "socks5 connect to {destination}")
            }
            Self::Aborted(_) => write!(f, "socks5 dial aborted"),
        }
    }
}

impl std::error::Error for DialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProxyConnect { source, .. } => Some(source),
            Self::Handshake { source, .. } => Some(source),
            Self::Aborted(err) => Some(err),
        }
    }
}
