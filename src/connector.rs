//! The transport of the outbound http client.
//!
//! [`TunnelConnector`] is what the client dials with in place of a
//! direct tcp connect: the destination of the request uri is handed to the
//! SOCKS5 proxy, and for `https` tls is layered on top of the tunnel.

use crate::{
    address::HostWithPort,
    config::DEFAULT_TLS_HANDSHAKE_TIMEOUT,
    dialer::{DialError, TunnelDialer},
    error::{BoxError, OpaqueError},
    tls::{TlsClient, TlsError},
};
use http::Uri;
use hyper_util::{
    client::legacy::connect::{Connected, Connection},
    rt::TokioIo,
};
use pin_project_lite::pin_project;
use std::{
    fmt,
    io::IoSlice,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;

#[derive(Debug, Clone)]
/// A [`tower_service::Service`] turning a request [`Uri`] into a
/// [`TunnelConnection`] to its destination.
pub struct TunnelConnector {
    dialer: Arc<TunnelDialer>,
    tls: TlsClient,
}

impl TunnelConnector {
    /// Create a new [`TunnelConnector`] with the default tls handshake timeout.
    pub fn try_new(dialer: TunnelDialer) -> Result<Self, rustls::Error> {
        Self::try_with_tls_handshake_timeout(dialer, DEFAULT_TLS_HANDSHAKE_TIMEOUT)
    }

    /// Create a new [`TunnelConnector`] bounding tls handshakes by the given timeout.
    pub fn try_with_tls_handshake_timeout(
        dialer: TunnelDialer,
        timeout: Duration,
    ) -> Result<Self, rustls::Error> {
        Ok(Self {
            dialer: Arc::new(dialer),
            tls: TlsClient::try_new(timeout)?,
        })
    }

    /// Establish a connection to the destination of `uri`.
    pub async fn connect(&self, uri: Uri) -> Result<TunnelConnection, ConnectError> {
        let destination = HostWithPort::try_from_uri(&uri).map_err(ConnectError::Destination)?;
        let secure = uri
            .scheme_str()
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https"));

        let tcp = self.dialer.dial_detached(destination.clone()).await?;
        tracing::debug!(%destination, secure, "tunnel to upstream established");

        let stream = if secure {
            let tls = self.tls.handshake(&destination.host, tcp).await?;
            TunnelStream::Tls(Box::new(tls))
        } else {
            TunnelStream::Plain(tcp)
        };

        Ok(TunnelConnection::new(stream))
    }
}

impl tower_service::Service<Uri> for TunnelConnector {
    type Response = TunnelConnection;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.connect(uri).await.map_err(Into::into) })
    }
}

#[derive(Debug)]
/// Failure to connect to the upstream.
pub enum ConnectError {
    /// No destination could be derived from the request uri.
    Destination(OpaqueError),
    /// The tunnel could not be opened.
    Dial(DialError),
    /// Tls could not be established over the tunnel.
    Tls(TlsError),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destination(_) => write!(f, "invalid upstream destination"),
            Self::Dial(_) => write!(f, "dial upstream through socks5 proxy"),
            Self::Tls(_) => write!(f, "secure upstream connection"),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Destination(err) => Some(err),
            Self::Dial(err) => Some(err),
            Self::Tls(err) => Some(err),
        }
    }
}

impl From<DialError> for ConnectError {
    fn from(value: DialError) -> Self {
        Self::Dial(value)
    }
}

impl From<TlsError> for ConnectError {
    fn from(value: TlsError) -> Self {
        Self::Tls(value)
    }
}

#[derive(Debug)]
/// A tunnel to the upstream, with or without tls.
pub enum TunnelStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for TunnelStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TunnelStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
            Self::Tls(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            Self::Plain(stream) => stream.is_write_vectored(),
            Self::Tls(stream) => stream.is_write_vectored(),
        }
    }
}

pin_project! {
    #[derive(Debug)]
    /// A [`TunnelStream`] as seen by the http client.
    pub struct TunnelConnection {
        #[pin]
        inner: TokioIo<TunnelStream>,
    }
}

impl TunnelConnection {
    fn new(stream: TunnelStream) -> Self {
        Self {
            inner: TokioIo::new(stream),
        }
    }

    /// Returns `true` if tls runs over this tunnel.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.inner(), TunnelStream::Tls(_))
    }
}

impl Connection for TunnelConnection {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl hyper::rt::Read for TunnelConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        hyper::rt::Read::poll_read(self.project().inner, cx, buf)
    }
}

impl hyper::rt::Write for TunnelConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        hyper::rt::Write::poll_write(self.project().inner, cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        hyper::rt::Write::poll_flush(self.project().inner, cx)
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        hyper::rt::Write::poll_shutdown(self.project().inner, cx)
    }

    fn is_write_vectored(&self) -> bool {
        hyper::rt::Write::is_write_vectored(&self.inner)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<Result<usize, std::io::Error>> {
        hyper::rt::Write::poll_write_vectored(self.project().inner, cx, bufs)
    }
}
