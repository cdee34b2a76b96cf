use std::fmt;

use super::proto::{
    Command, ProtocolError, ReplyKind, SocksMethod,
    client::{Header, Request},
    server,
};
use crate::address::HostWithPort;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Default)]
/// Socks5 client implementation of [RFC 1928]
///
/// Only the `no authentication required` method is offered.
///
/// [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928
pub struct Socks5Client {
    _priv: (),
}

impl Socks5Client {
    /// Creates a new socks5 [`Socks5Client`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
/// Client-side error returned in case of a failure during the handshake process.
pub struct HandshakeError {
    kind: HandshakeErrorKind,
    context: &'static str,
}

impl HandshakeError {
    fn io(err: std::io::Error, context: &'static str) -> Self {
        Self {
            kind: HandshakeErrorKind::IO(err),
            context,
        }
    }

    fn protocol(err: ProtocolError, context: &'static str) -> Self {
        Self {
            kind: HandshakeErrorKind::Protocol(err),
            context,
        }
    }

    fn reply_kind(kind: ReplyKind, context: &'static str) -> Self {
        Self {
            kind: HandshakeErrorKind::Reply(kind),
            context,
        }
    }

    fn method_mismatch(method: SocksMethod, context: &'static str) -> Self {
        Self {
            kind: HandshakeErrorKind::MethodMismatch(method),
            context,
        }
    }

    /// [`ReplyKind::GeneralServerFailure`] is returned in case of an error
    /// that is returned in case no reply was received from the (socks5) server.
    #[must_use]
    pub fn reply(&self) -> ReplyKind {
        match self.kind {
            HandshakeErrorKind::IO(_)
            | HandshakeErrorKind::Protocol(_)
            | HandshakeErrorKind::MethodMismatch(_) => ReplyKind::GeneralServerFailure,
            HandshakeErrorKind::Reply(reply_kind) => reply_kind,
        }
    }
}

#[derive(Debug)]
enum HandshakeErrorKind {
    IO(std::io::Error),
    Protocol(ProtocolError),
    MethodMismatch(SocksMethod),
    Reply(ReplyKind),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context = self.context;
        match &self.kind {
            HandshakeErrorKind::IO(_) | HandshakeErrorKind::Protocol(_) => {
                write!(f, "socks5 handshake: {context}")
            }
            HandshakeErrorKind::MethodMismatch(method) => {
                write!(f, "socks5 handshake: {context}: method mismatch: {method}")
            }
            HandshakeErrorKind::Reply(reply) => {
                write!(f, "socks5 handshake: {context}: {reply}")
            }
        }
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            HandshakeErrorKind::IO(err) => Some(err),
            HandshakeErrorKind::Protocol(err) => Some(err),
            HandshakeErrorKind::MethodMismatch(_) | HandshakeErrorKind::Reply(_) => None,
        }
    }
}

impl Socks5Client {
    /// Establish a connection with a Socks5 server making use of the [`Command::Connect`] flow.
    ///
    /// Names are sent as-is, leaving resolution to the proxy.
    /// In case the handshake was successful it returns the address
    /// the proxy bound to reach the destination on our behalf.
    /// From then on the stream is a byte-transparent pipe to the destination.
    pub async fn handshake_connect<S>(
        &self,
        stream: &mut S,
        destination: &HostWithPort,
    ) -> Result<HostWithPort, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let selected_method = self.handshake_headers_no_auth(stream).await?;

        let request = Request::new(Command::Connect, destination.clone());
        request
            .write_to(stream)
            .await
            .map_err(|err| HandshakeError::io(err, "write client request: connect"))?;

        tracing::trace!(
            %selected_method,
            %destination,
            "socks5 client: client request sent"
        );

        let server_reply = server::Reply::read_from(stream)
            .await
            .map_err(|err| HandshakeError::protocol(err, "read server reply"))?;
        if server_reply.reply != ReplyKind::Succeeded {
            return Err(HandshakeError::reply_kind(
                server_reply.reply,
                "server responded with non-success reply",
            ));
        }

        tracing::trace!(
            %selected_method,
            %destination,
            bind_address = %server_reply.bind_address,
            "socks5 client: connected"
        );
        Ok(server_reply.bind_address)
    }

    async fn handshake_headers_no_auth<S>(
        &self,
        stream: &mut S,
    ) -> Result<SocksMethod, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let header = Header::new([SocksMethod::NoAuthenticationRequired]);
        header
            .write_to(stream)
            .await
            .map_err(|err| HandshakeError::io(err, "write client header: no auth required"))?;
        let methods = header.methods;

        tracing::trace!(?methods, "socks5 client: header without auth written");

        let server_header = server::Header::read_from(stream)
            .await
            .map_err(|err| HandshakeError::protocol(err, "read server header"))?;

        tracing::trace!(
            ?methods,
            selected_method = %server_header.method,
            "socks5 client: headers exchanged without auth",
        );

        if server_header.method != SocksMethod::NoAuthenticationRequired {
            return Err(HandshakeError::method_mismatch(
                server_header.method,
                "expected 'no auth required' method",
            ));
        }

        Ok(SocksMethod::NoAuthenticationRequired)
    }
}
