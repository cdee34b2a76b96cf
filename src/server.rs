//! The accept loop of the gateway.
//!
//! Each accepted connection is served on a task of its own, speaking
//! http/1.1 or h2 as the client prefers, with every request on it
//! handed to the [`Forwarder`].

use crate::{
    config::{DEFAULT_TLS_HANDSHAKE_TIMEOUT, ProxyConfig},
    connector::TunnelConnector,
    dialer::TunnelDialer,
    error::{BoxError, ErrorContext, OpaqueError},
    http::Forwarder,
};
use hyper::{Request, body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as AutoBuilder,
};
use std::{convert::Infallible, io, pin::pin, time::Duration};
use tokio::net::{TcpListener, TcpStream};
use tokio_graceful::ShutdownGuard;
use tracing::Instrument;

#[derive(Debug, Clone)]
/// A transparent http forwarding gateway,
/// tunneling all upstream traffic through a SOCKS5 proxy.
pub struct Gateway {
    forwarder: Forwarder,
}

impl Gateway {
    /// Create a new [`Gateway`] for the given configuration.
    pub fn try_new(config: ProxyConfig) -> Result<Self, OpaqueError> {
        Self::try_with_tls_handshake_timeout(config, DEFAULT_TLS_HANDSHAKE_TIMEOUT)
    }

    /// Create a new [`Gateway`] bounding tls handshakes
    /// with `https` upstreams by the given timeout.
    pub fn try_with_tls_handshake_timeout(
        config: ProxyConfig,
        timeout: Duration,
    ) -> Result<Self, OpaqueError> {
        let dialer = TunnelDialer::try_new(config.socks_address())?;
        let connector = TunnelConnector::try_with_tls_handshake_timeout(dialer, timeout)
            .context("build tls client config")?;
        Ok(Self {
            forwarder: Forwarder::new(config.target_base_url(), connector),
        })
    }

    /// Serve connections from `listener` until the process ends.
    pub async fn serve(self, listener: TcpListener) {
        self.serve_inner(listener, None).await;
    }

    /// Serve connections from `listener` until `guard` is cancelled.
    ///
    /// Connections in flight are asked to shut down gracefully,
    /// each holding on to the guard until it is done.
    pub async fn serve_graceful(self, listener: TcpListener, guard: ShutdownGuard) {
        self.serve_inner(listener, Some(guard)).await;
    }

    async fn serve_inner(self, listener: TcpListener, guard: Option<ShutdownGuard>) {
        let cancel_guard = guard.clone();
        let cancelled_fut = async {
            if let Some(guard) = cancel_guard {
                guard.cancelled().await;
            } else {
                std::future::pending::<()>().await;
            }
        };
        let mut cancelled_fut = pin!(cancelled_fut);

        loop {
            tokio::select! {
                _ = cancelled_fut.as_mut() => {
                    tracing::trace!("signal received: stop accepting connections");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            if let Err(err) = stream.set_nodelay(true) {
                                tracing::trace!("failed to set TCP_NODELAY on accepted connection: {err}");
                            }

                            let span = tracing::debug_span!(
                                "gateway::serve",
                                network.peer.address = %peer_addr.ip(),
                                network.peer.port = peer_addr.port(),
                            );

                            let forwarder = self.forwarder.clone();
                            match guard.clone() {
                                Some(guard) => {
                                    let task_guard = guard.clone();
                                    guard.spawn_task(
                                        serve_connection(forwarder, stream, Some(task_guard))
                                            .instrument(span),
                                    );
                                }
                                None => {
                                    tokio::spawn(
                                        serve_connection(forwarder, stream, None).instrument(span),
                                    );
                                }
                            }
                        }
                        Err(err) => {
                            handle_accept_err(err).await;
                        }
                    }
                }
            }
        }
    }
}

async fn serve_connection(forwarder: Forwarder, stream: TcpStream, guard: Option<ShutdownGuard>) {
    let service = service_fn(move |req: Request<Incoming>| {
        let forwarder = forwarder.clone();
        async move { Ok::<_, Infallible>(forwarder.forward(req).await) }
    });

    let builder = AutoBuilder::new(TokioExecutor::new());
    let mut conn = pin!(builder.serve_connection(TokioIo::new(stream), service));

    let Some(guard) = guard else {
        log_connection_result(conn.await);
        return;
    };

    let mut cancelled_fut = pin!(guard.cancelled());
    tokio::select! {
        _ = cancelled_fut.as_mut() => {
            tracing::trace!("signal received: initiate graceful shutdown");
            conn.as_mut().graceful_shutdown();
        }
        result = conn.as_mut() => {
            tracing::trace!("connection finished");
            log_connection_result(result);
            return;
        }
    }

    let result = conn.as_mut().await;
    tracing::trace!("connection finished after graceful shutdown");
    log_connection_result(result);
}

fn log_connection_result(result: Result<(), BoxError>) {
    if let Err(err) = result {
        if is_benign_connection_error(err.as_ref()) {
            tracing::trace!("connection closed: {err}");
        } else {
            tracing::debug!("connection error: {err}");
        }
    }
}

/// Errors that only tell that the peer went away.
fn is_benign_connection_error(err: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
    if let Some(err) = err.downcast_ref::<hyper::Error>() {
        if err.is_canceled() || err.is_closed() || err.is_incomplete_message() {
            return true;
        }
        return std::error::Error::source(err)
            .and_then(|source| source.downcast_ref::<io::Error>())
            .is_some_and(is_connection_error);
    }
    err.downcast_ref::<io::Error>()
        .is_some_and(is_connection_error)
}

/// Check if the error is a connection error,
/// in which case the error can be ignored.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::Interrupted
    )
}

async fn handle_accept_err(err: io::Error) {
    if is_connection_error(&err) {
        tracing::trace!("TCP accept error: connect error: {err:?}");
    } else {
        // e.g. EMFILE: back off and give in-flight connections the chance to close
        tracing::error!("TCP accept error: {err:?}");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_connection_errors() {
        let err: BoxError = Box::new(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(is_benign_connection_error(err.as_ref()));

        let err: BoxError = Box::new(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!is_benign_connection_error(err.as_ref()));

        let err: BoxError = OpaqueError::from_display("boom").into();
        assert!(!is_benign_connection_error(err.as_ref()));
    }

    #[tokio::test]
    async fn test_serve_graceful_stops_accepting() {
        let config = ProxyConfig::new("127.0.0.1:1", "http://upstream.internal").unwrap();
        let gateway = Gateway::try_new(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let shutdown = tokio_graceful::Shutdown::new(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        shutdown.spawn_task_fn(move |guard| gateway.serve_graceful(listener, guard));

        tokio::time::timeout(
            Duration::from_secs(5),
            shutdown.shutdown_with_limit(Duration::from_secs(1)),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
