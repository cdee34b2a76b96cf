#![allow(dead_code, clippy::unwrap_used)]

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full, combinators::UnsyncBoxBody};
use hyper::{body::Incoming, service::service_fn};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::{TokioExecutor, TokioIo},
};
use socks_gateway::{
    address::{Host, HostWithPort},
    config::ProxyConfig,
    error::BoxError,
    server::Gateway,
    socks5::proto::{
        Command, ReplyKind, SocksMethod,
        client::{Header, Request as Socks5Request},
        server::{Header as ServerHeader, Reply},
    },
};
use std::{
    convert::Infallible,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
};

pub type TestBody = UnsyncBoxBody<Bytes, Infallible>;

pub fn full(data: impl Into<Bytes>) -> TestBody {
    Full::new(data.into()).boxed_unsync()
}

/// A SOCKS5 proxy recording every CONNECT request it serves.
///
/// Every domain name resolves to the loopback address,
/// names are never resolved by the gateway itself.
pub struct MockSocks5Proxy {
    addr: SocketAddr,
    state: Arc<ProxyState>,
}

#[derive(Default)]
struct ProxyState {
    connections: AtomicUsize,
    destinations: Mutex<Vec<HostWithPort>>,
}

impl MockSocks5Proxy {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ProxyState::default());

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                let state = accept_state.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve_socks5(stream, state).await {
                        tracing::debug!("mock socks5 proxy: {err}");
                    }
                });
            }
        });

        Self { addr, state }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn destinations(&self) -> Vec<HostWithPort> {
        self.state.destinations.lock().unwrap().clone()
    }
}

async fn serve_socks5(mut stream: TcpStream, state: Arc<ProxyState>) -> Result<(), BoxError> {
    let header = Header::read_from(&mut stream).await?;
    if !header.methods.contains(&SocksMethod::NoAuthenticationRequired) {
        ServerHeader::new(SocksMethod::NoAcceptableMethods)
            .write_to(&mut stream)
            .await?;
        return Ok(());
    }
    ServerHeader::new(SocksMethod::NoAuthenticationRequired)
        .write_to(&mut stream)
        .await?;

    let request = Socks5Request::read_from(&mut stream).await?;
    state
        .destinations
        .lock()
        .unwrap()
        .push(request.destination.clone());

    if request.command != Command::Connect {
        Reply::error_reply(ReplyKind::CommandNotSupported)
            .write_to(&mut stream)
            .await?;
        return Ok(());
    }

    let target = match request.destination.host {
        Host::Name(_) => SocketAddr::from((Ipv4Addr::LOCALHOST, request.destination.port)),
        Host::Address(ip) => SocketAddr::from((ip, request.destination.port)),
    };
    match TcpStream::connect(target).await {
        Ok(mut upstream) => {
            Reply::new(upstream.local_addr()?.into())
                .write_to(&mut stream)
                .await?;
            tokio::io::copy_bidirectional(&mut stream, &mut upstream).await?;
        }
        Err(err) => {
            Reply::error_reply(ReplyKind::from(&err))
                .write_to(&mut stream)
                .await?;
        }
    }
    Ok(())
}

/// Spawn an http/1.1 upstream answering every request with `handler`.
pub async fn spawn_upstream<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<TestBody>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler(req).await) }
                });
                if let Err(err) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!("upstream connection: {err}");
                }
            });
        }
    });

    addr
}

/// Spawn an upstream speaking raw bytes, `handler` runs once per connection.
pub async fn spawn_raw_upstream<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(handler(stream));
        }
    });

    addr
}

/// Read up to and including the empty line ending a request head.
pub async fn read_request_head(stream: &mut TcpStream) {
    let mut head: Vec<u8> = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        assert_ne!(n, 0, "connection closed mid request head");
        head.extend_from_slice(&buf[..n]);
    }
}

/// An upstream echoing the request it received as json.
///
/// The status code can be picked with the `x-echo-status` request header.
pub async fn spawn_echo_upstream() -> SocketAddr {
    spawn_upstream(|req: Request<Incoming>| async move {
        let (parts, body) = req.into_parts();
        let body = body.collect().await.unwrap().to_bytes();

        let mut headers = serde_json::Map::new();
        for name in parts.headers.keys() {
            let values: Vec<_> = parts
                .headers
                .get_all(name)
                .iter()
                .map(|value| serde_json::Value::from(value.to_str().unwrap()))
                .collect();
            headers.insert(name.as_str().to_owned(), values.into());
        }

        let body_text = if body.len() <= 1024 {
            String::from_utf8_lossy(&body).into_owned()
        } else {
            String::new()
        };
        let echo = serde_json::json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "version": format!("{:?}", parts.version),
            "headers": headers,
            "body_len": body.len(),
            "body": body_text,
        });

        let status = parts
            .headers
            .get("x-echo-status")
            .map(|value| value.to_str().unwrap().parse::<u16>().unwrap())
            .unwrap_or(200);

        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .header("x-upstream", "echo")
            .body(full(serde_json::to_vec(&echo).unwrap()))
            .unwrap()
    })
    .await
}

/// Spawn a gateway on a random local port.
pub async fn spawn_gateway(socks_address: &str, target_base_url: &str) -> SocketAddr {
    let config = ProxyConfig::new(socks_address, target_base_url).unwrap();
    let gateway = Gateway::try_new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(gateway.serve(listener));
    addr
}

pub type TestClient = Client<HttpConnector, Full<Bytes>>;

pub fn client() -> TestClient {
    Client::builder(TokioExecutor::new()).build_http()
}

pub async fn body_string(response: Response<Incoming>) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Incoming>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
