//! entrypoint for socks-gateway

#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

use clap::Parser;
use socks_gateway::{
    config::{DEFAULT_PORT, DEFAULT_TLS_HANDSHAKE_TIMEOUT, ProxyConfig},
    error::{BoxError, ErrorContext, ErrorExt},
    server::Gateway,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;

mod trace;
use self::trace::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "socks-gateway")]
#[command(bin_name = "socks-gateway")]
#[command(version, about, long_about = None)]
/// transparent http forwarding gateway,
/// dialing its upstream through a SOCKS5 proxy
struct Cli {
    #[arg(long, env = "SOCKS5_PROXY")]
    /// `host:port` of the SOCKS5 proxy
    socks5_proxy: Option<String>,

    #[arg(long, env = "TARGET_BASE_URL")]
    /// base url of the upstream, e.g. `https://api.example.com`
    target_base_url: Option<String>,

    #[arg(
        long,
        env = "GATEWAY_BIND",
        default_value_t = format!("0.0.0.0:{DEFAULT_PORT}")
    )]
    /// the address to listen on
    bind: String,

    #[arg(
        long,
        env = "TLS_HANDSHAKE_TIMEOUT",
        default_value_t = DEFAULT_TLS_HANDSHAKE_TIMEOUT.as_secs()
    )]
    /// upper bound in seconds for the tls handshake with an https upstream
    tls_handshake_timeout: u64,

    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    /// format of the log output
    log_format: LogFormat,
}

#[tokio::main]
#[allow(clippy::exit)]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("🚩 exit with error: {}", err.display_chain());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    trace::init_tracing(cli.log_format, LevelFilter::INFO)?;

    let config = ProxyConfig::try_from_parts(cli.socks5_proxy, cli.target_base_url)?;
    let gateway = Gateway::try_with_tls_handshake_timeout(
        config.clone(),
        Duration::from_secs(cli.tls_handshake_timeout),
    )?;

    let listener = TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("bind gateway to {}", cli.bind))?;
    let bind_address = listener
        .local_addr()
        .context("get local addr of tcp listener")?;

    tracing::info!(
        %bind_address,
        socks5_proxy = config.socks_address(),
        target_base_url = config.target_base_url(),
        "socks-gateway listening on {bind_address}",
    );

    let graceful = tokio_graceful::Shutdown::default();
    graceful.spawn_task_fn(move |guard| gateway.serve_graceful(listener, guard));

    graceful
        .shutdown_with_limit(Duration::from_secs(30))
        .await
        .context("graceful shutdown")?;

    Ok(())
}
