use socks_gateway::error::{BoxError, ErrorContext as _};
use std::io::IsTerminal as _;
use tracing_subscriber::{
    EnvFilter, filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
/// Output format of the log events.
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One json object per event, on stderr.
    Json,
}

pub fn init_tracing(
    format: LogFormat,
    default_directive: impl Into<Directive>,
) -> Result<(), BoxError> {
    match format {
        LogFormat::Text => init_default(default_directive),
        LogFormat::Json => init_structured(default_directive),
    }
}

fn init_default(default_directive: impl Into<Directive>) -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(default_directive.into())
                .from_env_lossy(),
        )
        .try_init()
        .context("try init (default) tracing subscriber")?;

    Ok(())
}

fn init_structured(default_directive: impl Into<Directive>) -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            fmt::Layer::new()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(default_directive.into())
                .from_env_lossy(),
        )
        .try_init()
        .context("try init (structured) tracing subscriber")?;

    Ok(())
}
